/// Lệnh UI gửi xuống backend actor.
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Đọc phiên đã lưu trên đĩa và xác thực lại với backend.
    LoadSession,
    /// Đăng nhập bằng email/mật khẩu (grant_type=password).
    SignIn { email: String, password: String },
    /// Xóa phiên đã lưu và quay về màn hình đăng nhập.
    SignOut,
    /// Fetch lại toàn bộ danh sách chat kèm tin nhắn mới nhất.
    RefreshChats,
    /// Chọn (hoặc bỏ chọn) một chat: fetch lịch sử + đổi topic realtime.
    /// - chat_id = None: rời topic hiện tại, không subscribe gì thêm.
    SelectChat { chat_id: Option<String> },
    /// Ghi một tin nhắn mới. `local_id` do UI sinh ra (uuid) để đối chiếu
    /// echo realtime và báo kết quả gửi về đúng tin.
    SendMessage {
        local_id: String,
        chat_id: String,
        content: String,
    },
}
