use super::types::{ChatPreview, Message, UserProfile};

/// Sự kiện backend actor gửi lên UI.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    SessionLoaded(UserProfile),
    /// Không có phiên hợp lệ; `reason` hiển thị trên màn hình đăng nhập.
    Unauthenticated { reason: Option<String> },
    ChatsLoaded(Vec<ChatPreview>),
    /// Kết quả fetch lịch sử. UI phải bỏ qua nếu chat_id không còn được chọn.
    MessagesLoaded {
        chat_id: String,
        messages: Vec<Message>,
    },
    /// Một hàng `messages` mới từ realtime (kể cả echo tin của chính mình).
    MessageInserted(Message),
    MessageSent { local_id: String },
    SendFailed { local_id: String, error: String },
    RealtimeStatus { connected: bool },
    BackendError { context: String, detail: String },
}
