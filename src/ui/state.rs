use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::{ChatPreview, Message, UserProfile, sort_latest_first};

/// Vòng đời phiên đăng nhập, chuyển trạng thái tường minh thay vì
/// biến toàn cục.
#[derive(Debug, Clone)]
pub enum SessionState {
    Loading,
    Authenticated(UserProfile),
    Unauthenticated { reason: Option<String> },
}

/// Trạng thái khung tin nhắn cho chat đang chọn.
#[derive(Debug, Clone)]
pub enum PaneState {
    Idle,
    Loading {
        chat_id: String,
    },
    Ready {
        chat_id: String,
        messages: Vec<Message>,
    },
}

/// Tin đã gửi lạc quan, chờ backend xác nhận hoặc báo lỗi.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub chat_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub failed: bool,
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub session: SessionState,
    pub chats: Vec<ChatPreview>,
    pub selected_chat_id: Option<String>,
    pub pane: PaneState,
    /// local_id -> tin chưa được xác nhận, để đánh dấu lỗi và gửi lại.
    pub outbox: HashMap<String, OutboxEntry>,
    pub input_text: String,
    pub login_email: String,
    pub login_password: String,
    pub realtime_connected: bool,
    pub last_error: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            session: SessionState::Loading,
            chats: Vec::new(),
            selected_chat_id: None,
            pane: PaneState::Idle,
            outbox: HashMap::new(),
            input_text: String::new(),
            login_email: String::new(),
            login_password: String::new(),
            realtime_connected: false,
            last_error: None,
        }
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        match &self.session {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn selected_preview(&self) -> Option<&ChatPreview> {
        let selected = self.selected_chat_id.as_deref()?;
        self.chats.iter().find(|p| p.chat.id == selected)
    }

    pub fn set_authenticated(&mut self, user: UserProfile) {
        self.session = SessionState::Authenticated(user);
        self.last_error = None;
    }

    /// Quay về màn hình đăng nhập, bỏ toàn bộ state dẫn xuất.
    pub fn reset_to_login(&mut self, reason: Option<String>) {
        self.session = SessionState::Unauthenticated { reason };
        self.chats.clear();
        self.selected_chat_id = None;
        self.pane = PaneState::Idle;
        self.outbox.clear();
        self.input_text.clear();
        self.realtime_connected = false;
    }

    pub fn set_chats(&mut self, mut previews: Vec<ChatPreview>) {
        sort_latest_first(&mut previews);
        self.chats = previews;
    }

    /// Người dùng chọn (hoặc bỏ chọn) một chat.
    pub fn select_chat(&mut self, chat_id: Option<String>) {
        self.selected_chat_id = chat_id.clone();
        self.pane = match chat_id {
            Some(chat_id) => PaneState::Loading { chat_id },
            None => PaneState::Idle,
        };
    }

    /// Kết quả fetch lịch sử. Guard chống response cũ: nếu người dùng đã
    /// chuyển sang chat khác từ lúc request được gửi thì bỏ qua.
    pub fn apply_messages_loaded(&mut self, chat_id: String, mut messages: Vec<Message>) {
        if self.selected_chat_id.as_deref() != Some(chat_id.as_str()) {
            log::debug!("Dropping stale message fetch for chat {chat_id}");
            return;
        }

        // Tin gửi lạc quan trong lúc fetch còn chạy chưa chắc đã nằm trong
        // kết quả trả về. Ghép lại từ outbox để không mất dòng tin (và nút
        // gửi lại nếu insert lỗi).
        if let Some(sender_id) = self.current_user().map(|user| user.id.clone()) {
            let mut pending: Vec<Message> = self
                .outbox
                .iter()
                .filter(|(local_id, entry)| {
                    entry.chat_id == chat_id
                        && !messages.iter().any(|m| m.id.as_str() == local_id.as_str())
                })
                .map(|(local_id, entry)| Message {
                    id: local_id.clone(),
                    chat_id: chat_id.clone(),
                    sender_id: sender_id.clone(),
                    content: entry.content.clone(),
                    created_at: entry.created_at,
                })
                .collect();
            pending.sort_by_key(|message| message.created_at);
            messages.extend(pending);
        }

        self.pane = PaneState::Ready { chat_id, messages };
    }

    /// Tin mới từ realtime, hoặc bản lạc quan của tin mình vừa gửi.
    /// Khử trùng lặp theo id: echo thay thế bản đã có để lấy timestamp
    /// do server gán.
    pub fn apply_insert(&mut self, message: Message) {
        self.touch_preview(&message);

        if let PaneState::Ready { chat_id, messages } = &mut self.pane {
            if *chat_id == message.chat_id {
                if let Some(existing) = messages.iter_mut().find(|m| m.id == message.id) {
                    *existing = message;
                } else {
                    messages.push(message);
                }
            }
        }
    }

    /// Cập nhật preview của đúng chat có tin mới rồi sắp xếp lại danh sách.
    /// Chat không nằm trong danh sách thì bỏ qua (insert không tạo membership).
    fn touch_preview(&mut self, message: &Message) {
        let Some(preview) = self
            .chats
            .iter_mut()
            .find(|p| p.chat.id == message.chat_id)
        else {
            return;
        };

        if preview.last_message_at.is_none_or(|at| message.created_at >= at) {
            preview.last_message = Some(message.content.clone());
            preview.last_message_at = Some(message.created_at);
        }
        sort_latest_first(&mut self.chats);
    }

    /// Lấy nội dung soạn thảo nếu hợp lệ. Rỗng hoặc toàn khoảng trắng là
    /// no-op: không gửi gì và không đổi state.
    pub fn take_composed(&mut self) -> Option<String> {
        let trimmed = self.input_text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let content = trimmed.to_string();
        self.input_text.clear();
        Some(content)
    }

    /// Gửi lạc quan: thêm tin vào pane + sidebar ngay, ghi vào outbox,
    /// trả về (local_id, chat_id) để backend insert với đúng id đó.
    pub fn begin_send(&mut self, content: String) -> Option<(String, String)> {
        let chat_id = self.selected_chat_id.clone()?;
        let sender_id = self.current_user()?.id.clone();
        let local_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        self.outbox.insert(
            local_id.clone(),
            OutboxEntry {
                chat_id: chat_id.clone(),
                content: content.clone(),
                created_at,
                failed: false,
            },
        );
        self.apply_insert(Message {
            id: local_id.clone(),
            chat_id: chat_id.clone(),
            sender_id,
            content,
            created_at,
        });

        Some((local_id, chat_id))
    }

    pub fn confirm_send(&mut self, local_id: &str) {
        self.outbox.remove(local_id);
    }

    pub fn fail_send(&mut self, local_id: &str, error: String) {
        if let Some(entry) = self.outbox.get_mut(local_id) {
            entry.failed = true;
        }
        self.last_error = Some(error);
    }

    /// Gửi lại một tin đã lỗi, giữ nguyên local_id để không nhân đôi.
    pub fn begin_retry(&mut self, local_id: &str) -> Option<(String, String)> {
        let entry = self.outbox.get_mut(local_id)?;
        if !entry.failed {
            return None;
        }
        entry.failed = false;
        Some((entry.chat_id.clone(), entry.content.clone()))
    }

    pub fn is_failed(&self, message_id: &str) -> bool {
        self.outbox.get(message_id).is_some_and(|entry| entry.failed)
    }
}
