use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Danh tính người dùng lấy từ dịch vụ auth. Chỉ đọc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
}

/// Phiên đăng nhập, được lưu lại trong data/session.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

/// Một cuộc trò chuyện (bảng `chats` phía backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Quan hệ thành viên user <-> chat (bảng `chat_members`).
#[derive(Debug, Clone, Deserialize)]
pub struct Membership {
    pub user_id: String,
    pub chat_id: String,
}

/// Domain model đại diện một tin nhắn (bảng `messages`).
/// Bất biến sau khi tạo; hiển thị theo `created_at` tăng dần.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Chat kèm tin nhắn mới nhất, chỉ dùng cho sidebar (không lưu lại).
#[derive(Debug, Clone)]
pub struct ChatPreview {
    pub chat: Chat,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ChatPreview {
    pub fn display_title(&self) -> &str {
        self.chat.title.as_deref().unwrap_or("Chat")
    }

    pub fn preview_text(&self) -> &str {
        self.last_message.as_deref().unwrap_or("No messages yet")
    }

    /// Khóa sắp xếp: thời điểm tin cuối; chat trống dùng created_at của chính nó.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.chat.created_at)
    }
}

/// Sắp xếp chat mới nhất lên đầu. Sort ổn định nên các chat bằng
/// timestamp giữ nguyên thứ tự fetch.
pub fn sort_latest_first(previews: &mut [ChatPreview]) {
    previews.sort_by_key(|preview| std::cmp::Reverse(preview.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chat(id: &str, created_at: DateTime<Utc>) -> Chat {
        Chat {
            id: id.to_string(),
            title: Some(format!("chat {id}")),
            avatar_url: None,
            is_group: false,
            tags: None,
            created_at,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn decodes_chat_row_with_nullable_columns() {
        let chat: Chat = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "title": null,
            "avatar_url": null,
            "is_group": true,
            "tags": ["work", "urgent"],
            "created_at": "2024-05-01T10:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(chat.id, "c1");
        assert!(chat.title.is_none());
        assert!(chat.is_group);
        assert_eq!(
            chat.tags.as_deref(),
            Some(["work".to_string(), "urgent".to_string()].as_slice())
        );
    }

    #[test]
    fn rejects_message_row_missing_required_columns() {
        // Thiếu sender_id: không được lọt vào view state.
        let result = serde_json::from_value::<Message>(serde_json::json!({
            "id": "m1",
            "chat_id": "c1",
            "content": "hello",
            "created_at": "2024-05-01T10:00:00+00:00"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn empty_chat_shows_placeholder_preview() {
        let preview = ChatPreview {
            chat: chat("c1", at(100)),
            last_message: None,
            last_message_at: None,
        };
        assert_eq!(preview.preview_text(), "No messages yet");
        assert_eq!(preview.sort_key(), at(100));
    }

    #[test]
    fn previews_sort_by_last_message_then_created_at() {
        // c1 có tin mới hơn c2; c3 chưa có tin nào nhưng được tạo mới nhất.
        let mut previews = vec![
            ChatPreview {
                chat: chat("c2", at(10)),
                last_message: Some("older".into()),
                last_message_at: Some(at(100)),
            },
            ChatPreview {
                chat: chat("c1", at(20)),
                last_message: Some("newer".into()),
                last_message_at: Some(at(200)),
            },
            ChatPreview {
                chat: chat("c3", at(300)),
                last_message: None,
                last_message_at: None,
            },
        ];

        sort_latest_first(&mut previews);

        let order: Vec<&str> = previews.iter().map(|p| p.chat.id.as_str()).collect();
        assert_eq!(order, vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn equal_timestamps_keep_fetch_order() {
        let mut previews = vec![
            ChatPreview {
                chat: chat("first", at(10)),
                last_message: Some("a".into()),
                last_message_at: Some(at(50)),
            },
            ChatPreview {
                chat: chat("second", at(20)),
                last_message: Some("b".into()),
                last_message_at: Some(at(50)),
            },
        ];

        sort_latest_first(&mut previews);

        assert_eq!(previews[0].chat.id, "first");
        assert_eq!(previews[1].chat.id, "second");
    }
}
