use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::common::{Chat, Membership, Message, Session, UserProfile};

/// Lỗi khi gọi REST API của backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("session is missing or expired")]
    Unauthorized,
}

/// Client REST cho dịch vụ hosted: auth (GoTrue) + query/insert (PostgREST).
pub struct BackendApi {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

/// Hàng `chat_members` kèm chat được join lồng (select lồng của PostgREST).
#[derive(Debug, Deserialize)]
struct MembershipRow {
    #[serde(flatten)]
    membership: Membership,
    #[serde(default)]
    chats: Option<Chat>,
}

/// Hai cột đủ dùng cho preview sidebar.
#[derive(Debug, Deserialize)]
struct MessageStub {
    content: String,
    created_at: DateTime<Utc>,
}

impl BackendApi {
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            anon_key,
            access_token: None,
        }
    }

    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    /// Token gửi kèm mọi request; chưa đăng nhập thì dùng anon key.
    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn get_rows(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let response = self
            .http
            .get(self.rest_url(table))
            .query(query)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await?;
        check(response).await
    }

    /// Đăng nhập password grant; trả về phiên kèm access token và user.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let value = check(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Xác thực access token hiện tại; 401 nghĩa là phiên đã hết hạn.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await?;
        let value = check(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Các chat mà user là thành viên, qua select lồng membership -> chat.
    pub async fn chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>, ApiError> {
        let value = self
            .get_rows(
                "chat_members",
                &[
                    ("user_id", format!("eq.{user_id}")),
                    (
                        "select",
                        "user_id,chat_id,chats(id,created_at,title,avatar_url,is_group,tags)"
                            .to_string(),
                    ),
                ],
            )
            .await?;

        let rows = decode_rows::<MembershipRow>(value, "chat_members");
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                if row.chats.is_none() {
                    log::warn!(
                        "Membership for chat {} came back without its chat row",
                        row.membership.chat_id
                    );
                }
                row.chats
            })
            .collect())
    }

    /// Tin nhắn mới nhất của một chat (nếu có), cho preview sidebar.
    pub async fn latest_message(
        &self,
        chat_id: &str,
    ) -> Result<Option<(String, DateTime<Utc>)>, ApiError> {
        let value = self
            .get_rows(
                "messages",
                &[
                    ("chat_id", format!("eq.{chat_id}")),
                    ("select", "content,created_at".to_string()),
                    ("order", "created_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let mut rows = decode_rows::<MessageStub>(value, "messages");
        Ok(rows
            .drain(..)
            .next()
            .map(|stub| (stub.content, stub.created_at)))
    }

    /// Toàn bộ lịch sử một chat, tăng dần theo created_at.
    pub async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        let value = self
            .get_rows(
                "messages",
                &[
                    ("chat_id", format!("eq.{chat_id}")),
                    ("select", "*".to_string()),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await?;
        Ok(decode_rows::<Message>(value, "messages"))
    }

    /// Ghi một tin nhắn mới. Id do client sinh; created_at do server gán.
    pub async fn insert_message(
        &self,
        message_id: &str,
        chat_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.rest_url("messages"))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .header("Prefer", "return=minimal")
            .json(&json!([{
                "id": message_id,
                "chat_id": chat_id,
                "sender_id": sender_id,
                "content": content,
            }]))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status { status, body });
    }
    if body.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Giải mã từng hàng về record có kiểu; hàng hỏng chỉ bị log và bỏ qua,
/// không bao giờ đẩy dữ liệu không hợp lệ vào view state.
fn decode_rows<T: DeserializeOwned>(value: serde_json::Value, table: &str) -> Vec<T> {
    let serde_json::Value::Array(rows) = value else {
        log::warn!("Expected an array of `{table}` rows, got a different shape");
        return Vec::new();
    };

    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                log::warn!("Skipping malformed `{table}` row: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rows_skips_malformed_entries() {
        let value = serde_json::json!([
            {
                "id": "m1",
                "chat_id": "c1",
                "sender_id": "u1",
                "content": "hello",
                "created_at": "2024-05-01T10:00:00+00:00"
            },
            { "id": "broken" },
            {
                "id": "m2",
                "chat_id": "c1",
                "sender_id": "u2",
                "content": "hi",
                "created_at": "2024-05-01T10:01:00+00:00"
            }
        ]);

        let rows = decode_rows::<Message>(value, "messages");
        let ids: Vec<&str> = rows.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn decode_rows_rejects_non_array_payload() {
        let rows = decode_rows::<Message>(serde_json::json!({"error": "nope"}), "messages");
        assert!(rows.is_empty());
    }

    #[test]
    fn membership_row_tolerates_missing_chat() {
        let row: MembershipRow = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "chat_id": "c1",
            "chats": null
        }))
        .unwrap();
        assert_eq!(row.membership.user_id, "u1");
        assert!(row.chats.is_none());
    }

    #[test]
    fn urls_are_built_from_base() {
        let api = BackendApi::new(
            "https://example.supabase.co".to_string(),
            "anon".to_string(),
        );
        assert_eq!(
            api.rest_url("messages"),
            "https://example.supabase.co/rest/v1/messages"
        );
        assert_eq!(
            api.auth_url("user"),
            "https://example.supabase.co/auth/v1/user"
        );
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let mut api = BackendApi::new("https://example.supabase.co".into(), "anon".into());
        assert_eq!(api.bearer(), "anon");
        api.set_access_token(Some("jwt".into()));
        assert_eq!(api.bearer(), "jwt");
    }
}
