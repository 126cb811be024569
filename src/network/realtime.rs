use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::common::Message;

/// Topic không lọc: mọi INSERT vào `messages`, nuôi preview sidebar.
pub const LIST_TOPIC: &str = "realtime:public:messages";

/// Topic lọc theo chat đang chọn, nuôi khung tin nhắn.
pub fn chat_topic(chat_id: &str) -> String {
    format!("realtime:public:messages:chat_id=eq.{chat_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("realtime connection closed")]
    Closed,
}

/// Khung Phoenix: mọi frame hai chiều đều là {topic, event, payload, ref}.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    payload: serde_json::Value,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Một kết nối realtime. Actor giữ tối đa một kết nối; mỗi phạm vi
/// (danh sách chat, chat đang chọn) tương ứng đúng một topic đã join.
pub struct RealtimeSocket {
    writer: WsSink,
    reader: WsSource,
    next_ref: u64,
}

impl RealtimeSocket {
    pub async fn connect(url: &str) -> Result<Self, RealtimeError> {
        let (stream, _) = connect_async(url).await?;
        let (writer, reader) = stream.split();
        Ok(Self {
            writer,
            reader,
            next_ref: 0,
        })
    }

    fn next_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    async fn send_frame(
        &mut self,
        topic: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), RealtimeError> {
        let frame = Frame {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(self.next_ref()),
        };
        let text = serde_json::to_string(&frame)?;
        self.writer.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    pub async fn join(&mut self, topic: &str) -> Result<(), RealtimeError> {
        self.send_frame(topic, "phx_join", json!({})).await
    }

    pub async fn leave(&mut self, topic: &str) -> Result<(), RealtimeError> {
        self.send_frame(topic, "phx_leave", json!({})).await
    }

    /// Server ngắt kết nối nếu không nhận heartbeat định kỳ.
    pub async fn heartbeat(&mut self) -> Result<(), RealtimeError> {
        self.send_frame("phoenix", "heartbeat", json!({})).await
    }

    /// Chờ tới khi có một hàng `messages` mới được INSERT. Các frame khác
    /// (phx_reply, presence, ping...) được bỏ qua tại đây.
    pub async fn next_insert(&mut self) -> Result<Message, RealtimeError> {
        loop {
            let text = match self.reader.next().await {
                Some(Ok(WsMessage::Text(text))) => text,
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => return Err(RealtimeError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err.into()),
            };

            if let Some(message) = parse_insert(text.as_str()) {
                return Ok(message);
            }
        }
    }
}

/// Trích hàng mới từ payload của event INSERT; mọi frame khác trả về None.
fn parse_insert(raw: &str) -> Option<Message> {
    let frame: Frame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("Unreadable realtime frame: {err}");
            return None;
        }
    };

    if frame.event != "INSERT" {
        return None;
    }

    let record = frame.payload.get("record")?.clone();
    match serde_json::from_value(record) {
        Ok(message) => Some(message),
        Err(err) => {
            log::warn!("Skipping malformed realtime row: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_topic_embeds_filter() {
        assert_eq!(
            chat_topic("abc-123"),
            "realtime:public:messages:chat_id=eq.abc-123"
        );
    }

    #[test]
    fn join_frame_has_phoenix_shape() {
        let frame = Frame {
            topic: LIST_TOPIC.to_string(),
            event: "phx_join".to_string(),
            payload: json!({}),
            reference: Some("1".to_string()),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "topic": "realtime:public:messages",
                "event": "phx_join",
                "payload": {},
                "ref": "1"
            })
        );
    }

    #[test]
    fn parse_insert_extracts_record() {
        let raw = json!({
            "topic": "realtime:public:messages:chat_id=eq.c1",
            "event": "INSERT",
            "payload": {
                "record": {
                    "id": "m1",
                    "chat_id": "c1",
                    "sender_id": "u2",
                    "content": "hello",
                    "created_at": "2024-05-01T10:00:00+00:00"
                }
            },
            "ref": null
        })
        .to_string();

        let message = parse_insert(&raw).expect("insert should decode");
        assert_eq!(message.id, "m1");
        assert_eq!(message.chat_id, "c1");
        assert_eq!(message.content, "hello");
    }

    #[test]
    fn parse_insert_ignores_other_events() {
        let raw = json!({
            "topic": "phoenix",
            "event": "phx_reply",
            "payload": { "status": "ok" },
            "ref": "1"
        })
        .to_string();
        assert!(parse_insert(&raw).is_none());
    }

    #[test]
    fn parse_insert_drops_malformed_record() {
        let raw = json!({
            "topic": "realtime:public:messages",
            "event": "INSERT",
            "payload": { "record": { "id": "m1" } },
            "ref": null
        })
        .to_string();
        assert!(parse_insert(&raw).is_none());
    }
}
