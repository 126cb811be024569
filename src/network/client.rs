use std::error::Error;
use std::io;
use std::path::Path;
use std::time::Duration;
use std::{cmp, fs};

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, sleep_until};

use crate::common::{
    BackendCommand, BackendEvent, ChatPreview, Message, Session, sort_latest_first,
};
use crate::config::BackendConfig;

use super::api::{ApiError, BackendApi};
use super::realtime::{LIST_TOPIC, RealtimeError, RealtimeSocket, chat_topic};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Actor nói chuyện với backend thay cho UI: toàn bộ I/O (auth, query,
/// insert, realtime) đi qua đây và được trả về UI dưới dạng BackendEvent.
pub struct BackendClient {
    event_sender: mpsc::Sender<BackendEvent>,
    command_receiver: mpsc::Receiver<BackendCommand>,
    config: BackendConfig,
    api: BackendApi,
    session: Option<Session>,
    /// Topic realtime của chat đang chọn; reconnect sẽ join lại đúng topic này.
    selected_topic: Option<String>,
    reconnect_delay: Duration,
}

impl BackendClient {
    pub fn new(
        event_sender: mpsc::Sender<BackendEvent>,
        command_receiver: mpsc::Receiver<BackendCommand>,
        config: BackendConfig,
    ) -> Self {
        let api = BackendApi::new(config.base_url.clone(), config.anon_key.clone());
        Self {
            event_sender,
            command_receiver,
            config,
            api,
            session: None,
            selected_topic: None,
            reconnect_delay: RECONNECT_BASE_DELAY,
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut socket: Option<RealtimeSocket> = None;
        // Deadline cho lần nối realtime kế tiếp. Chờ backoff diễn ra trong
        // select! nên lệnh từ UI (gửi tin, đổi chat) vẫn được xử lý ngay
        // trong lúc realtime đang đứt.
        let mut next_connect = Instant::now();
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("Backend event loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command, &mut socket).await;
                }
                insert = wait_for_insert(&mut socket) => {
                    match insert {
                        Ok(message) => {
                            self.emit(BackendEvent::MessageInserted(message)).await;
                        }
                        Err(err) => {
                            log::warn!("Realtime stream failed: {err}");
                            socket = None;
                            next_connect = Instant::now();
                            self.emit(BackendEvent::RealtimeStatus { connected: false }).await;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if let Some(active) = socket.as_mut() {
                        if let Err(err) = active.heartbeat().await {
                            log::warn!("Realtime heartbeat failed: {err}");
                            socket = None;
                            next_connect = Instant::now();
                            self.emit(BackendEvent::RealtimeStatus { connected: false }).await;
                        }
                    }
                }
                // Chỉ giữ kết nối realtime khi đã đăng nhập.
                _ = sleep_until(next_connect), if socket.is_none() && self.session.is_some() => {
                    socket = self.connect_realtime().await;
                    if socket.is_none() {
                        next_connect = Instant::now() + self.next_backoff();
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_command(
        &mut self,
        command: BackendCommand,
        socket: &mut Option<RealtimeSocket>,
    ) {
        match command {
            BackendCommand::LoadSession => self.load_session().await,
            BackendCommand::SignIn { email, password } => self.sign_in(email, password).await,
            BackendCommand::SignOut => self.sign_out(socket).await,
            BackendCommand::RefreshChats => self.refresh_chats().await,
            BackendCommand::SelectChat { chat_id } => self.select_chat(chat_id, socket).await,
            BackendCommand::SendMessage {
                local_id,
                chat_id,
                content,
            } => self.send_message(local_id, chat_id, content).await,
        }
    }

    /// Cổng phiên: đọc phiên đã lưu và hỏi lại backend xem còn hợp lệ không.
    async fn load_session(&mut self) {
        let Some(stored) = read_session(&self.config.session_path()) else {
            self.emit(BackendEvent::Unauthenticated { reason: None }).await;
            return;
        };

        self.api.set_access_token(Some(stored.access_token.clone()));
        match self.api.current_user().await {
            Ok(user) => {
                log::info!("Restored session for {}", user.email);
                self.session = Some(Session {
                    user: user.clone(),
                    ..stored
                });
                self.emit(BackendEvent::SessionLoaded(user)).await;
                self.refresh_chats().await;
            }
            Err(ApiError::Unauthorized) => {
                log::info!("Stored session rejected by backend, sign-in required");
                self.api.set_access_token(None);
                self.emit(BackendEvent::Unauthenticated {
                    reason: Some("Session expired, please sign in again".to_string()),
                })
                .await;
            }
            Err(err) => {
                log::warn!("Session lookup failed: {err}");
                self.api.set_access_token(None);
                self.emit(BackendEvent::Unauthenticated {
                    reason: Some(format!("Could not reach backend: {err}")),
                })
                .await;
            }
        }
    }

    async fn sign_in(&mut self, email: String, password: String) {
        match self.api.sign_in(&email, &password).await {
            Ok(session) => {
                log::info!("Signed in as {}", session.user.email);
                self.api.set_access_token(Some(session.access_token.clone()));
                if let Err(err) = write_session(&self.config.session_path(), &session) {
                    log::warn!("Failed to persist session: {err}");
                }
                let user = session.user.clone();
                self.session = Some(session);
                self.emit(BackendEvent::SessionLoaded(user)).await;
                self.refresh_chats().await;
            }
            Err(err) => {
                log::warn!("Sign-in failed: {err}");
                self.emit(BackendEvent::Unauthenticated {
                    reason: Some("Sign-in failed, check your email and password".to_string()),
                })
                .await;
            }
        }
    }

    async fn sign_out(&mut self, socket: &mut Option<RealtimeSocket>) {
        if let Some(active) = socket.as_mut() {
            if let Some(topic) = self.selected_topic.take() {
                let _ = active.leave(&topic).await;
            }
            let _ = active.leave(LIST_TOPIC).await;
        }
        *socket = None;
        self.selected_topic = None;
        self.session = None;
        self.api.set_access_token(None);

        if let Err(err) = fs::remove_file(self.config.session_path()) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove stored session: {err}");
            }
        }

        self.emit(BackendEvent::Unauthenticated { reason: None }).await;
    }

    async fn refresh_chats(&mut self) {
        let Some(user_id) = self.session.as_ref().map(|s| s.user.id.clone()) else {
            return;
        };

        match self.fetch_previews(&user_id).await {
            Ok(previews) => self.emit(BackendEvent::ChatsLoaded(previews)).await,
            Err(ApiError::Unauthorized) => self.handle_expired_session().await,
            Err(err) => {
                log::warn!("Chat list fetch failed: {err}");
                self.emit(BackendEvent::BackendError {
                    context: "chat list".to_string(),
                    detail: err.to_string(),
                })
                .await;
            }
        }
    }

    /// Danh sách chat của user, mỗi chat kèm tin nhắn mới nhất để preview
    /// và sắp xếp.
    async fn fetch_previews(&self, user_id: &str) -> Result<Vec<ChatPreview>, ApiError> {
        let chats = self.api.chats_for_user(user_id).await?;
        let mut previews = Vec::with_capacity(chats.len());

        for chat in chats {
            let latest = match self.api.latest_message(&chat.id).await {
                Ok(latest) => latest,
                Err(err) => {
                    log::warn!("Latest-message fetch failed for chat {}: {err}", chat.id);
                    None
                }
            };
            let (last_message, last_message_at) = match latest {
                Some((content, at)) => (Some(content), Some(at)),
                None => (None, None),
            };
            previews.push(ChatPreview {
                chat,
                last_message,
                last_message_at,
            });
        }

        sort_latest_first(&mut previews);
        Ok(previews)
    }

    /// Đổi chat đang chọn: luôn rời topic cũ trước, rồi fetch lịch sử,
    /// rồi mới join topic mới. Không bao giờ có hai topic chat cùng lúc.
    async fn select_chat(&mut self, chat_id: Option<String>, socket: &mut Option<RealtimeSocket>) {
        if let Some(previous) = self.selected_topic.take() {
            if let Some(active) = socket.as_mut() {
                if let Err(err) = active.leave(&previous).await {
                    log::warn!("Failed to leave realtime topic {previous}: {err}");
                    *socket = None;
                }
            }
        }

        let Some(chat_id) = chat_id else { return };

        match self.api.messages(&chat_id).await {
            Ok(messages) => {
                self.emit(BackendEvent::MessagesLoaded {
                    chat_id: chat_id.clone(),
                    messages,
                })
                .await;
            }
            Err(ApiError::Unauthorized) => {
                self.handle_expired_session().await;
                return;
            }
            Err(err) => {
                log::warn!("Message fetch failed for chat {chat_id}: {err}");
                self.emit(BackendEvent::BackendError {
                    context: "messages".to_string(),
                    detail: err.to_string(),
                })
                .await;
            }
        }

        let topic = chat_topic(&chat_id);
        if let Some(active) = socket.as_mut() {
            if let Err(err) = active.join(&topic).await {
                log::warn!("Failed to join realtime topic {topic}: {err}");
                *socket = None;
            }
        }
        // Ghi lại topic mong muốn kể cả khi socket đang đứt: reconnect sẽ join lại.
        self.selected_topic = Some(topic);
    }

    async fn send_message(&mut self, local_id: String, chat_id: String, content: String) {
        let Some(sender_id) = self.session.as_ref().map(|s| s.user.id.clone()) else {
            self.emit(BackendEvent::SendFailed {
                local_id,
                error: "not signed in".to_string(),
            })
            .await;
            return;
        };

        match self
            .api
            .insert_message(&local_id, &chat_id, &sender_id, &content)
            .await
        {
            Ok(()) => self.emit(BackendEvent::MessageSent { local_id }).await,
            Err(ApiError::Unauthorized) => self.handle_expired_session().await,
            Err(err) => {
                log::warn!("Message insert failed: {err}");
                self.emit(BackendEvent::SendFailed {
                    local_id,
                    error: err.to_string(),
                })
                .await;
            }
        }
    }

    /// Token bị backend từ chối giữa phiên: bỏ state đăng nhập và đưa UI
    /// về màn hình sign-in, giống khi load_session gặp phiên hết hạn.
    async fn handle_expired_session(&mut self) {
        log::info!("Access token rejected mid-session, sign-in required");
        self.session = None;
        self.selected_topic = None;
        self.api.set_access_token(None);
        self.emit(BackendEvent::Unauthenticated {
            reason: Some("Session expired, please sign in again".to_string()),
        })
        .await;
    }

    /// Mở kết nối realtime và join lại các topic đang cần (danh sách chat
    /// + chat đang chọn nếu có). Thất bại thì trả None để vòng lặp chính
    /// hẹn lại sau khoảng backoff.
    async fn connect_realtime(&mut self) -> Option<RealtimeSocket> {
        let url = self.config.realtime_url();
        match RealtimeSocket::connect(&url).await {
            Ok(mut socket) => {
                let mut joined = socket.join(LIST_TOPIC).await;
                if joined.is_ok() {
                    if let Some(topic) = self.selected_topic.clone() {
                        joined = socket.join(&topic).await;
                    }
                }

                match joined {
                    Ok(()) => {
                        self.reconnect_delay = RECONNECT_BASE_DELAY;
                        self.emit(BackendEvent::RealtimeStatus { connected: true }).await;
                        Some(socket)
                    }
                    Err(err) => {
                        log::warn!("Failed to join realtime topics: {err}");
                        None
                    }
                }
            }
            Err(err) => {
                log::warn!("Realtime connect failed: {err}");
                None
            }
        }
    }

    /// Khoảng chờ cho lần thử kế, nhân đôi dần và chặn trên 30 giây.
    fn next_backoff(&mut self) -> Duration {
        let delay = self.reconnect_delay;
        self.reconnect_delay = cmp::min(self.reconnect_delay * 2, RECONNECT_MAX_DELAY);
        log::info!("Retrying realtime connection in {delay:?}");
        delay
    }

    async fn emit(&self, event: BackendEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("UI event channel closed: {err}");
        }
    }
}

/// Pending mãi mãi khi chưa có kết nối, để nhánh select này không quay vòng.
async fn wait_for_insert(socket: &mut Option<RealtimeSocket>) -> Result<Message, RealtimeError> {
    match socket.as_mut() {
        Some(active) => active.next_insert().await,
        None => std::future::pending().await,
    }
}

fn read_session(path: &Path) -> Option<Session> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                log::warn!("Failed to parse stored session: {err}");
                None
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            log::warn!("Failed to read stored session: {err}");
            None
        }
    }
}

fn write_session(path: &Path, session: &Session) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string_pretty(session)?;
    fs::write(path, payload)
}
