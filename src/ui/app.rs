use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{BackendCommand, BackendEvent};

use super::components::{chat_area, chat_header, input_bar, login, sidebar};
use super::state::{AppState, SessionState};

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<BackendCommand>,
    event_receiver: mpsc::Receiver<BackendEvent>,
}

impl ChatApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<BackendCommand>,
        event_receiver: mpsc::Receiver<BackendEvent>,
    ) -> Self {
        let app = Self {
            state: AppState::new(),
            command_sender,
            event_receiver,
        };
        // Cổng phiên: hỏi backend ngay khi UI dựng xong.
        app.send_command(BackendCommand::LoadSession);
        app
    }

    fn handle_backend_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                BackendEvent::SessionLoaded(user) => self.state.set_authenticated(user),
                BackendEvent::Unauthenticated { reason } => self.state.reset_to_login(reason),
                BackendEvent::ChatsLoaded(previews) => self.state.set_chats(previews),
                BackendEvent::MessagesLoaded { chat_id, messages } => {
                    self.state.apply_messages_loaded(chat_id, messages);
                }
                BackendEvent::MessageInserted(message) => self.state.apply_insert(message),
                BackendEvent::MessageSent { local_id } => self.state.confirm_send(&local_id),
                BackendEvent::SendFailed { local_id, error } => {
                    self.state.fail_send(&local_id, error);
                }
                BackendEvent::RealtimeStatus { connected } => {
                    self.state.realtime_connected = connected;
                }
                BackendEvent::BackendError { context, detail } => {
                    self.state.last_error = Some(format!("{context}: {detail}"));
                }
            }
        }
    }

    fn send_command(&self, command: BackendCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to backend: {err}");
        }
    }

    fn render_loading(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.label("Loading session...");
            });
        });
    }

    fn render_login(&mut self, ctx: &egui::Context) {
        let request = egui::CentralPanel::default()
            .show(ctx, |ui| login::render(ui, &mut self.state))
            .inner;

        if let Some(request) = request {
            self.state.session = SessionState::Loading;
            self.send_command(BackendCommand::SignIn {
                email: request.email,
                password: request.password,
            });
        }
    }

    fn render_chat(&mut self, ctx: &egui::Context) {
        let sidebar_actions = egui::SidePanel::left("chat_sidebar")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| sidebar::render(ui, &self.state))
            .inner;

        let mut submit_requested = false;
        if self.state.selected_chat_id.is_some() {
            submit_requested = egui::TopBottomPanel::bottom("composer")
                .show(ctx, |ui| {
                    let send = input_bar::render(ui, &mut self.state.input_text);
                    if let Some(error) = &self.state.last_error {
                        ui.label(egui::RichText::new(error).color(egui::Color32::RED).small());
                    }
                    send
                })
                .inner;
        }

        let retry_requested = egui::CentralPanel::default()
            .show(ctx, |ui| {
                if self.state.selected_chat_id.is_none() {
                    ui.centered_and_justified(|ui| {
                        ui.label("Select a chat to start messaging");
                    });
                    return None;
                }

                if let Some(preview) = self.state.selected_preview() {
                    chat_header::render(ui, preview, self.state.realtime_connected);
                    ui.separator();
                }
                chat_area::render(ui, &self.state)
            })
            .inner;

        if sidebar_actions.refresh {
            self.send_command(BackendCommand::RefreshChats);
        }
        if sidebar_actions.sign_out {
            self.send_command(BackendCommand::SignOut);
        }
        if let Some(chat_id) = sidebar_actions.selected_chat_id {
            // Bấm lại chat đang mở thì thôi, khỏi fetch lại.
            if self.state.selected_chat_id.as_deref() != Some(chat_id.as_str()) {
                self.state.select_chat(Some(chat_id.clone()));
                self.send_command(BackendCommand::SelectChat {
                    chat_id: Some(chat_id),
                });
            }
        }

        if submit_requested {
            if let Some(content) = self.state.take_composed() {
                let outgoing = content.clone();
                if let Some((local_id, chat_id)) = self.state.begin_send(content) {
                    self.send_command(BackendCommand::SendMessage {
                        local_id,
                        chat_id,
                        content: outgoing,
                    });
                }
            }
        }

        if let Some(local_id) = retry_requested {
            if let Some((chat_id, content)) = self.state.begin_retry(&local_id) {
                self.send_command(BackendCommand::SendMessage {
                    local_id,
                    chat_id,
                    content,
                });
            }
        }
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_backend_events();

        if matches!(self.state.session, SessionState::Loading) {
            self.render_loading(ctx);
        } else if matches!(self.state.session, SessionState::Unauthenticated { .. }) {
            self.render_login(ctx);
        } else {
            self.render_chat(ctx);
        }

        ctx.request_repaint();
    }
}
