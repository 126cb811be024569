use eframe::egui;

use crate::ui::state::{AppState, PaneState};

/// Vẽ lịch sử chat. Trả về local_id nếu người dùng bấm gửi lại một tin lỗi.
pub fn render(ui: &mut egui::Ui, state: &AppState) -> Option<String> {
    let mut retry_requested = None;

    match &state.pane {
        PaneState::Idle => {}
        PaneState::Loading { .. } => {
            ui.label("Loading chat...");
        }
        PaneState::Ready { messages, .. } => {
            let user_id = state
                .current_user()
                .map(|user| user.id.clone())
                .unwrap_or_default();

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for message in messages {
                        let is_sender = message.sender_id == user_id;
                        let layout = if is_sender {
                            egui::Layout::right_to_left(egui::Align::Min)
                        } else {
                            egui::Layout::left_to_right(egui::Align::Min)
                        };

                        ui.with_layout(layout, |ui| {
                            egui::Frame::group(ui.style()).show(ui, |ui| {
                                ui.set_max_width(ui.available_width() * 0.7);
                                ui.vertical(|ui| {
                                    ui.label(&message.content);
                                    let stamp = message
                                        .created_at
                                        .with_timezone(&chrono::Local)
                                        .format("%H:%M:%S")
                                        .to_string();
                                    ui.label(egui::RichText::new(stamp).weak().small());

                                    if state.is_failed(&message.id) {
                                        ui.horizontal(|ui| {
                                            ui.colored_label(egui::Color32::RED, "Not sent");
                                            if ui.small_button("Retry").clicked() {
                                                retry_requested = Some(message.id.clone());
                                            }
                                        });
                                    }
                                });
                            });
                        });
                        ui.add_space(4.0);
                    }
                });
        }
    }

    retry_requested
}
