use eframe::egui;

use crate::ui::state::AppState;

#[derive(Default)]
pub struct SidebarActions {
    pub selected_chat_id: Option<String>,
    pub refresh: bool,
    pub sign_out: bool,
}

pub fn render(ui: &mut egui::Ui, state: &AppState) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.horizontal(|ui| {
        ui.heading("Chats");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("Sign out").clicked() {
                actions.sign_out = true;
            }
            if ui.small_button("Refresh").clicked() {
                actions.refresh = true;
            }
        });
    });

    if let Some(user) = state.current_user() {
        ui.label(egui::RichText::new(user.email.clone()).weak().small());
    }
    ui.separator();

    if state.chats.is_empty() {
        ui.label("No conversations yet");
        return actions;
    }

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for preview in &state.chats {
                let selected =
                    state.selected_chat_id.as_deref() == Some(preview.chat.id.as_str());

                let date = preview
                    .last_message_at
                    .map(|at| at.with_timezone(&chrono::Local).format("%d %b").to_string())
                    .unwrap_or_default();

                let kind = if preview.chat.is_group { "Group" } else { "Person" };
                let mut badges = kind.to_string();
                if let Some(tags) = &preview.chat.tags {
                    for tag in tags {
                        badges.push_str("  #");
                        badges.push_str(tag);
                    }
                }

                let entry = format!(
                    "{}  {}\n{}\n{}",
                    preview.display_title(),
                    date,
                    truncate(preview.preview_text(), 48),
                    badges
                );

                if ui.selectable_label(selected, entry).clicked() {
                    actions.selected_chat_id = Some(preview.chat.id.clone());
                }
                ui.separator();
            }
        });

    actions
}

/// Preview một dòng, cắt bớt cho vừa sidebar.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let short: String = text.chars().take(max_chars).collect();
    format!("{short}…")
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn long_text_is_cut_at_char_boundary() {
        assert_eq!(truncate("xin chào cả nhà", 8), "xin chào…");
    }
}
