use eframe::egui;

use crate::common::ChatPreview;

pub fn render(ui: &mut egui::Ui, preview: &ChatPreview, realtime_connected: bool) {
    ui.horizontal(|ui| {
        let initial = preview
            .display_title()
            .chars()
            .next()
            .unwrap_or('C')
            .to_uppercase()
            .to_string();
        ui.label(egui::RichText::new(initial).strong().size(20.0));

        ui.vertical(|ui| {
            ui.label(egui::RichText::new(preview.display_title()).strong());
            let subtitle = if preview.chat.is_group { "Group" } else { "Active now" };
            ui.label(egui::RichText::new(subtitle).weak().small());
        });

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if realtime_connected {
                ui.colored_label(egui::Color32::GREEN, "● live");
            } else {
                ui.colored_label(egui::Color32::GRAY, "○ reconnecting");
            }
        });
    });
}
