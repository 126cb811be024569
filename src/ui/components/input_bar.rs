use eframe::egui;

/// Trả về true khi người dùng yêu cầu gửi (bấm Send hoặc Enter).
/// Việc trim và bỏ qua nội dung rỗng do AppState quyết định.
pub fn render(ui: &mut egui::Ui, input_text: &mut String) -> bool {
    let mut send = false;
    ui.horizontal(|ui| {
        let response = ui.add_sized(
            [ui.available_width() - 56.0, 24.0],
            egui::TextEdit::singleline(input_text).hint_text("Type a message"),
        );
        if ui.button("Send").clicked() {
            send = true;
        }

        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            send = true;
        }
    });

    send
}
