use std::sync::OnceLock;

use eframe::egui;
use regex::Regex;

use crate::ui::state::{AppState, SessionState};

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Màn hình đăng nhập (tương đương route chưa xác thực của bản web).
pub fn render(ui: &mut egui::Ui, state: &mut AppState) -> Option<LoginRequest> {
    let mut request = None;

    ui.vertical_centered(|ui| {
        ui.add_space(80.0);
        ui.heading("Sign in");

        if let SessionState::Unauthenticated {
            reason: Some(reason),
        } = &state.session
        {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::RED, reason);
        }

        ui.add_space(16.0);
        ui.label("Email");
        let email_response =
            ui.add(egui::TextEdit::singleline(&mut state.login_email).desired_width(240.0));
        ui.label("Password");
        let password_response = ui.add(
            egui::TextEdit::singleline(&mut state.login_password)
                .password(true)
                .desired_width(240.0),
        );

        ui.add_space(12.0);
        // Enter trong một ô nhập cũng gửi form, giống khung soạn tin.
        let submitted = ui.button("Sign in").clicked()
            || ((email_response.lost_focus() || password_response.lost_focus())
                && ui.input(|i| i.key_pressed(egui::Key::Enter)));
        if submitted {
            request = validate(state);
        }

        if let Some(error) = &state.last_error {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::RED, error);
        }
    });

    request
}

/// Kiểm tra form và dựng request đăng nhập, ghi lỗi vào state nếu chưa hợp lệ.
fn validate(state: &mut AppState) -> Option<LoginRequest> {
    let email = state.login_email.trim().to_string();
    if !is_valid_email(&email) {
        state.last_error = Some("Enter a valid email address".to_string());
        return None;
    }
    if state.login_password.is_empty() {
        state.last_error = Some("Password must not be empty".to_string());
        return None;
    }
    state.last_error = None;
    Some(LoginRequest {
        email,
        password: state.login_password.clone(),
    })
}

/// Kiểm tra sơ bộ trước khi gọi backend; backend vẫn là nơi quyết định.
fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"))
        .is_match(email)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_email, validate};
    use crate::ui::state::AppState;

    #[test]
    fn valid_form_builds_request_with_trimmed_email() {
        let mut state = AppState::new();
        state.login_email = "  user@example.com ".to_string();
        state.login_password = "secret".to_string();

        let request = validate(&mut state).expect("form should validate");
        assert_eq!(request.email, "user@example.com");
        assert_eq!(request.password, "secret");
        assert!(state.last_error.is_none());
    }

    #[test]
    fn invalid_email_or_empty_password_is_rejected() {
        let mut state = AppState::new();
        state.login_email = "no-at-sign".to_string();
        state.login_password = "secret".to_string();
        assert!(validate(&mut state).is_none());
        assert!(state.last_error.is_some());

        state.login_email = "user@example.com".to_string();
        state.login_password.clear();
        assert!(validate(&mut state).is_none());
        assert!(state.last_error.is_some());
    }

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+tag@sub.domain.org"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com "));
        assert!(!is_valid_email("spaces in@example.com"));
    }
}
