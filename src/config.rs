use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";
const SESSION_FILE: &str = "session.json";

const URL_ENV: &str = "CHAT_BACKEND_URL";
const ANON_KEY_ENV: &str = "CHAT_BACKEND_ANON_KEY";

/// Thông tin kết nối tới dịch vụ backend (endpoint + public key).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub anon_key: String,
    pub data_dir: PathBuf,
}

impl BackendConfig {
    /// Đường dẫn file phiên đăng nhập đã lưu.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    /// Endpoint websocket realtime, suy ra từ base_url.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("wss://{}", self.base_url)
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base.trim_end_matches('/'),
            self.anon_key
        )
    }
}

/// Ghép cấu hình từ tham số CLI (ưu tiên) và biến môi trường.
pub fn resolve(
    url: Option<String>,
    anon_key: Option<String>,
    data_dir: String,
) -> Result<BackendConfig, String> {
    let base_url = url
        .or_else(|| env::var(URL_ENV).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("{URL_ENV} is not set (or pass --url)"))?;
    let anon_key = anon_key
        .or_else(|| env::var(ANON_KEY_ENV).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("{ANON_KEY_ENV} is not set (or pass --anon-key)"))?;

    Ok(BackendConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        anon_key,
        data_dir: PathBuf::from(data_dir),
    })
}

/// Ensure data directory exists
pub fn ensure_data_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            anon_key: "anon-key".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }

    #[test]
    fn realtime_url_swaps_scheme_and_appends_key() {
        let url = config("https://example.supabase.co").realtime_url();
        assert_eq!(
            url,
            "wss://example.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn realtime_url_keeps_plain_ws_for_http() {
        let url = config("http://localhost:54321").realtime_url();
        assert!(url.starts_with("ws://localhost:54321/realtime/v1/websocket"));
    }

    #[test]
    fn session_path_is_under_data_dir() {
        let path = config("https://example.supabase.co").session_path();
        assert_eq!(path, PathBuf::from("data").join("session.json"));
    }
}
