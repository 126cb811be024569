mod common;
mod config;
mod network;
mod ui;

use clap::Parser;
use dotenvy::dotenv;
use network::BackendClient;
use tokio::sync::mpsc;
use ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "rust_cloud_chat",
    version,
    about = "Desktop chat client for a hosted Supabase-style backend"
)]
struct Cli {
    /// Backend base URL (overrides CHAT_BACKEND_URL)
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Public (anon) API key (overrides CHAT_BACKEND_ANON_KEY)
    #[arg(long, value_name = "KEY")]
    anon_key: Option<String>,
    /// Directory for the persisted session file
    #[arg(long, default_value = config::DEFAULT_DATA_DIR, value_name = "DIR")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let backend_config = match config::resolve(cli.url, cli.anon_key, cli.data_dir) {
        Ok(config) => config,
        Err(err) => {
            log::error!("Backend configuration is incomplete: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = config::ensure_data_dir(&backend_config.data_dir) {
        log::warn!("Unable to create data directory: {err}");
    }

    run_client(backend_config).await
}

async fn run_client(backend_config: config::BackendConfig) -> Result<(), eframe::Error> {
    // 1. Tạo các kênh giao tiếp (Channels)
    // UI -> Backend
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Backend -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy Backend Actor (Chạy ngầm)
    let actor_config = backend_config.clone();
    tokio::spawn(async move {
        let client = BackendClient::new(event_tx, cmd_rx, actor_config);
        if let Err(err) = client.run().await {
            log::error!("Backend client terminated: {err}");
        }
    });

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);

    eframe::run_native(
        "Rust Cloud Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!("Client started against {}", backend_config.base_url);

            Ok(Box::new(ChatApp::new(cc, cmd_tx.clone(), event_receiver)))
        }),
    )
}
