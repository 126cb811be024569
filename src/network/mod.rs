pub mod api;
pub mod client;
pub mod realtime;

pub use client::BackendClient;
