pub mod aggregate;
pub mod config;
pub mod error;
pub mod fake_feed;
pub mod feed;
pub mod guard;
pub mod hooks;
pub mod http_client;
pub mod model;
pub mod orchestrator;
pub mod ranking;
pub mod standings;
pub mod store;
pub mod sync;
pub mod whatif;
