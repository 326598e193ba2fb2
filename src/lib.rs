pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod upstream;

pub use api::router;
pub use config::AppConfig;
pub use error::{GatewayError, NormalizeError, UpstreamError};
pub use service::NotaService;
pub use upstream::SiegClient;
