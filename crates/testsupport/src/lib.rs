pub mod app;
pub mod helpers;
pub mod http_client;
pub mod metrics;

pub use app::*;
pub use helpers::*;
pub use http_client::*;
pub use metrics::*;
