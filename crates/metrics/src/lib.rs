pub mod service;
pub mod tracing;

pub use crate::service::MetricsService;
pub use crate::tracing::TracingService;
