pub mod auth;
pub mod jobs;
pub mod migrations;
pub mod plane;
pub mod registry;
pub mod tasks;

pub use auth::*;
pub use jobs::*;
pub use plane::*;
pub use registry::*;
pub use tasks::*;
