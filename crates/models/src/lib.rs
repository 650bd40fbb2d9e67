pub mod chunk;
pub mod config;
pub mod error;
pub mod job;
pub mod quiz;
pub mod upload;
pub mod user;

pub use chunk::*;
pub use config::*;
pub use error::*;
pub use job::*;
pub use quiz::*;
pub use upload::*;
pub use user::*;
