pub mod config;
pub mod error;
pub mod types;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use types::{new_id, now_millis, now_rfc3339};
