pub mod error;
pub mod models;
pub mod services;

pub use error::RealtimeError;
pub use models::*;
pub use services::*;
