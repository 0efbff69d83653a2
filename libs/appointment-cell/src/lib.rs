pub mod context;
pub mod models;
pub mod handlers;
pub mod router;
pub mod services;

pub use context::BookingContext;
pub use models::*;
pub use router::*;
pub use services::*;
