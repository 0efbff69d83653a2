pub mod bus;
pub mod coalesce;
pub mod feed;

pub use bus::RealtimeBus;
pub use coalesce::{Coalescer, ErrorLogLimiter};
pub use feed::{ChangeFeed, ChannelFeed};
