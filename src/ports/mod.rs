//! Port traits between the simulation core and the outside world.

pub mod candle_feed;
pub mod config_port;
pub mod event_sink;
pub mod report_port;
