pub mod actor;
pub mod client;
pub mod config;
pub mod debounce;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod poller;
pub mod queue;
pub mod throttle;
pub mod timer;
pub mod transport;
pub mod ws;
