//! Minimal Chrome DevTools Protocol client
//!
//! Three layers:
//! - [`transport`]: process launch + WebSocket framing
//! - [`connection`]: browser-level commands and target attachment
//! - [`types`]: hand-written command/response shapes

pub mod connection;
pub mod transport;
pub mod types;

pub use connection::{Connection, TargetSession};
pub use transport::{find_chrome, launch_chrome, Transport};
pub use types::{BoxModel, KeyEventType, MouseButton, MouseEventType};
