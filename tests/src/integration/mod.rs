//! Cross-crate integration scenarios.

pub mod disconnect;
pub mod dispatch;
pub mod reconnect;
pub mod timeouts;
