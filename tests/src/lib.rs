//! # Sockline Test Suite
//!
//! Unified test crate for cross-crate scenarios: real servers on temp-dir
//! Unix sockets, real clients, real frames. Per-module unit tests live next
//! to the code in each crate; everything here exercises the public surfaces
//! together.
//!
//! ```text
//! tests/src/
//! ├── support.rs        # tracing init, server/client fixtures
//! └── integration/
//!     ├── echo.rs       # round trips, payload sizes, user agents, transforms
//!     ├── dispatch.rs   # routing order, protocol errors, out-of-order responses
//!     ├── timeouts.rs   # deadlines, grace windows, ID uniqueness under load
//!     ├── disconnect.rs # drain-on-disconnect, fail-fast sends
//!     ├── reconnect.rs  # recovery across a server restart
//!     ├── stats.rs      # interval counters after known traffic
//!     └── push.rs       # unsolicited server frames
//! ```
//!
//! Run with `cargo test -p sockline-tests`.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
