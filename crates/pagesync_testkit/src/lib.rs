//! # pagesync Testkit
//!
//! Test utilities for the pagesync engine.
//!
//! This crate provides:
//! - `ScriptedTransport`, a transport whose responses are queued ahead of
//!   time or released by hand to force a completion order
//! - Resource fixtures and list body builders
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagesync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn out_of_order() {
//!     let transport = Arc::new(ScriptedTransport::new());
//!     let slow = transport.push_gate();
//!     transport.push_json(clients_page(2, 20, 45));
//!     // ... issue two fetches, then release `slow`
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::transport::*;
}

pub use fixtures::*;
pub use generators::*;
pub use transport::*;
