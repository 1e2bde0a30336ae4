//! Common test utilities and helper modules
//!
//! Shared by every test crate: a scripted in-memory transport and helpers
//! for building sessions and waiting on their events.

#![allow(dead_code)]

pub mod mock_transport;
pub mod test_helpers;
