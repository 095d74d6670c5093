//! Shared test infrastructure for plexsafe-archive
//!
//! - Fixture trees mirroring a media server data directory
//! - Mock service controllers, settings stores and backends
//! - Helpers to list archive entries and snapshot directory trees

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
