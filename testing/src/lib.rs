//! Shared test fixtures for the service data workspace.
//!
//! Provides a single PostgreSQL testcontainer shared by every integration
//! test of the process, plus helpers to lay out an empty reporting table.
//! Fixtures resolve to `None` when Docker is unavailable so that tests can
//! skip instead of failing.

mod fixtures;

pub use fixtures::*;
