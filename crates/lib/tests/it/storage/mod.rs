//! Storage engine integration tests
//!
//! Persistence, snapshot rotation, recovery from damaged files, migration
//! of legacy documents and the read-only health check.

mod health;
mod migration;
mod recovery;
