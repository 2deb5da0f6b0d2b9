//! Domain models shared across identity, store, and controller layers.
//!
//! # Responsibility
//! - Define the canonical task, user, and session records.
//! - Keep derived-view helpers (filters, counts) next to the data they read.

pub mod task;
pub mod user;
