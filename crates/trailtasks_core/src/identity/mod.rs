//! Identity boundary: provider contract, embedded provider, adapter.
//!
//! # Responsibility
//! - Define the external identity-provider contract and error taxonomy.
//! - Wrap the provider behind the username-based TrailTasks adapter.
//!
//! # Invariants
//! - Username validation happens before any provider call.
//! - Session transitions are published only through the adapter's watch.

pub mod adapter;
pub mod local_provider;
pub mod provider;
