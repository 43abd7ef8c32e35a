//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait. The RPC layer only ever sees them as
//! [`TransportPtr`](crate::TransportPtr).

mod memory;

pub use memory::{create_memory_transport_pair, MemoryTransport};
