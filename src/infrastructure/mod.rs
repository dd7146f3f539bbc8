//! Adapters behind the domain ports: stores, gateways and clocks.

pub mod clock;
pub mod gateway;
pub mod in_memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;
