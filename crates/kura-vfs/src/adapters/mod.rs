//! Adapter implementations.

pub mod local;
pub mod memory;

pub use local::LocalAdapter;
pub use memory::MemoryAdapter;
