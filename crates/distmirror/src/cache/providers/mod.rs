//! # Store Providers

pub use self::file::FileStore;
pub use self::memory::MemoryStore;
pub use self::provider::ContentStore;

pub mod provider;

pub mod file;
pub mod memory;
