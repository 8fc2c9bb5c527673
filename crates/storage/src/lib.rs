#![forbid(unsafe_code)]

pub mod repository;
pub mod slot;
pub mod sqlite;

pub use repository::{Storage, StorageError};
pub use slot::{DurableSlot, FileSlot, InMemorySlot};
