#![forbid(unsafe_code)]

pub mod curriculum;
pub mod repository;
pub mod sqlite;

pub use curriculum::{JsonCurriculum, StaticCurriculum};
pub use repository::{
    ContentProvider, InMemoryRepository, ProgressKey, ProgressRepository, Storage, StorageError,
};
