//! Domain Layer - Pure business logic and domain models
//!
//! - Entities: job-queue and pipeline objects with identity
//! - Value Objects: immutable attribute-defined types (language tags, finish reasons)
//! - Repositories: abstractions over persistence

pub mod entities;
pub mod repositories;
pub mod value_objects;

pub use entities::{
    AgentResult, BatchCheckpoint, Episode, Item, MediaMetaCache, Source, SubtitleCache, TermMap,
    ToolCallRecord, TranslationJob,
};
pub use repositories::PersistenceStore;
pub use value_objects::{FinishReason, JobState, Language};
