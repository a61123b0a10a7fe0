//! Domain Entities - objects with identity and lifecycle
//!
//! Jobs and checkpoints carry a persisted identity (C1/C3); library
//! projection types (Source/Item/Episode) are derived views recomputed
//! by the scanner on every read, never persisted.

pub mod agent;
pub mod job;
pub mod library;
pub mod media_meta_cache;
pub mod subtitle_cache;
pub mod term_map;

pub use agent::{AgentResult, ToolCallRecord};
pub use job::{BatchCheckpoint, EnqueueRequest, TranslationJob};
pub use library::{Episode, Item, Source, SubtitleCoverage};
pub use media_meta_cache::MediaMetaCache;
pub use subtitle_cache::{SubtitleCache, SubtitleLine};
pub use term_map::TermMap;
