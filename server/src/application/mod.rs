//! Application layer: use cases and stateful services that orchestrate the
//! domain and infrastructure layers.

pub mod services;

pub use services::{
    compute_output_path, AgentLoop, JobExecutor, JobQueue, LibraryScanner, MediaRootConfig, NewJob, Scheduler,
    ScannerTtls, SourceConfig, TermMapGenerator, TermMapStore, TranslationPipeline, Translator,
};
