//! Application services — stateful orchestration components shared across
//! use cases and the HTTP surface.

pub mod agent_loop;
pub mod job_queue;
pub mod library_scanner;
pub mod pipeline;
pub mod scheduler;
pub mod term_map;
pub mod translator;

pub use agent_loop::AgentLoop;
pub use job_queue::{JobExecutor, JobQueue, NewJob};
pub use library_scanner::{LibraryScanner, ScannerTtls, SourceConfig};
pub use pipeline::{compute_output_path, TranslationPipeline};
pub use scheduler::{MediaRootConfig, Scheduler};
pub use term_map::{TermMapGenerator, TermMapStore};
pub use translator::Translator;
