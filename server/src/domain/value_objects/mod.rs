//! Value Objects - immutable, attribute-defined types
//!
//! Value objects carry no identity of their own; two instances with the
//! same attributes are interchangeable.

pub mod finish_reason;
pub mod job_state;
pub mod language;
pub mod media_extensions;

pub use finish_reason::FinishReason;
pub use job_state::JobState;
pub use language::Language;
