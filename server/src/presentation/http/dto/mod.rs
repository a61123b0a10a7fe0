//! Wire DTOs for the HTTP surface — thin, serde-only shapes kept separate
//! from the domain entities they project so a response field can change
//! without touching the scanner or the job queue.

pub mod job_dto;
pub mod library_dto;
