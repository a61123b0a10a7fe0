//! ctxtransd library crate.
//!
//! A context-aware subtitle translation daemon: watches media library
//! directories, detects missing target-language subtitles, and drives an
//! LLM agent loop to produce them as durable, resumable jobs. Exposes the
//! core modules for integration tests and the binary entry point.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;

