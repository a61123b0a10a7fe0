//! Video-probe adapter (A3).

mod ffprobe_adapter;

pub use ffprobe_adapter::{FfprobeAdapter, ProbeError, ProbeResult, VideoProbe};
