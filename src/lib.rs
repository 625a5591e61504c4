//! dubsync - automated video dubbing
//!
//! Transcribes speech with per-segment speaker profiles, translates the
//! subtitles, synthesizes replacement speech matched to each cue's timing and
//! voice, and composites the segments into one track for remuxing.

pub mod audio;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod matcher;
pub mod media;
pub mod profile;
pub mod segmenter;
pub mod session;
pub mod speaker;
pub mod subtitle;
pub mod sync;
pub mod synth;
pub mod timecode;
pub mod transcribe;
pub mod translate;
pub mod workflow;

pub use config::Config;
pub use error::{DubError, Result};
