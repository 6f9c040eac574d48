//! # Transcription Module
//!
//! Speech-to-text for uploaded assessment answers using Whisper models via
//! the Candle-rs framework, pure Rust without FFI bindings to whisper.cpp.
//!
//! ## Key Components:
//! - **TranscriptionService**: buffers uploads, decodes audio, runs the model
//! - **WhisperModel**: checkpoint loading and inference
//! - **audio**: WAV/PCM decoding into 16 kHz mono samples
//!
//! The whole module is optional at runtime: when transcription is disabled
//! (or the model fails to load on a memory-constrained host) no service is
//! constructed and audio uploads are rejected with 503.

pub mod audio;
pub mod model;
pub mod service;

pub use model::ModelSize;
pub use service::{TranscriptionError, TranscriptionService};
