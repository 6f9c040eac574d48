//! # Scoring Module
//!
//! Rule-based pragmatic-competence scoring for COMETI-K transcripts.
//!
//! ## Key Components:
//! - **ScoringRecord**: the eleven-field result shape, wire-compatible with
//!   the original API
//! - **ScoringPolicy**: heuristic tier table, or structured-answer parsing
//!   with heuristic fallback
//! - **StructuredTextParser**: regex extraction from a fixed-format block

pub mod engine;
pub mod record;

pub use engine::{ScoringPolicy, StructuredTextParser};
pub use record::ScoringRecord;
