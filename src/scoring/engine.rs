//! # Scoring Engine
//!
//! Maps a transcript to a [`ScoringRecord`] using a rule-based policy over
//! word counts. The engine is pure, deterministic and total: it always
//! produces a record, even for an empty transcript.
//!
//! ## Policies:
//! - **Heuristic**: the word-count tier table used in production.
//! - **StructuredText**: extracts a record from a fixed-format model answer
//!   block. Selected at construction so the parser stays independently
//!   testable; on a malformed block the engine falls back to the heuristic
//!   to preserve totality.
//!
//! ## Tier table (n = whitespace-separated tokens):
//!
//! | tier | condition   | DSM-5 A1..A4 | discourse A5..A6 |
//! |------|-------------|--------------|------------------|
//! | low  | n < 5       | 0,0,1,0      | 0,1              |
//! | mid  | 5 <= n < 15 | 1,1,1,0      | 1,1              |
//! | high | n >= 15     | 2,2,2,1      | 2,2              |
//!
//! The syntactic-complexity (1) and disfluency (2) sub-scores are fixed
//! constants in every tier: a placeholder policy awaiting a real measurement,
//! kept explicit rather than hidden. There is also no tier above `n >= 15`,
//! so arbitrarily long transcripts score the same as a 15-word answer.

use crate::scoring::record::ScoringRecord;
use anyhow::{anyhow, Result};
use regex::Regex;

/// Placeholder sub-score for syntactic complexity, identical in every tier.
const SYNTACTIC_COMPLEXITY_PLACEHOLDER: u8 = 1;

/// Placeholder sub-score for disfluencies, identical in every tier.
const DISFLUENCY_PLACEHOLDER: u8 = 2;

/// Scoring policy, selected once at service construction.
pub enum ScoringPolicy {
    /// Word-count tier heuristic.
    Heuristic,

    /// Parse a structured model answer; fall back to the heuristic when the
    /// block does not match the expected format.
    StructuredText(StructuredTextParser),
}

impl ScoringPolicy {
    /// Build the policy named in the configuration.
    pub fn from_config(name: &str) -> Result<Self> {
        match name {
            "heuristic" => Ok(ScoringPolicy::Heuristic),
            "structured_text" => Ok(ScoringPolicy::StructuredText(StructuredTextParser::new())),
            other => Err(anyhow!("Unknown scoring policy: {}", other)),
        }
    }

    /// Score one transcript. Total: never fails, any input yields a record.
    ///
    /// `pregunta_id` does not influence the current policies; it is carried
    /// for traceability only.
    pub fn score(&self, transcript: &str, pregunta_id: &str) -> ScoringRecord {
        let record = match self {
            ScoringPolicy::Heuristic => heuristic_score(transcript),
            ScoringPolicy::StructuredText(parser) => match parser.parse(transcript) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        pregunta_id = %pregunta_id,
                        error = %e,
                        "Structured answer did not parse, falling back to heuristic"
                    );
                    heuristic_score(transcript)
                }
            },
        };

        tracing::debug!(
            pregunta_id = %pregunta_id,
            dsm5 = record.dsm5_score,
            ampliada = record.extended_score,
            "Transcript scored"
        );

        record
    }
}

/// Apply the word-count tier table.
fn heuristic_score(transcript: &str) -> ScoringRecord {
    let word_count = transcript.split_whitespace().count();

    let (dsm5, discourse, comment) = if word_count < 5 {
        (
            [0u8, 0, 1, 0],
            [0u8, 1],
            "Respuesta muy corta. Baja evidencia de competencia pragmática.",
        )
    } else if word_count < 15 {
        (
            [1, 1, 1, 0],
            [1, 1],
            "Respuesta coherente, pero breve. Competencia media.",
        )
    } else {
        (
            [2, 2, 2, 1],
            [2, 2],
            "Respuesta fluida con buena articulación. Alta competencia pragmática.",
        )
    };

    let dsm5_sum: u32 = dsm5.iter().map(|&s| s as u32).sum();
    let total_sum: u32 = dsm5_sum + discourse.iter().map(|&s| s as u32).sum::<u32>();

    ScoringRecord {
        dsm5_score: round2(dsm5_sum as f64 / 4.0),
        extended_score: round2(total_sum as f64 / 6.0),
        comment: comment.to_string(),
        social_use: dsm5[0],
        context_adjustment: dsm5[1],
        conversational_norms: dsm5[2],
        nonliteral_comprehension: dsm5[3],
        coherence: discourse[0],
        cohesion: discourse[1],
        syntactic_complexity: SYNTACTIC_COMPLEXITY_PLACEHOLDER,
        disfluencies: DISFLUENCY_PLACEHOLDER,
    }
}

/// Round to two decimal places, matching the aggregate-score contract.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parser for the fixed-format structured answer block.
///
/// ## Expected block:
/// One labeled value per line, integers in {0, 1, 2} for sub-scores, decimal
/// values for the two aggregates, free text for the comment:
///
/// ```text
/// CALIFICACION_DSM5: 1.75
/// CALIFICACION_AMPLIADA: 1.83
/// A1_USO_SOCIAL: 2
/// A2_AJUSTE_CONTEXTO: 2
/// A3_NORMAS_CONVERSACIONALES: 2
/// A4_COMPRENSION_NO_LITERAL: 1
/// A5_COHERENCIA: 2
/// A6_COHESION: 2
/// COMPLEJIDAD_SINTACTICA: 1
/// DISFLUENCIAS: 2
/// COMENTARIO: Respuesta fluida con buena articulación.
/// ```
///
/// Label order does not matter; each label must appear exactly once.
pub struct StructuredTextParser {
    int_field: Regex,
    float_field: Regex,
    comment_field: Regex,
}

impl StructuredTextParser {
    pub fn new() -> Self {
        // The two patterns differ only in the captured value shape; labels
        // are substituted per field at parse time.
        Self {
            int_field: Regex::new(r"(?m)^\s*([A-Z0-9_]+):\s*([0-9]+)\s*$").expect("valid regex"),
            float_field: Regex::new(r"(?m)^\s*([A-Z0-9_]+):\s*([0-9]+(?:\.[0-9]+)?)\s*$")
                .expect("valid regex"),
            comment_field: Regex::new(r"(?m)^\s*COMENTARIO:\s*(.+?)\s*$").expect("valid regex"),
        }
    }

    /// Extract a full [`ScoringRecord`] from a structured block.
    ///
    /// Fails when a label is missing, duplicated, or carries a sub-score
    /// outside {0, 1, 2}.
    pub fn parse(&self, block: &str) -> Result<ScoringRecord> {
        let social_use = self.int_value(block, "A1_USO_SOCIAL")?;
        let context_adjustment = self.int_value(block, "A2_AJUSTE_CONTEXTO")?;
        let conversational_norms = self.int_value(block, "A3_NORMAS_CONVERSACIONALES")?;
        let nonliteral_comprehension = self.int_value(block, "A4_COMPRENSION_NO_LITERAL")?;
        let coherence = self.int_value(block, "A5_COHERENCIA")?;
        let cohesion = self.int_value(block, "A6_COHESION")?;
        let syntactic_complexity = self.int_value(block, "COMPLEJIDAD_SINTACTICA")?;
        let disfluencies = self.int_value(block, "DISFLUENCIAS")?;

        let dsm5_score = self.float_value(block, "CALIFICACION_DSM5")?;
        let extended_score = self.float_value(block, "CALIFICACION_AMPLIADA")?;

        if !(0.0..=2.0).contains(&dsm5_score) || !(0.0..=2.0).contains(&extended_score) {
            return Err(anyhow!(
                "aggregate scores out of range: dsm5={}, ampliada={}",
                dsm5_score,
                extended_score
            ));
        }

        let comment = self
            .comment_field
            .captures(block)
            .map(|c| c[1].to_string())
            .ok_or_else(|| anyhow!("missing COMENTARIO line"))?;

        Ok(ScoringRecord {
            dsm5_score: round2(dsm5_score),
            extended_score: round2(extended_score),
            comment,
            social_use,
            context_adjustment,
            conversational_norms,
            nonliteral_comprehension,
            coherence,
            cohesion,
            syntactic_complexity,
            disfluencies,
        })
    }

    /// Find the single integer sub-score carried by `label`.
    fn int_value(&self, block: &str, label: &str) -> Result<u8> {
        let mut found = None;
        for caps in self.int_field.captures_iter(block) {
            if &caps[1] == label {
                if found.is_some() {
                    return Err(anyhow!("duplicate label {}", label));
                }
                let value: u8 = caps[2]
                    .parse()
                    .map_err(|_| anyhow!("{}: value out of range", label))?;
                if value > 2 {
                    return Err(anyhow!("{}: sub-score {} outside {{0,1,2}}", label, value));
                }
                found = Some(value);
            }
        }
        found.ok_or_else(|| anyhow!("missing label {}", label))
    }

    /// Find the single decimal aggregate carried by `label`.
    fn float_value(&self, block: &str, label: &str) -> Result<f64> {
        let mut found = None;
        for caps in self.float_field.captures_iter(block) {
            if &caps[1] == label {
                if found.is_some() {
                    return Err(anyhow!("duplicate label {}", label));
                }
                found = Some(
                    caps[2]
                        .parse::<f64>()
                        .map_err(|_| anyhow!("{}: not a number", label))?,
                );
            }
        }
        found.ok_or_else(|| anyhow!("missing label {}", label))
    }
}

impl Default for StructuredTextParser {
    fn default() -> Self {
        Self::new()
    }
}
