//! # Scoring Record
//!
//! The fixed-shape result of scoring one transcript. Field names on the wire
//! stay compatible with the original COMETI-K API (Spanish labels), while the
//! Rust side uses descriptive names.
//!
//! ## Shape:
//! - **Two aggregates**: the DSM-5 mean (4 criteria) and the extended mean
//!   (those 4 plus the 2 discourse criteria), both rounded to 2 decimals.
//! - **Eight sub-scores**: each an integer in {0, 1, 2}.
//! - **One comment**: a short human-readable justification.

use serde::{Deserialize, Serialize};

/// Result of applying the scoring policy to one transcript.
///
/// Records are append-only clinical data: once produced and persisted they are
/// never mutated or deleted. A subject answering the same question twice
/// yields two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRecord {
    /// Mean of the four DSM-5 sub-scores, in [0.0, 2.0].
    #[serde(rename = "calificacion_pragmatica_dsm5")]
    pub dsm5_score: f64,

    /// Mean of all six sub-scores (DSM-5 + discourse), in [0.0, 2.0].
    #[serde(rename = "calificacion_pragmatica_ampliada")]
    pub extended_score: f64,

    /// Short justification for the assigned tier.
    #[serde(rename = "comentario_llm")]
    pub comment: String,

    /// DSM-5 A1: social use of communication.
    #[serde(rename = "puntuacion_a1_uso_social")]
    pub social_use: u8,

    /// DSM-5 A2: adjustment to context/listener.
    #[serde(rename = "puntuacion_a2_ajuste_contexto")]
    pub context_adjustment: u8,

    /// DSM-5 A3: conversational norms (turn-taking, repair).
    #[serde(rename = "puntuacion_a3_normas_conversacionales")]
    pub conversational_norms: u8,

    /// DSM-5 A4: comprehension of non-literal language.
    #[serde(rename = "puntuacion_a4_comprension_no_literal")]
    pub nonliteral_comprehension: u8,

    /// Discourse A5: coherence.
    #[serde(rename = "puntuacion_a5_coherencia")]
    pub coherence: u8,

    /// Discourse A6: cohesion.
    #[serde(rename = "puntuacion_a6_cohesion")]
    pub cohesion: u8,

    /// Syntactic complexity. Constant placeholder policy, not a measurement.
    #[serde(rename = "analisis_complejidad_sintactica")]
    pub syntactic_complexity: u8,

    /// Disfluency count. Constant placeholder policy, not a measurement.
    #[serde(rename = "analisis_disfluencias")]
    pub disfluencies: u8,
}

impl ScoringRecord {
    /// The four DSM-5 sub-scores in criterion order (A1..A4).
    pub fn dsm5_subscores(&self) -> [u8; 4] {
        [
            self.social_use,
            self.context_adjustment,
            self.conversational_norms,
            self.nonliteral_comprehension,
        ]
    }

    /// All six pragmatic sub-scores in criterion order (A1..A6).
    pub fn all_subscores(&self) -> [u8; 6] {
        [
            self.social_use,
            self.context_adjustment,
            self.conversational_norms,
            self.nonliteral_comprehension,
            self.coherence,
            self.cohesion,
        ]
    }
}
