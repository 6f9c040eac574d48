//! # HTTP Request Handlers
//!
//! One module per operation group:
//! - **status**: service liveness probe at `/`
//! - **participants**: demographic intake
//! - **audio**: audio upload and transcription
//! - **analysis**: transcript scoring and persistence

pub mod analysis;
pub mod audio;
pub mod participants;
pub mod status;

pub use analysis::analyze_text;
pub use audio::upload_audio;
pub use participants::register_participant;
pub use status::read_root;

use crate::error::AppError;

/// Validate a client-supplied identifier (`document_id`, `pregunta_id`).
///
/// Identifiers become file and directory names under the clinical data
/// directory, so anything that could traverse paths is rejected up front.
pub(crate) fn validate_identifier(value: &str, field: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::ValidationError(format!("{} cannot be empty", field)));
    }
    if value.len() > 64 {
        return Err(AppError::ValidationError(format!("{} is too long", field)));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::ValidationError(format!(
            "{} may only contain letters, digits, '-' and '_'",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for id in ["DOC123", "p-07", "a_b_c", "1020304050"] {
            assert!(validate_identifier(id, "document_id").is_ok(), "{}", id);
        }
    }

    #[test]
    fn test_rejected_identifiers() {
        for id in ["", "../escape", "a/b", "con espacio", "ñandú"] {
            assert!(validate_identifier(id, "document_id").is_err(), "{}", id);
        }

        let too_long = "x".repeat(65);
        assert!(validate_identifier(&too_long, "document_id").is_err());
    }
}
