//! # Audio Upload and Transcription
//!
//! `POST /upload_audio?document_id=&pregunta_id=` with a multipart
//! `audio_file` field.
//!
//! ## Flow:
//! 1. Fail fast with 503 when transcription is disabled, before reading a
//!    single payload byte, so constrained hosts are not asked to buffer
//!    uploads they cannot process.
//! 2. Collect the multipart audio field (50 MB cap).
//! 3. Transcribe (temp-buffered, scoped cleanup inside the service).
//! 4. Append the transcript to the subject summary file, best-effort.
//! 5. Return the transcript with its metadata.

use crate::error::{AppError, AppResult};
use crate::handlers::validate_identifier;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;

/// Largest accepted upload. One question's answer is seconds of audio;
/// anything near this limit is a client mistake.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadAudioQuery {
    pub document_id: String,
    pub pregunta_id: String,
}

pub async fn upload_audio(
    state: web::Data<AppState>,
    query: web::Query<UploadAudioQuery>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    // Availability is checked before anything else: a disabled service
    // answers 503 no matter what the request carries.
    let transcriber = state.transcriber.clone().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "El servicio de transcripción está deshabilitado. Límite de memoria de hosting alcanzado."
                .to_string(),
        )
    })?;

    validate_identifier(&query.document_id, "document_id")?;
    validate_identifier(&query.pregunta_id, "pregunta_id")?;

    // Collect the audio_file multipart field.
    let mut audio_bytes: Option<Vec<u8>> = None;
    let mut filename = "audio.wav".to_string();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let content_disposition = field.content_disposition().ok_or_else(|| {
            AppError::ValidationError("Missing content disposition".to_string())
        })?;
        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| AppError::ValidationError("Missing field name".to_string()))?;

        if field_name != "audio_file" {
            continue;
        }
        if let Some(name) = content_disposition.get_filename() {
            filename = name.to_string();
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::ValidationError(format!(
                    "Audio file exceeds the {} byte limit",
                    MAX_UPLOAD_BYTES
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        audio_bytes = Some(bytes);
    }

    let audio_bytes = audio_bytes
        .ok_or_else(|| AppError::ValidationError("No audio_file field provided".to_string()))?;

    let transcription = transcriber
        .transcribe_upload(&filename, &audio_bytes)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // The summary file is an audit convenience; its failure must not void a
    // successful transcription.
    if let Err(e) =
        state
            .files
            .append_summary(&query.document_id, &query.pregunta_id, &transcription)
    {
        tracing::warn!(
            document_id = %query.document_id,
            error = %e,
            "Could not append transcript to subject summary"
        );
    }

    Ok(HttpResponse::Ok().json(json!({
        "document_id": query.document_id,
        "pregunta_id": query.pregunta_id,
        "transcription": transcription,
        "message": "Audio guardado, transcrito y añadido al resumen del participante."
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::FileStore;
    use crate::scoring::ScoringPolicy;
    use actix_web::{http::StatusCode, test, App};

    fn state_with_transcription_disabled(dir: &std::path::Path) -> AppState {
        AppState::new(
            AppConfig::default(),
            ScoringPolicy::Heuristic,
            None,
            FileStore::new(dir),
            None,
        )
    }

    #[actix_web::test]
    async fn test_upload_with_transcription_disabled_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with_transcription_disabled(dir.path())))
                .route("/upload_audio", web::post().to(upload_audio)),
        )
        .await;

        // The payload is irrelevant: the check precedes any payload read.
        let request = test::TestRequest::post()
            .uri("/upload_audio?document_id=DOC1&pregunta_id=P1")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_availability_check_precedes_identifier_validation() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with_transcription_disabled(dir.path())))
                .route("/upload_audio", web::post().to(upload_audio)),
        )
        .await;

        // Even a hostile document_id gets the 503 while the service is off.
        let request = test::TestRequest::post()
            .uri("/upload_audio?document_id=..%2Fup&pregunta_id=P1")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_upload_requires_query_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with_transcription_disabled(dir.path())))
                .route("/upload_audio", web::post().to(upload_audio)),
        )
        .await;

        let request = test::TestRequest::post().uri("/upload_audio").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
