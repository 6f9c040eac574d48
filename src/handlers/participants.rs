//! # Participant Registration
//!
//! Demographic intake endpoint. Registration is the one operation that hard
//! requires the durable store: without a database there is nowhere to keep
//! the participant roster, so the endpoint reports 503 instead of silently
//! accepting data it cannot keep.

use crate::error::{AppError, AppResult};
use crate::handlers::validate_identifier;
use crate::persistence::ParticipantRecord;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `POST /register_participant`
///
/// Idempotent: registering an already-known `document_id` is a success that
/// reports `created: false` and leaves the original row untouched.
pub async fn register_participant(
    state: web::Data<AppState>,
    body: web::Json<ParticipantRecord>,
) -> AppResult<HttpResponse> {
    let participant = body.into_inner();
    validate_identifier(&participant.document_id, "document_id")?;

    if participant.edad < 0 {
        return Err(AppError::ValidationError("edad cannot be negative".to_string()));
    }

    let store = state.store.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "El registro de participantes requiere una base de datos configurada.".to_string(),
        )
    })?;

    let created = store
        .register_participant(&participant)
        .await
        .map_err(|e| AppError::Internal(format!("No se pudo registrar el participante: {}", e)))?;

    let message = if created {
        "Participante registrado."
    } else {
        "Participante ya registrado; no se realizaron cambios."
    };

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "document_id": participant.document_id,
        "created": created,
        "message": message
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::FileStore;
    use crate::scoring::ScoringPolicy;
    use actix_web::{http::StatusCode, test, App};

    fn state_without_store(dir: &std::path::Path) -> AppState {
        AppState::new(
            AppConfig::default(),
            ScoringPolicy::Heuristic,
            None,
            FileStore::new(dir),
            None,
        )
    }

    fn participant_json() -> serde_json::Value {
        json!({
            "document_id": "1020304050",
            "nombre": "Ana Pérez",
            "genero": "F",
            "edad": 7,
            "acudiente": "María Pérez",
            "contacto": "300-000-0000"
        })
    }

    #[actix_web::test]
    async fn test_registration_without_store_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_without_store(dir.path())))
                .route("/register_participant", web::post().to(register_participant)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/register_participant")
            .set_json(participant_json())
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_registration_rejects_bad_document_id() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_without_store(dir.path())))
                .route("/register_participant", web::post().to(register_participant)),
        )
        .await;

        let mut body = participant_json();
        body["document_id"] = json!("../escape");
        let request = test::TestRequest::post()
            .uri("/register_participant")
            .set_json(body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_registration_rejects_negative_age() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_without_store(dir.path())))
                .route("/register_participant", web::post().to(register_participant)),
        )
        .await;

        let mut body = participant_json();
        body["edad"] = json!(-1);
        let request = test::TestRequest::post()
            .uri("/register_participant")
            .set_json(body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
