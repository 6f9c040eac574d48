use actix_web::HttpResponse;
use serde_json::json;

/// Liveness probe: always 200 while the process is up.
pub async fn read_root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "API de COMETI-K activa y lista."
    }))
}
