//! # Request Telemetry Middleware
//!
//! One middleware covering both ambient concerns of the request path:
//! structured request/response logging and the per-endpoint counters
//! surfaced by `/health`.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{error, info};

pub struct RequestTelemetry;

impl<S, B> Transform<S, ServiceRequest> for RequestTelemetry
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTelemetryMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTelemetryMiddleware { service }))
    }
}

pub struct RequestTelemetryMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestTelemetryMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let endpoint = format!("{} {}", method, path);

        if let Some(app_state) = req.app_data::<web::Data<AppState>>() {
            app_state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => {
                    let status = response.status();
                    let is_error = status.is_client_error() || status.is_server_error();

                    info!(
                        method = %method,
                        path = %path,
                        remote_addr = %remote_addr,
                        status = %status.as_u16(),
                        duration_ms = %duration_ms,
                        "Request completed"
                    );

                    if let Some(app_state) = response.request().app_data::<web::Data<AppState>>() {
                        app_state.record_endpoint_request(&endpoint, duration_ms, is_error);
                        if is_error {
                            app_state.increment_error_count();
                        }
                    }
                }
                Err(err) => {
                    error!(
                        method = %method,
                        path = %path,
                        remote_addr = %remote_addr,
                        duration_ms = %duration_ms,
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}
