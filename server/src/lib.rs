mod handlers;
pub mod store;


use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use predictor_types::Thresholds;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use store::Store;

/// Shared request state: the record store (absent when unconfigured, in
/// which case handlers answer 500 with an actionable message) and the
/// deposit-qualification policy.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<Store>>,
    pub thresholds: Thresholds,
}

impl AppState {
    pub fn new(store: Option<Store>, thresholds: Thresholds) -> Self {
        Self {
            store: store.map(Arc::new),
            thresholds,
        }
    }
}

pub struct Api {
    state: AppState,
}

impl Api {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        // Postbacks arrive server-to-server without an Origin header, so an
        // empty allow-list means "any origin" here rather than reject-all.
        let allowed_origins = std::env::var("ALLOWED_HTTP_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>();
        let cors = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            let origins = allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Invalid origin in ALLOWED_HTTP_ORIGINS: {}", origin);
                        None
                    }
                })
                .collect::<Vec<_>>();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        };

        Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/verify-login", get(handlers::verify_login))
            .route("/postback", get(handlers::postback))
            .layer(cors)
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(header::HeaderName::from_static("x-request-id"), header_value);
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}
