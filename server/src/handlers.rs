use crate::store::{RedepositWrite, StoreError};
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use predictor_types::api::{needs_deposit_message, ErrorResponse, NOT_REGISTERED_MESSAGE};
use predictor_types::record::parse_amount;
use predictor_types::{ErrorCode, PostbackResponse, PostbackStatus, VerifyLoginResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

pub(crate) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

#[derive(Deserialize)]
pub(crate) struct VerifyLoginQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct PostbackQuery {
    user_id: Option<String>,
    status: Option<String>,
    fdp_usd: Option<String>,
    dep_sum_usd: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(ErrorCode::BadRequest, message)),
    )
        .into_response()
}

fn store_unconfigured() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(
            ErrorCode::StoreUnavailable,
            "Record store is not configured. Set REDIS_URL or start with --memory-store.",
        )),
    )
        .into_response()
}

fn store_failure(err: StoreError) -> Response {
    warn!(error = %err, "record store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(
            ErrorCode::StoreUnavailable,
            "Internal error while reaching the record store.",
        )),
    )
        .into_response()
}

/// `GET /verify-login?userId=<id>` — pure read, classifies the user.
pub(crate) async fn verify_login(
    State(state): State<AppState>,
    Query(query): Query<VerifyLoginQuery>,
) -> Response {
    let Some(user_id) = query.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    else {
        return bad_request("User ID is required");
    };
    let Some(store) = state.store.as_ref() else {
        return store_unconfigured();
    };

    let record = match store.fetch(user_id).await {
        Ok(record) => record,
        Err(err) => return store_failure(err),
    };

    match record {
        Some(record) if record.has_first_deposit => {
            info!(user_id, redeposits = record.redeposit_count, "login verified");
            Json(VerifyLoginResponse {
                success: true,
                redeposit_count: record.redeposit_count,
            })
            .into_response()
        }
        Some(_) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(
                ErrorCode::NeedsDeposit,
                needs_deposit_message(state.thresholds.first_deposit_usd),
            )),
        )
            .into_response(),
        None => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(
                ErrorCode::NotRegistered,
                NOT_REGISTERED_MESSAGE,
            )),
        )
            .into_response(),
    }
}

/// `GET /postback?user_id=<id>&status=<registration|fdp|dep>&...` —
/// affiliate-network event ingestion. Below-threshold events succeed with
/// `applied=false`; only malformed requests are rejected.
pub(crate) async fn postback(
    State(state): State<AppState>,
    Query(query): Query<PostbackQuery>,
) -> Response {
    let Some(user_id) = query.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    else {
        return bad_request("user_id is required");
    };
    let status = match query.status.as_deref() {
        Some("registration") => PostbackStatus::Registration,
        Some("fdp") => PostbackStatus::FirstDeposit,
        Some("dep") => PostbackStatus::Redeposit,
        other => {
            return bad_request(&format!(
                "status must be one of registration|fdp|dep, got {:?}",
                other.unwrap_or("")
            ))
        }
    };
    let Some(store) = state.store.as_ref() else {
        return store_unconfigured();
    };

    let result = match status {
        PostbackStatus::Registration => match store.ensure_registered(user_id).await {
            Ok((record, true)) => PostbackResponse::applied(record),
            Ok((record, false)) => {
                PostbackResponse::ignored(Some(record), "already registered")
            }
            Err(err) => return store_failure(err),
        },
        PostbackStatus::FirstDeposit => {
            let amount = parse_amount(query.fdp_usd.as_deref());
            if !state.thresholds.qualifies_first_deposit(amount) {
                let record = match store.fetch(user_id).await {
                    Ok(record) => record,
                    Err(err) => return store_failure(err),
                };
                PostbackResponse::ignored(
                    record,
                    format!(
                        "fdp_usd {amount:.2} below threshold {:.2}",
                        state.thresholds.first_deposit_usd
                    ),
                )
            } else {
                match store.mark_first_deposit(user_id).await {
                    Ok((record, true)) => PostbackResponse::applied(record),
                    Ok((record, false)) => {
                        PostbackResponse::ignored(Some(record), "first deposit already recorded")
                    }
                    Err(err) => return store_failure(err),
                }
            }
        }
        PostbackStatus::Redeposit => {
            let amount = parse_amount(query.dep_sum_usd.as_deref());
            if !state.thresholds.qualifies_redeposit(amount) {
                let record = match store.fetch(user_id).await {
                    Ok(record) => record,
                    Err(err) => return store_failure(err),
                };
                PostbackResponse::ignored(
                    record,
                    format!(
                        "dep_sum_usd {amount:.2} below threshold {:.2}",
                        state.thresholds.redeposit_usd
                    ),
                )
            } else {
                match store.record_redeposit(user_id).await {
                    Ok(RedepositWrite::Applied(record)) => PostbackResponse::applied(record),
                    Ok(RedepositWrite::NoRecord) => {
                        warn!(user_id, "repeat deposit for unknown identifier rejected");
                        PostbackResponse::ignored(
                            None,
                            "no record for identifier; repeat deposit before registration is rejected",
                        )
                    }
                    Err(err) => return store_failure(err),
                }
            }
        }
    };

    info!(
        user_id,
        status = status.as_str(),
        applied = result.applied,
        "postback processed"
    );
    Json(result).into_response()
}
