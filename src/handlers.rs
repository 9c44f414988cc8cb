// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the intake service.
//!
//! The waitlist route is throttled by its own [`RateLimiter`] before the
//! body is even parsed; a denied request never reaches validation or the
//! store. The contact route gets a separate limiter only when
//! `limit_contact` is set.

use crate::config::Config;
use crate::error::{ApiError, MessageResponse};
use crate::limiter::{client_identity, Clock, RateLimitDecision, RateLimiter, SystemClock};
use crate::metrics::Metrics;
use crate::store::{ContactRecord, RequestMeta, StoreError, SubmissionStore, WaitlistRecord};
use crate::validator::{ContactRequest, FormValidator, WaitlistRequest};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

/// Metric label for the contact route.
pub const CONTACT_ROUTE: &str = "contact";
/// Metric label for the waitlist route.
pub const WAITLIST_ROUTE: &str = "waitlist";

const HEALTH_PATHS: [&str; 2] = ["/health", "/healthz"];
const CONTACT_PATH: &str = "/api/contact";
const WAITLIST_PATH: &str = "/api/waitlist";

/// Shared application state.
pub struct AppState {
    pub contact_limiter: Option<RateLimiter>,
    pub waitlist_limiter: RateLimiter,
    pub validator: FormValidator,
    pub store: Option<Arc<dyn SubmissionStore>>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Option<Arc<dyn SubmissionStore>>,
    ) -> prometheus::Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Build state whose limiters run on `clock`.
    pub fn with_clock(
        config: Config,
        store: Option<Arc<dyn SubmissionStore>>,
        clock: Arc<dyn Clock>,
    ) -> prometheus::Result<Self> {
        Ok(Self {
            contact_limiter: config
                .rate_limit
                .limit_contact
                .then(|| RateLimiter::with_clock(config.rate_limit.clone(), clock.clone())),
            waitlist_limiter: RateLimiter::with_clock(config.rate_limit.clone(), clock),
            validator: FormValidator::new(config.validation.clone()),
            store,
            metrics: Metrics::new()?,
            config,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route(HEALTH_PATHS[0], get(health))
        .route(HEALTH_PATHS[1], get(health))
        .route(CONTACT_PATH, post(contact).get(contact_usage))
        .route(WAITLIST_PATH, post(waitlist).get(waitlist_usage));

    if state.config.metrics.enabled {
        if let Some(path) = metrics_path(&state.config.metrics.path) {
            router = router.route(path, get(metrics));
        }
    }

    let cors = cors_layer(&state.config.cors_allowed_origins);
    let router = router.with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// The metrics route, unless it is malformed or taken by another route.
fn metrics_path(path: &str) -> Option<&str> {
    if !path.starts_with('/') {
        warn!(path = %path, "Metrics path must start with '/', metrics disabled");
        return None;
    }

    let normalized = path.trim_end_matches('/');
    let taken = HEALTH_PATHS
        .iter()
        .chain([&CONTACT_PATH, &WAITLIST_PATH])
        .any(|route| *route == normalized);
    if taken {
        warn!(path = %path, "Metrics path collides with an API route, metrics disabled");
        return None;
    }

    Some(path)
}

/// CORS policy for browser form posts from the marketing site.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .expose_headers([
                header::RETRY_AFTER,
                header::HeaderName::from_static("x-ratelimit-limit"),
                header::HeaderName::from_static("x-ratelimit-remaining"),
                header::HeaderName::from_static("x-ratelimit-reset"),
            ]),
    )
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "orbythic-intake",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {e}")))
}

/// `POST /api/contact`
pub async fn contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = submit_contact(&state, &headers, &body).await;
    finish(&state, CONTACT_ROUTE, result)
}

/// `POST /api/waitlist`
pub async fn waitlist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = join_waitlist(&state, &headers, &body).await;
    finish(&state, WAITLIST_ROUTE, result)
}

/// `GET /api/contact`
pub async fn contact_usage() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(MessageResponse::new("Submit a POST request to contact Orbythic.")),
    )
}

/// `GET /api/waitlist`
pub async fn waitlist_usage() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(MessageResponse::new("Submit a POST request to join the waitlist.")),
    )
}

fn finish(state: &AppState, route: &'static str, result: Result<Response, ApiError>) -> Response {
    match result {
        Ok(response) => {
            state.metrics.record(route, "accepted");
            response
        }
        Err(err) => {
            state.metrics.record(route, err.outcome());
            err.into_response()
        }
    }
}

async fn submit_contact(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    if let Some(limiter) = &state.contact_limiter {
        enforce_rate_limit(limiter, headers).await?;
    }

    let req: ContactRequest = parse_body(body)?;
    let form = state.validator.validate_contact(&req)?;
    let record = ContactRecord::new(form, request_meta(headers), Utc::now());

    match &state.store {
        Some(store) => store
            .insert_contact(&record)
            .await
            .map_err(ApiError::ContactNotRecorded)?,
        None => warn!(
            name = %record.name,
            email = %record.email,
            organization = %record.organization,
            interest = %record.interest,
            message = %record.message,
            "Store not configured, contact submission logged only"
        ),
    }

    info!(interest = %record.interest, "Contact submission received");
    Ok((StatusCode::OK, Json(MessageResponse::new("Submission received."))).into_response())
}

async fn join_waitlist(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    enforce_rate_limit(&state.waitlist_limiter, headers).await?;

    let req: WaitlistRequest = parse_body(body)?;
    let form = state.validator.validate_waitlist(&req)?;

    let Some(store) = &state.store else {
        warn!("Store not configured, waitlist sign-up refused");
        return Err(ApiError::StoreUnavailable);
    };

    if store
        .waitlist_contains(&form.email)
        .await
        .map_err(ApiError::WaitlistLookup)?
    {
        debug!("Duplicate waitlist email");
        return Err(ApiError::DuplicateEmail);
    }

    let position = store
        .waitlist_count()
        .await
        .map_err(ApiError::WaitlistLookup)?
        + 1;

    let role = form.role;
    let record = WaitlistRecord::new(form, position, request_meta(headers), Utc::now());
    match store.insert_waitlist(&record).await {
        Ok(()) => {}
        // Lost a race with a concurrent sign-up for the same email
        Err(StoreError::Status { status: 409, .. }) => return Err(ApiError::DuplicateEmail),
        Err(err) => return Err(ApiError::WaitlistNotRecorded(err)),
    }

    info!(position, role = %role, "Waitlist sign-up recorded");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Successfully joined the waitlist!".to_string(),
            position: Some(position),
        }),
    )
        .into_response())
}

/// Count the request against `limiter`, failing with 429 when over quota.
async fn enforce_rate_limit(
    limiter: &RateLimiter,
    headers: &HeaderMap,
) -> Result<RateLimitDecision, ApiError> {
    let identity = client_identity(headers);
    let decision = limiter.check(&identity).await;

    if decision.success {
        debug!(identity = %identity, remaining = decision.remaining, "Request allowed");
        Ok(decision)
    } else {
        info!(
            identity = %identity,
            reset_time = decision.reset_time,
            "Request rate limited"
        );
        Err(ApiError::rate_limited(decision, limiter.now_ms()))
    }
}

/// Parse a JSON body; a literal `null` yields the empty form.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    let parsed: Option<T> = serde_json::from_slice(body).map_err(ApiError::InvalidBody)?;
    Ok(parsed.unwrap_or_default())
}

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    RequestMeta {
        user_agent: value(header::USER_AGENT),
        referrer: value(header::REFERER),
    }
}
