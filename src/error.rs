// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP-facing error types.

use crate::limiter::RateLimitDecision;
use crate::store::StoreError;
use crate::validator::ValidationError;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// JSON body used by every form endpoint response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }
}

/// Application error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests. Please try again later.")]
    RateLimited {
        decision: RateLimitDecision,
        retry_after_secs: u64,
    },

    #[error("Invalid request body.")]
    InvalidBody(#[source] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("This email is already on the waitlist.")]
    DuplicateEmail,

    #[error("Service temporarily unavailable. Please try again later.")]
    StoreUnavailable,

    #[error("We could not record your request. Please try again later.")]
    ContactNotRecorded(#[source] StoreError),

    #[error("Unable to process request. Please try again.")]
    WaitlistLookup(#[source] StoreError),

    #[error("Failed to join waitlist. Please try again.")]
    WaitlistNotRecorded(#[source] StoreError),

    #[error("Something went wrong. Please try again later.")]
    Internal(String),
}

impl ApiError {
    /// Build a rate-limited error from a denied decision.
    pub fn rate_limited(decision: RateLimitDecision, now_ms: u64) -> Self {
        let millis = decision.retry_after(now_ms).as_millis();
        let retry_after_secs = u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX);
        Self::RateLimited {
            decision,
            retry_after_secs,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidBody(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateEmail => StatusCode::CONFLICT,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ContactNotRecorded(_) => StatusCode::BAD_GATEWAY,
            Self::WaitlistLookup(_) | Self::WaitlistNotRecorded(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label used for the request outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidBody(_) | Self::Validation(_) => "invalid",
            Self::DuplicateEmail => "duplicate",
            Self::StoreUnavailable => "unavailable",
            Self::ContactNotRecorded(_)
            | Self::WaitlistLookup(_)
            | Self::WaitlistNotRecorded(_)
            | Self::Internal(_) => "error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::ContactNotRecorded(err)
            | Self::WaitlistLookup(err)
            | Self::WaitlistNotRecorded(err) => {
                error!(error = %err, reason = %self, "Store operation failed");
            }
            Self::Internal(detail) => error!(detail = %detail, "Internal error"),
            _ => {}
        }

        let status = self.status();
        let mut response = (status, Json(MessageResponse::new(self.to_string()))).into_response();

        if let Self::RateLimited {
            decision,
            retry_after_secs,
        } = &self
        {
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_time));
            headers.insert("Retry-After", HeaderValue::from(*retry_after_secs));
        }

        response
    }
}
