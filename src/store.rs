// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission persistence.
//!
//! Submissions are written to a hosted Postgres exposed through PostgREST
//! (the Supabase REST API). [`MemoryStore`] implements the same trait for
//! tests and local runs.

use crate::validator::{ContactForm, Role, WaitlistForm};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Table holding contact requests.
pub const CONTACT_TABLE: &str = "contact_requests";
/// Table holding waitlist sign-ups.
pub const WAITLIST_TABLE: &str = "waitlist";

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode store response: {0}")]
    Decode(String),
}

/// Request metadata recorded alongside a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Row written to [`CONTACT_TABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub interest: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl ContactRecord {
    pub fn new(form: ContactForm, meta: RequestMeta, submitted_at: DateTime<Utc>) -> Self {
        Self {
            name: form.name,
            email: form.email,
            organization: form.organization,
            interest: form.interest,
            message: form.message,
            submitted_at,
            user_agent: meta.user_agent,
            referrer: meta.referrer,
        }
    }
}

/// Row written to [`WAITLIST_TABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistRecord {
    pub email: String,
    pub name: String,
    pub role: Role,
    /// 1-based place in the queue at sign-up time
    pub position: u64,
    pub joined_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl WaitlistRecord {
    pub fn new(form: WaitlistForm, position: u64, meta: RequestMeta, joined_at: DateTime<Utc>) -> Self {
        Self {
            email: form.email,
            name: form.name,
            role: form.role,
            position,
            joined_at,
            user_agent: meta.user_agent,
            referrer: meta.referrer,
        }
    }
}

/// Persistence operations needed by the form handlers.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Record a contact request.
    async fn insert_contact(&self, record: &ContactRecord) -> Result<(), StoreError>;

    /// Whether `email` (already normalised) is on the waitlist.
    async fn waitlist_contains(&self, email: &str) -> Result<bool, StoreError>;

    /// Number of waitlist rows.
    async fn waitlist_count(&self) -> Result<u64, StoreError>;

    /// Add a waitlist row.
    async fn insert_waitlist(&self, record: &WaitlistRecord) -> Result<(), StoreError>;
}

/// PostgREST client for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: Url,
}

impl SupabaseStore {
    /// Create a client for the project at `base_url` using `api_key`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("invalid URL {base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(StoreError::Config(format!(
                "unsupported URL scheme {}",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_url = base
            .join("rest/v1/")
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| StoreError::Config("API key is not a valid header value".to_string()))?;
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| StoreError::Config("API key is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, rest_url })
    }

    /// REST endpoint for `table`.
    pub fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.rest_url
            .join(table)
            .map_err(|e| StoreError::Config(e.to_string()))
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.table_url(table)?)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        ensure_success(response).await?;
        debug!(table, "Inserted row");
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for SupabaseStore {
    async fn insert_contact(&self, record: &ContactRecord) -> Result<(), StoreError> {
        self.insert(CONTACT_TABLE, record).await
    }

    async fn waitlist_contains(&self, email: &str) -> Result<bool, StoreError> {
        let filter = format!("eq.{email}");
        let response = self
            .client
            .get(self.table_url(WAITLIST_TABLE)?)
            .query(&[("select", "email"), ("email", filter.as_str()), ("limit", "1")])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn waitlist_count(&self) -> Result<u64, StoreError> {
        let response = self
            .client
            .head(self.table_url(WAITLIST_TABLE)?)
            .query(&[("select", "*")])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Decode("missing Content-Range header".to_string()))?;
        parse_content_range(range)
            .ok_or_else(|| StoreError::Decode(format!("unexpected Content-Range {range:?}")))
    }

    async fn insert_waitlist(&self, record: &WaitlistRecord) -> Result<(), StoreError> {
        self.insert(WAITLIST_TABLE, record).await
    }
}

/// Turn a non-2xx response into [`StoreError::Status`].
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Total row count from a PostgREST `Content-Range` header (`0-24/3573`,
/// `*/0`).
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contacts: RwLock<Vec<ContactRecord>>,
    waitlist: RwLock<Vec<WaitlistRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored contact requests.
    pub async fn contacts(&self) -> Vec<ContactRecord> {
        self.contacts.read().await.clone()
    }

    /// Snapshot of the waitlist.
    pub async fn waitlist(&self) -> Vec<WaitlistRecord> {
        self.waitlist.read().await.clone()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert_contact(&self, record: &ContactRecord) -> Result<(), StoreError> {
        self.contacts.write().await.push(record.clone());
        Ok(())
    }

    async fn waitlist_contains(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.waitlist.read().await.iter().any(|r| r.email == email))
    }

    async fn waitlist_count(&self) -> Result<u64, StoreError> {
        Ok(self.waitlist.read().await.len() as u64)
    }

    async fn insert_waitlist(&self, record: &WaitlistRecord) -> Result<(), StoreError> {
        let mut waitlist = self.waitlist.write().await;
        // Mirrors the unique constraint on waitlist.email
        if waitlist.iter().any(|r| r.email == record.email) {
            return Err(StoreError::Status {
                status: 409,
                body: "duplicate key value violates unique constraint".to_string(),
            });
        }
        waitlist.push(record.clone());
        Ok(())
    }
}
