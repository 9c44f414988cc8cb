// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Orbythic Intake
//!
//! Server side of the Orbythic marketing site's two forms:
//!
//! - `POST /api/contact` records a contact request
//! - `POST /api/waitlist` adds a visitor to the Quasera waitlist
//!
//! The waitlist route is guarded by a fixed-window rate limiter keyed by the
//! client address reported by the edge proxy; the contact route can opt in
//! to its own limiter. Submissions are persisted to
//! a hosted Postgres through its REST API.

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod store;
pub mod validator;

pub use config::Config;
pub use error::ApiError;
pub use handlers::{router, AppState};
pub use limiter::{client_identity, RateLimitDecision, RateLimiter, SweeperHandle};
pub use store::{MemoryStore, SubmissionStore, SupabaseStore};
pub use validator::{FormValidator, ValidationError};
