// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for intake abuse simulation.
//!
//! Drives the router with scripted traffic on a manual clock so that
//! rate limit windows can be crossed without sleeping.

pub mod attacks;
pub mod generators;
pub mod metrics;
