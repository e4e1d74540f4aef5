//! # Slidewin Simulator
//!
//! Drives a [`slidewin`] limiter with a bursty multi-user workload and
//! reports what it admitted, what it denied and what the compactor
//! reclaimed.
//!
//! ## Quick Start
//!
//! ```bash
//! # Three users, 12 requests each, 5 per 10 seconds
//! slidewin-sim
//!
//! # Reproducible run on the single-lock store, JSON summary
//! slidewin-sim --store locked --seed 42 --json
//!
//! # Watch every compaction sweep
//! slidewin-sim --log-level debug
//! ```
//!
//! Run `slidewin-sim --list-env-vars` for the `SLIDEWIN_` environment
//! variables accepted in place of flags.

pub mod config;
pub mod metrics;
pub mod simulation;
