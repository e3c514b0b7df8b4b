//! # Leasegate
//!
//! Multi-tenant property management backend: identity resolution,
//! row-level policy, atomic onboarding and invite redemption, the invite
//! lifecycle and a shared persistent rate limiter.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod invites;
pub mod models;
pub mod policy;
pub mod rate_limit;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod transactions;
pub use migration;
