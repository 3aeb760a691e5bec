//! PantryIQ - household pantry, grocery and meal-planning API server
//!
//! Accounts verify their email before logging in, invite family members by
//! emailed link, and own every pantry item, grocery entry and meal plan they
//! create. All item operations are scoped to the authenticated owner.

pub mod account;
pub mod activity;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod family;
pub mod insights;
pub mod jobs;
pub mod ledger;
pub mod mailer;
pub mod metrics;
pub mod outbox;
pub mod rate_limit;
pub mod server;
pub mod validation;
