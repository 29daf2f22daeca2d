//! API route handlers

pub mod admin;
pub mod agent;
pub mod auth;
pub mod bulk_conclusions;
pub mod health;
pub mod license_conclusions;
pub mod packages;
pub mod path_exclusions;
pub mod scanner;
