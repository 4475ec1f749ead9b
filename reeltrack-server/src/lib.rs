//! HTTP front and timer for the reeltrack daily show update.

pub mod config;
pub mod handlers;
pub mod infra;
pub mod routes;
