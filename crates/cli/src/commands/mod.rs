//! CLI commands

pub mod api;
pub mod scenarios;
