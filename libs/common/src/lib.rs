//! Common library for the Amparo backend
//!
//! This crate provides shared functionality used across the Amparo
//! services, including database connectivity and error handling.

pub mod database;
pub mod error;
