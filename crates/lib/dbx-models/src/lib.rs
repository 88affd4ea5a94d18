//! Payload models and endpoint helpers for dbx-mcp.
//!
//! This crate defines the wire shapes shared by the REST clients and the tool
//! families. It performs no I/O.

pub mod endpoints;
pub mod models;

pub use models::*;
