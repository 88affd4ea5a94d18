//! REST implementations of the dbx-core capability traits.
//!
//! [`DatabricksClient`] covers the workspace, catalog, conversational and
//! vector search APIs; [`SqlWarehouse`] runs statements through the statement
//! execution API and waits on long-running ones with the completion poller.

pub mod client;
pub mod genie;
pub mod settings;
pub mod sql;
pub mod vector_search;
pub mod workspace;

pub use client::DatabricksClient;
pub use settings::{ClientSettings, WarehouseSettings};
pub use sql::{SqlWarehouse, statement_status};
