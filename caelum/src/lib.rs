//! Caelum - blocking client for the S-PLUS survey cloud service.
//!
//! This library talks to `splus.cloud`:
//! - Catalog queries over the asynchronous TAP job protocol, with optional
//!   table uploads joined server-side
//! - FITS cutout and whole-field downloads
//! - Footprint checks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use caelum::Connection;
//!
//! let mut conn = Connection::login("username", "password")?;
//!
//! let table = conn.query_public(
//!     "SELECT TOP 10 ra, dec FROM idr4_dual.idr4_detection_image",
//! )?;
//!
//! println!("Got {} rows", table.n_rows());
//! ```

mod client;
mod downloads;
mod error;
mod fits;
mod job;
mod resolve;
mod status;
mod table;
mod transport;
mod votable;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Connection and queries
// ============================================================================

pub use client::{Connection, LastContent, DEFAULT_ORIGIN};
pub use job::PollConfig;
pub use resolve::HostRewrites;

// ============================================================================
// Tables
// ============================================================================

pub use fits::ResultTable;
pub use table::{
    encode, Column, ColumnTable, EncodedTable, RowTable, TableUpload, TruncationNotice, Value,
    MAX_UPLOAD_ROWS,
};

// ============================================================================
// Protocol types
// ============================================================================

pub use status::{JobPhase, StatusDocument};
pub use transport::Credentials;

// ============================================================================
// Errors
// ============================================================================

pub use error::{Error, Result};
