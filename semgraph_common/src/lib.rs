//! Semgraph Common Library
//!
//! This crate provides the shared vocabulary for all semgraph workspace
//! crates: element addresses, the element type bitmask, the error taxonomy
//! and store parameters.
//!
//! # Module Structure
//!
//! - [`addr`] - Element addresses and their packed 64-bit form
//! - [`types`] - Element type bitmask, category masks and filter helpers
//! - [`error`] - Error taxonomy shared by every store operation
//! - [`params`] - Store initialization parameters with TOML loading
//! - [`consts`] - Segment and monitor-table size constants
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! semgraph = { package = "semgraph_common", path = "../semgraph_common" }
//! ```

pub mod addr;
pub mod consts;
pub mod error;
pub mod params;
pub mod types;

pub use addr::{Addr, PackedAddr};
pub use error::{StoreError, StoreResult};
pub use params::StoreParams;
pub use types::ElementType;
