//! Heicforge-Common: Shared types and utilities.
//!
//! This crate provides functionality used across heicforge:
//!
//! - **Typed IDs**: UUID wrapper identifying items in a conversion batch
//! - **Path Utilities**: Extension matching and output name derivation
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use heicforge_common::ItemId;
//! use heicforge_common::paths::derive_output_name;
//!
//! let id = ItemId::new();
//! assert_eq!(id.to_string().len(), 36);
//!
//! let name = derive_output_name("IMG_0001.HEIC", &["heic", "heif"], "jpg");
//! assert_eq!(name, "IMG_0001.jpg");
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
