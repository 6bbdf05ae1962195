//! vidpress-common: shared job types, profiles, and path utilities.
//!
//! This crate provides the pieces every front end and the dispatcher agree on:
//!
//! - **Profiles**: [`ProfileId`] and the static encoder parameter table
//! - **Jobs**: the immutable [`JobDescriptor`]
//! - **Path Utilities**: output naming and video file detection
//! - **Error Handling**: common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use std::num::NonZeroUsize;
//! use std::path::PathBuf;
//! use vidpress_common::{JobDescriptor, ProfileId};
//!
//! let job = JobDescriptor::new("clip.mp4", ProfileId::resolve("high"), NonZeroUsize::MIN);
//! assert_eq!(job.output_path(), PathBuf::from("clip_high_compressed.mp4"));
//! ```

pub mod error;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
