//! # vidpress-av
//!
//! ffmpeg discovery and invocation for vidpress.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`check_tool`], [`get_tool_path`]) -- locate ffmpeg
//!   from config or `PATH` and report its version.
//! - **Command execution** ([`ToolCommand`]) -- async builder with optional
//!   timeout that kills the child when dropped.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- compress a
//!   single file with a given profile and thread budget.
//!
//! ## Example
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use std::path::Path;
//! use vidpress_av::{FfmpegTranscoder, Transcoder};
//! use vidpress_common::ProfileId;
//!
//! # async fn example() -> vidpress_common::Result<()> {
//! let ffmpeg = FfmpegTranscoder::discover(None);
//! ffmpeg
//!     .transcode(
//!         Path::new("clip.mp4"),
//!         Path::new("clip_high_compressed.mp4"),
//!         ProfileId::High,
//!         NonZeroUsize::new(4).unwrap(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod tools;
pub mod transcode;

pub use command::{OutputMode, ToolCommand, ToolOutput};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};
pub use transcode::{ffmpeg_args, FfmpegTranscoder, Transcoder};
