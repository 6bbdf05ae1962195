//! Core type definitions for compression jobs.
//!
//! [`ProfileId`] names a compression level, [`CompressionProfile`] holds the
//! encoder parameters behind it, and [`JobDescriptor`] is the immutable
//! description of one file to compress. All enums are serialized in
//! snake_case to match the identifiers accepted on the command line and in
//! upload forms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::paths::output_path;

/// Compression level identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileId {
    /// Light compression, fastest encode.
    #[default]
    Normal,
    /// Stronger compression.
    High,
    /// Stronger still.
    VeryHigh,
    /// Smallest output.
    Maximum,
}

impl ProfileId {
    /// Every profile, lightest first.
    pub const ALL: [ProfileId; 4] = [
        ProfileId::Normal,
        ProfileId::High,
        ProfileId::VeryHigh,
        ProfileId::Maximum,
    ];

    /// Identifier as used in file names, flags, and forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::VeryHigh => "very_high",
            Self::Maximum => "maximum",
        }
    }

    /// Resolve an identifier, falling back to [`ProfileId::Normal`] for
    /// anything unrecognized.
    ///
    /// # Examples
    ///
    /// ```
    /// use vidpress_common::ProfileId;
    ///
    /// assert_eq!(ProfileId::resolve("very_high"), ProfileId::VeryHigh);
    /// assert_eq!(ProfileId::resolve("ultra"), ProfileId::Normal);
    /// assert_eq!(ProfileId::resolve(""), ProfileId::Normal);
    /// ```
    pub fn resolve(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Encoder parameters for this profile.
    pub fn params(&self) -> CompressionProfile {
        match self {
            Self::Normal => CompressionProfile {
                crf: 23,
                preset: "ultrafast",
            },
            Self::High => CompressionProfile {
                crf: 28,
                preset: "fast",
            },
            Self::VeryHigh => CompressionProfile {
                crf: 30,
                preset: "faster",
            },
            Self::Maximum => CompressionProfile {
                crf: 32,
                preset: "veryfast",
            },
        }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "very_high" | "veryhigh" | "very-high" => Ok(Self::VeryHigh),
            "maximum" | "max" => Ok(Self::Maximum),
            _ => Err(format!("Unknown compression level: {}", s)),
        }
    }
}

/// Encoder parameters for a compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompressionProfile {
    /// x264 constant rate factor.
    pub crf: u8,
    /// x264 speed preset.
    pub preset: &'static str,
}

/// Immutable description of one compression job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Source video.
    pub input_path: PathBuf,
    /// Destination directory; `None` writes next to the input.
    pub output_dir: Option<PathBuf>,
    /// Compression level.
    pub profile: ProfileId,
    /// Thread count handed to the encoder.
    pub threads: NonZeroUsize,
}

impl JobDescriptor {
    pub fn new(input_path: impl Into<PathBuf>, profile: ProfileId, threads: NonZeroUsize) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: None,
            profile,
            threads,
        }
    }

    /// Write output into `dir` instead of next to the input. An empty path
    /// is treated as no directory.
    pub fn with_output_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.output_dir = dir
            .map(Into::into)
            .filter(|d: &PathBuf| !d.as_os_str().is_empty());
        self
    }

    /// Where this job writes its result.
    pub fn output_path(&self) -> PathBuf {
        output_path(&self.input_path, self.profile, self.output_dir.as_deref())
    }
}
