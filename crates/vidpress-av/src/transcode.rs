//! Single-file compression through ffmpeg.
//!
//! [`Transcoder`] is the seam the dispatcher drives; [`FfmpegTranscoder`] is
//! the production implementation. Tests substitute their own.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use vidpress_common::{Error, ProfileId, Result};

use crate::command::{OutputMode, ToolCommand};
use crate::tools::get_tool_path;

/// Audio bitrate for every profile.
const AUDIO_BITRATE: &str = "128k";

/// Upper bound on packets buffered while muxing.
const MAX_MUXING_QUEUE_SIZE: &str = "9999";

/// Compresses one file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Compress `input` into `output` using `profile`, with `threads` as the
    /// encoder's thread budget. Resolves once the work has finished.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: ProfileId,
        threads: NonZeroUsize,
    ) -> Result<()>;
}

/// Build the ffmpeg argument list for one job.
///
/// `-y` is passed so reruns overwrite earlier output instead of prompting.
pub fn ffmpeg_args(
    input: &Path,
    output: &Path,
    profile: ProfileId,
    threads: NonZeroUsize,
) -> Vec<String> {
    let params = profile.params();

    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        params.crf.to_string(),
        "-preset".to_string(),
        params.preset.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-threads".to_string(),
        threads.to_string(),
        "-tune".to_string(),
        "fastdecode".to_string(),
        "-max_muxing_queue_size".to_string(),
        MAX_MUXING_QUEUE_SIZE.to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Runs the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Option<Duration>,
    output_mode: OutputMode,
}

impl FfmpegTranscoder {
    /// Use the given ffmpeg executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            output_mode: OutputMode::Inherit,
        }
    }

    /// Locate ffmpeg, preferring `configured` when it exists.
    ///
    /// A missing binary is not an error here: the bare name is kept so each
    /// job reports the spawn failure in its own outcome.
    pub fn discover(configured: Option<&Path>) -> Self {
        let program = get_tool_path("ffmpeg", configured).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            PathBuf::from("ffmpeg")
        });
        Self::new(program)
    }

    /// Kill ffmpeg if a single job runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stream ffmpeg output to the terminal or capture it into the log.
    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: ProfileId,
        threads: NonZeroUsize,
    ) -> Result<()> {
        if tokio::fs::metadata(input).await.is_err() {
            return Err(Error::file_not_found(input));
        }

        tracing::info!(
            "Compressing {:?} -> {:?} (profile {}, {} threads)",
            input,
            output,
            profile,
            threads
        );

        let result = ToolCommand::new(self.program.clone())
            .args(ffmpeg_args(input, output, profile, threads))
            .timeout(self.timeout)
            .output_mode(self.output_mode)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!("ffmpeg failed for {:?}: {}", input, e);
                Err(e)
            }
        }
    }
}
