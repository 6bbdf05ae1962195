use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use vidpress_common::ProfileId;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Batch defaults used when the command line leaves a value unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultsConfig {
    /// Compression level; unknown names fall back to `normal`
    #[serde(default = "default_level")]
    pub level: String,

    /// Maximum files compressed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// ffmpeg threads per file (default: number of CPUs)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Shared output directory (default: next to each input)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_level() -> String {
    ProfileId::Normal.to_string()
}

fn default_concurrency() -> usize {
    1
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            concurrency: default_concurrency(),
            threads: None,
            output_dir: None,
        }
    }
}

impl DefaultsConfig {
    pub fn profile(&self) -> ProfileId {
        ProfileId::resolve(&self.level)
    }

    pub fn threads(&self) -> NonZeroUsize {
        self.threads
            .and_then(NonZeroUsize::new)
            .or_else(|| NonZeroUsize::new(num_cpus::get()))
            .unwrap_or(NonZeroUsize::MIN)
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.concurrency).unwrap_or(NonZeroUsize::MIN)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes (default: 1 GiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Time allowed for a whole upload-and-compress request (default: 600)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// ffmpeg threads for each uploaded file
    #[serde(default = "default_upload_threads")]
    pub upload_threads: usize,

    /// Uploads compressed at the same time across all requests
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Where output goes when the form leaves the directory empty
    #[serde(default = "default_output_dir")]
    pub default_output_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_upload_bytes() -> usize {
    1 << 30
}
fn default_request_timeout() -> u64 {
    600
}
fn default_upload_threads() -> usize {
    4
}
fn default_max_concurrent_jobs() -> usize {
    2
}
fn default_output_dir() -> String {
    "~/Downloads".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout(),
            upload_threads: default_upload_threads(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            default_output_dir: default_output_dir(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_threads(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.upload_threads).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn max_concurrent_jobs(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_concurrent_jobs).unwrap_or(NonZeroUsize::MIN)
    }

    /// Default output directory with `~` expanded.
    pub fn default_output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.default_output_dir).as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Kill ffmpeg after this many seconds on a single file
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
