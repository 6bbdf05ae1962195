//! Shared test harness for integration tests.
//!
//! Provides [`FakeTranscoder`], a [`Transcoder`] that writes a placeholder
//! output instead of running ffmpeg, and [`spawn_server`] which starts Axum
//! on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use vidpress::config::Config;
use vidpress::server::{create_router, AppContext};
use vidpress_av::Transcoder;
use vidpress_common::{Error, ProfileId, Result};

/// Writes `compressed` to the output path after an optional delay.
///
/// Inputs whose file name starts with `fail` are rejected the way a
/// non-zero ffmpeg exit would be.
#[derive(Default)]
pub struct FakeTranscoder {
    delay: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
    pub calls: Mutex<Vec<(String, ProfileId, usize)>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Highest number of transcodes seen running at once.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        profile: ProfileId,
        threads: NonZeroUsize,
    ) -> Result<()> {
        if !input.exists() {
            return Err(Error::file_not_found(input));
        }

        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().push((name.clone(), profile, threads.get()));

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if name.starts_with("fail") {
            return Err(Error::tool("ffmpeg", "exited with exit status: 1"));
        }

        tokio::fs::write(output, b"compressed")
            .await
            .map_err(|e| Error::tool("ffmpeg", e.to_string()))?;
        Ok(())
    }
}

/// Start an Axum server on a random port and return its address.
pub async fn spawn_server(config: Config, transcoder: Arc<FakeTranscoder>) -> SocketAddr {
    let ctx = AppContext::with_transcoder(config, transcoder);
    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind random port");
    let addr = listener.local_addr().expect("failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    addr
}

/// Write a small placeholder video file.
pub fn touch_video(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really a video").expect("failed to write input");
    path
}
