//! Bounded-concurrency batch execution.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vidpress_av::Transcoder;
use vidpress_common::{Error, JobDescriptor, Result};

use super::outcome::{BatchResult, JobError, JobOutcome};

/// Called with each outcome as soon as its job finishes.
pub type OutcomeCallback = Arc<dyn Fn(&JobOutcome) + Send + Sync>;

/// A set of jobs submitted together.
pub struct Batch {
    jobs: Vec<JobDescriptor>,
    limit: NonZeroUsize,
    cancel: CancellationToken,
    on_complete: Option<OutcomeCallback>,
}

impl Batch {
    /// At most `limit` of `jobs` run at once.
    pub fn new(jobs: Vec<JobDescriptor>, limit: NonZeroUsize) -> Self {
        Self {
            jobs,
            limit,
            cancel: CancellationToken::new(),
            on_complete: None,
        }
    }

    /// Stop admitting jobs and abort running ones once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_complete(mut self, callback: OutcomeCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }
}

/// Permits a job holds while it runs.
struct Admission {
    _batch: OwnedSemaphorePermit,
    _global: Option<OwnedSemaphorePermit>,
}

/// A submitted job: either still running or already settled.
enum Slot {
    Running {
        index: usize,
        input_path: PathBuf,
        output_path: PathBuf,
        handle: JoinHandle<JobOutcome>,
    },
    Settled(JobOutcome),
}

/// Runs batches of compression jobs.
///
/// Each batch gets its own admission semaphore sized to its limit. A
/// dispatcher built with [`Dispatcher::with_global_limit`] also holds a gate
/// shared by every batch it runs, so concurrent callers are capped together.
#[derive(Clone)]
pub struct Dispatcher {
    transcoder: Arc<dyn Transcoder>,
    global_gate: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            global_gate: None,
        }
    }

    /// Cap jobs running at once across all batches of this dispatcher.
    pub fn with_global_limit(mut self, limit: NonZeroUsize) -> Self {
        self.global_gate = Some(Arc::new(Semaphore::new(limit.get())));
        self
    }

    /// Run `jobs` with at most `limit` at once, without cancellation or
    /// progress reporting.
    pub async fn run(&self, jobs: Vec<JobDescriptor>, limit: NonZeroUsize) -> Result<BatchResult> {
        self.run_batch(Batch::new(jobs, limit)).await
    }

    /// Run a batch to completion.
    ///
    /// Every job yields exactly one outcome, whether it succeeded, failed,
    /// panicked, or was cancelled. Jobs are admitted in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Prerequisite`] if an output directory named by the
    /// batch cannot be created. No job has started in that case.
    pub async fn run_batch(&self, batch: Batch) -> Result<BatchResult> {
        let Batch {
            jobs,
            limit,
            cancel,
            on_complete,
        } = batch;

        prepare_output_dirs(&jobs).await?;

        let total = jobs.len();
        tracing::info!("Dispatching {} job(s), concurrency {}", total, limit);

        let semaphore = Arc::new(Semaphore::new(limit.get()));
        let mut slots = Vec::with_capacity(total);

        for (index, job) in jobs.into_iter().enumerate() {
            let input_path = job.input_path.clone();
            let output_path = job.output_path();

            let admission = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(JobError::Cancelled),
                admission = self.admit(&semaphore) => admission,
            };

            let admission = match admission {
                Ok(admission) => admission,
                Err(err) => {
                    let outcome = JobOutcome {
                        index,
                        input_path,
                        output_path,
                        result: Err(err),
                    };
                    notify(&on_complete, &outcome);
                    slots.push(Slot::Settled(outcome));
                    continue;
                }
            };

            tracing::debug!("Starting job {} of {}: {:?}", index + 1, total, input_path);

            let handle = tokio::spawn(run_job(
                self.transcoder.clone(),
                job,
                index,
                output_path.clone(),
                admission,
                cancel.clone(),
                on_complete.clone(),
            ));

            slots.push(Slot::Running {
                index,
                input_path,
                output_path,
                handle,
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        for slot in slots {
            let outcome = match slot {
                Slot::Settled(outcome) => outcome,
                Slot::Running {
                    index,
                    input_path,
                    output_path,
                    handle,
                } => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!("Job {} for {:?} panicked: {}", index, input_path, e);
                        let outcome = JobOutcome {
                            index,
                            input_path,
                            output_path,
                            result: Err(JobError::Failed(format!("job task failed: {e}"))),
                        };
                        notify(&on_complete, &outcome);
                        outcome
                    }
                },
            };
            outcomes.push(outcome);
        }

        let result = BatchResult::new(outcomes);
        tracing::info!(
            "Batch finished: {} succeeded, {} failed ({} cancelled)",
            result.succeeded(),
            result.failed(),
            result.cancelled()
        );

        Ok(result)
    }

    /// Wait for a batch slot, then for the shared gate if there is one.
    async fn admit(&self, batch: &Arc<Semaphore>) -> std::result::Result<Admission, JobError> {
        let closed = |_| JobError::Failed("admission gate closed".to_string());

        let batch_permit = batch.clone().acquire_owned().await.map_err(closed)?;
        let global_permit = match &self.global_gate {
            Some(gate) => Some(gate.clone().acquire_owned().await.map_err(closed)?),
            None => None,
        };

        Ok(Admission {
            _batch: batch_permit,
            _global: global_permit,
        })
    }
}

async fn run_job(
    transcoder: Arc<dyn Transcoder>,
    job: JobDescriptor,
    index: usize,
    output_path: PathBuf,
    admission: Admission,
    cancel: CancellationToken,
    on_complete: Option<OutcomeCallback>,
) -> JobOutcome {
    // Released when this task ends, however it ends.
    let _admission = admission;

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        result = transcoder.transcode(&job.input_path, &output_path, job.profile, job.threads) => {
            result.map_err(|e| JobError::Failed(e.to_string()))
        }
    };

    match &result {
        Ok(()) => tracing::debug!("Job {} finished: {:?}", index, output_path),
        Err(JobError::Cancelled) => tracing::info!("Job {} cancelled: {:?}", index, job.input_path),
        Err(e) => tracing::warn!("Job {} failed for {:?}: {}", index, job.input_path, e),
    }

    let outcome = JobOutcome {
        index,
        input_path: job.input_path,
        output_path,
        result,
    };
    notify(&on_complete, &outcome);
    outcome
}

/// Invoke the callback once for `outcome`. A panicking callback is logged
/// and does not affect the job or the batch.
fn notify(callback: &Option<OutcomeCallback>, outcome: &JobOutcome) {
    if let Some(cb) = callback {
        if catch_unwind(AssertUnwindSafe(|| cb(outcome))).is_err() {
            tracing::error!("Completion callback panicked for job {}", outcome.index);
        }
    }
}

/// Create every output directory the batch writes into.
async fn prepare_output_dirs(jobs: &[JobDescriptor]) -> Result<()> {
    let dirs: BTreeSet<&PathBuf> = jobs.iter().filter_map(|j| j.output_dir.as_ref()).collect();

    for dir in dirs {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::prerequisite(dir, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vidpress_common::ProfileId;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Start(PathBuf),
        End(PathBuf),
    }

    /// Records calls, tracks concurrency, and fails inputs named `fail*`.
    #[derive(Default)]
    struct RecordingTranscoder {
        delay: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
        events: Mutex<Vec<Event>>,
    }

    impl RecordingTranscoder {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Transcoder for RecordingTranscoder {
        async fn transcode(
            &self,
            input: &Path,
            _output: &Path,
            _profile: ProfileId,
            _threads: NonZeroUsize,
        ) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            self.events.lock().push(Event::Start(input.to_path_buf()));

            tokio::time::sleep(self.delay).await;

            self.events.lock().push(Event::End(input.to_path_buf()));
            self.running.fetch_sub(1, Ordering::SeqCst);

            let name = input.file_name().unwrap_or_default().to_string_lossy();
            if name.starts_with("fail") {
                return Err(Error::tool("ffmpeg", "exited with exit status: 1"));
            }
            Ok(())
        }
    }

    struct PanickingTranscoder;

    #[async_trait]
    impl Transcoder for PanickingTranscoder {
        async fn transcode(
            &self,
            input: &Path,
            _output: &Path,
            _profile: ProfileId,
            _threads: NonZeroUsize,
        ) -> Result<()> {
            if input.ends_with("boom.mp4") {
                panic!("transcoder exploded");
            }
            Ok(())
        }
    }

    fn jobs(names: &[&str]) -> Vec<JobDescriptor> {
        names
            .iter()
            .map(|n| JobDescriptor::new(*n, ProfileId::Normal, NonZeroUsize::MIN))
            .collect()
    }

    fn limit(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn every_job_gets_an_outcome_within_limit() {
        let names: Vec<String> = (0..8).map(|i| format!("v{i}.mp4")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        for c in 1..=names.len() {
            let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(10)));
            let dispatcher = Dispatcher::new(transcoder.clone());

            let result = dispatcher.run(jobs(&names), limit(c)).await.unwrap();

            assert_eq!(result.len(), names.len());
            assert!(result.is_success());
            assert!(transcoder.max_running.load(Ordering::SeqCst) <= c);
        }
    }

    #[tokio::test]
    async fn limit_is_reached_when_jobs_overlap() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(50)));
        let dispatcher = Dispatcher::new(transcoder.clone());

        dispatcher
            .run(jobs(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]), limit(2))
            .await
            .unwrap();

        assert_eq!(transcoder.max_running.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn limit_of_one_is_sequential() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(5)));
        let dispatcher = Dispatcher::new(transcoder.clone());

        dispatcher
            .run(jobs(&["a.mp4", "b.mp4", "c.mp4"]), limit(1))
            .await
            .unwrap();

        let events = transcoder.events.lock().clone();
        let expected: Vec<Event> = ["a.mp4", "b.mp4", "c.mp4"]
            .iter()
            .flat_map(|n| [Event::Start(PathBuf::from(n)), Event::End(PathBuf::from(n))])
            .collect();
        assert_eq!(events, expected);
    }

    #[tokio::test]
    async fn failure_does_not_stop_siblings() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(5)));
        let dispatcher = Dispatcher::new(transcoder);

        let result = dispatcher
            .run(jobs(&["a.mp4", "fail.mp4", "c.mp4"]), limit(2))
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.succeeded(), 2);
        let failed = &result.outcomes()[1];
        assert_eq!(failed.input_path, PathBuf::from("fail.mp4"));
        assert_matches!(&failed.result, Err(JobError::Failed(msg)) if msg.contains("ffmpeg"));
        assert!(result.outcomes()[0].is_success());
        assert!(result.outcomes()[2].is_success());
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let dispatcher = Dispatcher::new(Arc::new(PanickingTranscoder));

        let result = dispatcher
            .run(jobs(&["a.mp4", "boom.mp4", "c.mp4"]), limit(3))
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.succeeded(), 2);
        assert!(!result.outcomes()[1].is_success());
    }

    #[tokio::test]
    async fn outcomes_follow_submission_order() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(1)));
        let dispatcher = Dispatcher::new(transcoder);

        let result = dispatcher
            .run(jobs(&["c.mp4", "a.mp4", "b.mp4"]), limit(3))
            .await
            .unwrap();

        let inputs: Vec<PathBuf> = result.iter().map(|o| o.input_path.clone()).collect();
        assert_eq!(
            inputs,
            vec![PathBuf::from("c.mp4"), PathBuf::from("a.mp4"), PathBuf::from("b.mp4")]
        );
        let indices: Vec<usize> = result.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn empty_batch_completes() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingTranscoder::default()));
        let result = dispatcher.run(Vec::new(), limit(1)).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn callback_sees_every_outcome() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(1)));
        let dispatcher = Dispatcher::new(transcoder);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let batch = Batch::new(jobs(&["a.mp4", "fail.mp4", "c.mp4"]), limit(2))
            .on_complete(Arc::new(move |o: &JobOutcome| sink.lock().push(o.index)));
        dispatcher.run_batch(batch).await.unwrap();

        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn panicking_callback_runs_once_per_job() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(1)));
        let dispatcher = Dispatcher::new(transcoder);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let batch = Batch::new(jobs(&["a.mp4", "b.mp4", "c.mp4"]), limit(2)).on_complete(
            Arc::new(move |o: &JobOutcome| {
                counter.fetch_add(1, Ordering::SeqCst);
                if o.index == 1 {
                    panic!("callback exploded");
                }
            }),
        );
        let result = dispatcher.run_batch(batch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.len(), 3);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn cancellation_still_accounts_for_every_job() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_secs(30)));
        let dispatcher = Dispatcher::new(transcoder.clone());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let batch = Batch::new(jobs(&["a.mp4", "b.mp4", "c.mp4"]), limit(1))
            .with_cancellation(token);
        let result = dispatcher.run_batch(batch).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.cancelled(), 3);
        // Only the first job was ever admitted.
        assert_eq!(transcoder.max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn global_gate_caps_parallel_batches() {
        let transcoder = Arc::new(RecordingTranscoder::with_delay(Duration::from_millis(30)));
        let dispatcher = Dispatcher::new(transcoder.clone()).with_global_limit(limit(1));

        let first = dispatcher.run(jobs(&["a.mp4", "b.mp4"]), limit(2));
        let second = dispatcher.run(jobs(&["c.mp4", "d.mp4"]), limit(2));
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().len(), 2);
        assert_eq!(second.unwrap().len(), 2);
        assert_eq!(transcoder.max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn output_dirs_are_created_before_jobs_run() {
        let temp = tempfile::tempdir().unwrap();
        let out = temp.path().join("nested/out");
        let transcoder = Arc::new(RecordingTranscoder::default());
        let dispatcher = Dispatcher::new(transcoder);

        let job = JobDescriptor::new("a.mp4", ProfileId::High, NonZeroUsize::MIN)
            .with_output_dir(Some(&out));
        let result = dispatcher.run(vec![job], limit(1)).await.unwrap();

        assert!(out.is_dir());
        assert_eq!(result.outcomes()[0].output_path, out.join("a_high_compressed.mp4"));
    }

    #[tokio::test]
    async fn unpreparable_output_dir_aborts_batch() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let transcoder = Arc::new(RecordingTranscoder::default());
        let dispatcher = Dispatcher::new(transcoder.clone());
        let job = JobDescriptor::new("a.mp4", ProfileId::High, NonZeroUsize::MIN)
            .with_output_dir(Some(blocker.join("out")));

        let err = dispatcher.run(vec![job], limit(1)).await.unwrap_err();

        assert_matches!(err, Error::Prerequisite { .. });
        assert!(transcoder.events.lock().is_empty());
    }
}
