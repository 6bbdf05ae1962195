//! Batch dispatch of compression jobs.
//!
//! A [`Dispatcher`] takes a batch of [`JobDescriptor`](vidpress_common::JobDescriptor)s
//! and runs them through a [`Transcoder`](vidpress_av::Transcoder) with a
//! bounded number in flight. Every job yields one [`JobOutcome`]; the batch
//! result lists them in submission order.

mod dispatcher;
mod outcome;

pub use dispatcher::{Batch, Dispatcher, OutcomeCallback};
pub use outcome::{BatchResult, JobError, JobOutcome};
