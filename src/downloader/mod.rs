//! Bounded-parallel locator downloads with pause-on-error recovery.
//!
//! - [`transfer`] - Fetching one locator to disk
//! - [`recovery`] - Policies deciding how a run continues after a failure
//! - `gate` - Admission control shared by the workers of one run
//!
//! Every locator gets its own task. A task first takes a permit from the run's
//! semaphore (at most `concurrency` tasks hold one), then waits on the
//! admission gate, then fetches. A failure pauses the gate: tasks about to
//! start wait, while fetches already in flight carry on.

mod gate;
pub mod recovery;
pub mod transfer;


pub use recovery::{
    ConsolePrompt, FailureIncident, FixedDecision, RecoveryDecision, RecoveryPolicy, policy_for,
};
pub use transfer::{HttpLocatorFetcher, LocatorFetcher, ProgressFn};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Semaphore, broadcast};

use crate::error::{Error, Result};
use crate::planner::RemoteLocator;
use crate::types::Event;
use gate::{Admission, AdmissionGate, IncidentRole};

/// Summary of a finished run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Locators in the run
    pub total: usize,
    /// Locators processed (succeeded or recorded as failed)
    pub completed: usize,
    /// Locators fetched successfully
    pub succeeded: usize,
    /// URLs recorded as failed
    pub failed: Vec<String>,
    /// Bytes written
    pub bytes: u64,
    /// Failure incidents the recovery policy resolved
    pub incidents: u64,
}

/// Downloads locators under bounded concurrency
#[derive(Clone)]
pub struct ConcurrentDownloader {
    fetcher: Arc<dyn LocatorFetcher>,
    policy: Arc<dyn RecoveryPolicy>,
    concurrency: usize,
    event_tx: broadcast::Sender<Event>,
}

/// How one locator's task ended
enum Outcome {
    Succeeded(u64),
    Failed(String),
    NotStarted,
    Fatal(Error),
}

/// State shared by the tasks of one run
struct RunState {
    fetcher: Arc<dyn LocatorFetcher>,
    policy: Arc<dyn RecoveryPolicy>,
    event_tx: broadcast::Sender<Event>,
    semaphore: Arc<Semaphore>,
    gate: AdmissionGate,
    dest_root: PathBuf,
    total: usize,
    completed: AtomicUsize,
    bytes: AtomicU64,
}

impl ConcurrentDownloader {
    /// Create a downloader admitting at most `concurrency` fetches at a time (minimum 1)
    pub fn new(
        fetcher: Arc<dyn LocatorFetcher>,
        policy: Arc<dyn RecoveryPolicy>,
        concurrency: usize,
    ) -> Self {
        // Channel capacity: progress events are frequent, subscribers may lag
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            fetcher,
            policy,
            concurrency: concurrency.max(1),
            event_tx,
        }
    }

    /// Publish events on an existing channel instead of a private one
    pub fn with_event_sender(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = event_tx;
        self
    }

    /// Subscribe to download events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Maximum number of concurrently admitted fetches
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every locator to `dest_root/{locator.relative_path()}`
    ///
    /// Returns once every locator has been processed. Re-running downloads
    /// everything again.
    ///
    /// # Errors
    ///
    /// - [`Error::Aborted`] if the recovery policy chose
    ///   [`RecoveryDecision::AbortAll`]
    /// - the first fatal error (e.g. [`Error::FileSystem`]) hit by any task;
    ///   admission stops and in-flight fetches finish first
    pub async fn run(
        &self,
        locators: Vec<RemoteLocator>,
        dest_root: &Path,
    ) -> Result<DownloadReport> {
        let total = locators.len();
        tracing::info!(
            total,
            concurrency = self.concurrency,
            dest = %dest_root.display(),
            "starting download run"
        );

        let state = Arc::new(RunState {
            fetcher: self.fetcher.clone(),
            policy: self.policy.clone(),
            event_tx: self.event_tx.clone(),
            semaphore: Arc::new(Semaphore::new(self.concurrency)),
            gate: AdmissionGate::new(),
            dest_root: dest_root.to_path_buf(),
            total,
            completed: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
        });

        let handles: Vec<_> = locators
            .into_iter()
            .map(|locator| {
                let state = state.clone();
                tokio::spawn(async move { state.process(locator).await })
            })
            .collect();

        let mut report = DownloadReport {
            total,
            ..Default::default()
        };
        let mut not_started = 0;
        let mut first_fatal: Option<Error> = None;

        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Outcome::Succeeded(_)) => report.succeeded += 1,
                Ok(Outcome::Failed(url)) => report.failed.push(url),
                Ok(Outcome::NotStarted) => not_started += 1,
                Ok(Outcome::Fatal(e)) => {
                    first_fatal.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "download task panicked");
                    first_fatal.get_or_insert(Error::Io(std::io::Error::other(format!(
                        "download task failed: {}",
                        e
                    ))));
                }
            }
        }

        report.completed = state.completed.load(Ordering::SeqCst);
        report.bytes = state.bytes.load(Ordering::SeqCst);
        report.incidents = state.gate.incidents();

        if let Some(e) = first_fatal {
            tracing::error!(error = %e, "download run stopped by fatal error");
            return Err(e);
        }

        if state.gate.is_aborted() {
            tracing::warn!(
                failed = report.failed.len(),
                remaining = not_started,
                "download run aborted"
            );
            return Err(Error::Aborted {
                failed: report.failed.len(),
                remaining: not_started,
            });
        }

        tracing::info!(
            total,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            bytes = report.bytes,
            "download run finished"
        );
        Ok(report)
    }
}

impl RunState {
    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    async fn process(&self, locator: RemoteLocator) -> Outcome {
        let Ok(_permit) = self.semaphore.clone().acquire_owned().await else {
            return Outcome::NotStarted;
        };

        let url = locator.url();
        let dest = match locator.relative_path() {
            Ok(relative) => self.dest_root.join(relative),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "locator has no local path");
                self.gate.abort();
                return Outcome::Fatal(e);
            }
        };
        let mut retried = false;

        loop {
            if self.gate.admit().await == Admission::Aborted {
                return Outcome::NotStarted;
            }

            self.emit_event(Event::LocatorStarted { url: url.clone() });

            let progress = |bytes: u64, declared: Option<u64>| {
                let fraction = declared
                    .filter(|len| *len > 0)
                    .map(|len| (bytes as f64 / len as f64).min(1.0));
                self.emit_event(Event::LocatorProgress {
                    url: url.clone(),
                    bytes,
                    fraction,
                });
            };

            let error = match self.fetcher.fetch(&locator, &dest, &progress).await {
                Ok(bytes) => {
                    self.bytes.fetch_add(bytes, Ordering::SeqCst);
                    self.complete(&url, true);
                    return Outcome::Succeeded(bytes);
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(url = %url, error = %e, "fatal error while fetching");
                    self.gate.abort();
                    return Outcome::Fatal(e);
                }
                Err(e) => e,
            };

            tracing::warn!(url = %url, error = %error, "fetch failed");
            self.emit_event(Event::LocatorFailed {
                url: url.clone(),
                error: error.to_string(),
            });

            match self.recover(&url, &error).await {
                RecoveryDecision::ResumeAll if !retried => {
                    retried = true;
                    tracing::info!(url = %url, "retrying failed locator");
                }
                _ => {
                    self.complete(&url, false);
                    return Outcome::Failed(url);
                }
            }
        }
    }

    /// Join or open a failure incident and return its decision
    async fn recover(&self, url: &str, error: &Error) -> RecoveryDecision {
        match self.gate.report_failure() {
            IncidentRole::Leader(incident) => {
                tracing::warn!(incident, url, "pausing admission");
                self.emit_event(Event::Paused {
                    url: url.to_string(),
                });

                let decision = self
                    .policy
                    .decide(&FailureIncident {
                        url: url.to_string(),
                        error: error.to_string(),
                        completed: self.completed.load(Ordering::SeqCst),
                        total: self.total,
                    })
                    .await;

                self.gate.resolve(decision);
                tracing::info!(incident, decision = ?decision, "failure incident resolved");
                self.emit_event(Event::Resumed { decision });
                decision
            }
            IncidentRole::Follower(incident) => {
                tracing::debug!(incident, url, "joining open failure incident");
                self.gate.decision_for(incident).await
            }
            IncidentRole::Aborted => {
                tracing::debug!(url, "failure after abort, not consulting recovery policy");
                RecoveryDecision::AbortAll
            }
        }
    }

    fn complete(&self, url: &str, success: bool) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit_event(Event::LocatorCompleted {
            url: url.to_string(),
            success,
            completed,
            total: self.total,
        });
    }
}
