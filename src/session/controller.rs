//! Generation Session Controller
//!
//! One session = admission check, submission, poll loop, and (on success)
//! the quota charge, composed behind a single entry point. Counters are
//! charged only after the job succeeds; a cancelled or failed job costs
//! nothing. A second session requested while one is running is rejected
//! outright, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::client::{GenerationApi, SubmitError};
use crate::api::protocol::JobRequest;
use crate::clock::Clock;
use crate::job::cancel::CancellationToken;
use crate::job::poller::{JobOutcome, PollError, PollLoop, ProgressUpdate};
use crate::job::state::GenerationJob;
use crate::quota::{ResourceClass, UsageTracker, WindowScope};
use crate::storage::RecordStore;

use super::history::{GenerationHistory, GenerationRecord};
use super::notify::{JobNotice, NotificationSink, UsageNotice};

/// Error types for a generation session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Admission control rejected the session before submission
    #[error("{scope} {class} quota exceeded")]
    QuotaExceeded {
        class: ResourceClass,
        scope: WindowScope,
    },

    /// Another session is already in flight
    #[error("A generation session is already in progress")]
    Busy,

    /// Submission failed
    #[error("Submission failed: {0}")]
    Submit(#[from] SubmitError),

    /// The poll loop failed
    #[error("Polling failed: {0}")]
    Poll(#[from] PollError),
}

/// Timing parameters for the poll loop
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Delay between status queries
    pub poll_interval: Duration,

    /// Status-query budget before a job times out
    pub max_polls: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            max_polls: 60,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Local session id
    pub session_id: String,

    /// Remote job id
    pub job_id: String,

    /// How the job settled
    pub outcome: JobOutcome,
}

/// Orchestrates one generation session at a time
pub struct SessionController {
    api: Arc<dyn GenerationApi>,
    tracker: Arc<UsageTracker>,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag on every exit path
struct SessionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SessionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self { flag })
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl SessionController {
    /// Create a controller over the given collaborators
    pub fn new(
        api: Arc<dyn GenerationApi>,
        tracker: Arc<UsageTracker>,
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            api,
            tracker,
            store,
            sink,
            clock,
            config,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Whether a session is currently in flight
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run one generation session to a terminal outcome.
    ///
    /// Admission is checked before anything is submitted; the generation
    /// counters are charged only when the job succeeds.
    pub async fn generate<F>(
        &self,
        request: &JobRequest,
        on_progress: F,
        token: &CancellationToken,
    ) -> Result<GenerationOutcome, SessionError>
    where
        F: FnMut(&ProgressUpdate<'_>),
    {
        let Some(_guard) = SessionGuard::acquire(&self.in_progress) else {
            return Err(SessionError::Busy);
        };

        let class = ResourceClass::Generation;
        if !self.tracker.check_limit(class).await {
            let scope = self.blocking_scope(class).await;
            self.sink
                .usage_notice(UsageNotice::LimitReached { class, scope })
                .await;
            return Err(SessionError::QuotaExceeded { class, scope });
        }

        if self.tracker.is_near_limit(class).await {
            let usage = self.tracker.usage(class).await;
            self.sink
                .usage_notice(UsageNotice::NearLimit {
                    class,
                    remaining_today: usage.daily.remaining,
                })
                .await;
        }

        let session_id = Uuid::new_v4().to_string();
        let job_id = self.api.submit(request).await?;
        info!("Session {} submitted job {}", session_id, job_id);

        let mut job = GenerationJob::new(job_id.clone(), self.config.max_polls, self.clock.now());
        let poll_loop = PollLoop::new(self.config.poll_interval);
        let outcome = match poll_loop
            .run(self.api.as_ref(), &mut job, on_progress, token)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.sink
                    .job_notice(JobNotice::Failed {
                        job_id: job_id.clone(),
                        message: e.to_string(),
                    })
                    .await;
                return Err(SessionError::Poll(e));
            }
        };

        match &outcome {
            JobOutcome::Succeeded(urls) => {
                // Charge-on-success: the counters move only now
                if !self.tracker.track(class).await {
                    warn!(
                        "Job {} succeeded but the quota charge was refused; counters already at limit",
                        job_id
                    );
                }
                GenerationHistory::append(
                    self.store.as_ref(),
                    GenerationRecord {
                        id: session_id.clone(),
                        job_id: job_id.clone(),
                        prompt_chars: request.prompt.chars().count(),
                        urls: urls.clone(),
                        completed_at: self.clock.now(),
                    },
                )
                .await;
                info!("Session {} succeeded with {} images", session_id, urls.len());
            }
            JobOutcome::Failed(message) => {
                self.sink
                    .job_notice(JobNotice::Failed {
                        job_id: job_id.clone(),
                        message: message.clone(),
                    })
                    .await;
            }
            JobOutcome::TimedOut { polls } => {
                self.sink
                    .job_notice(JobNotice::TimedOut {
                        job_id: job_id.clone(),
                        polls: *polls,
                    })
                    .await;
            }
            JobOutcome::Cancelled => {
                self.sink
                    .job_notice(JobNotice::Cancelled {
                        job_id: job_id.clone(),
                    })
                    .await;
            }
        }

        Ok(GenerationOutcome {
            session_id,
            job_id,
            outcome,
        })
    }

    async fn blocking_scope(&self, class: ResourceClass) -> WindowScope {
        let usage = self.tracker.usage(class).await;
        if usage.daily.remaining == 0 {
            WindowScope::Daily
        } else {
            WindowScope::Monthly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::QueryError;
    use crate::api::protocol::JobStatus;
    use crate::clock::ManualClock;
    use crate::quota::{FixedLimits, QuotaLimits};
    use crate::session::history::GenerationHistory;
    use crate::session::notify::RecordingSink;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;

    struct FakeApi {
        states: Vec<&'static str>,
        submits: AtomicUsize,
        queries: AtomicUsize,
        status_delay: Duration,
    }

    impl FakeApi {
        fn new(states: Vec<&'static str>) -> Self {
            Self {
                states,
                submits: AtomicUsize::new(0),
                queries: AtomicUsize::new(0),
                status_delay: Duration::ZERO,
            }
        }

        fn slow(states: Vec<&'static str>, delay: Duration) -> Self {
            Self {
                status_delay: delay,
                ..Self::new(states)
            }
        }
    }

    #[async_trait]
    impl GenerationApi for FakeApi {
        async fn submit(&self, _request: &JobRequest) -> Result<String, SubmitError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            Ok("task-77".to_string())
        }

        async fn status(&self, _job_id: &str) -> Result<JobStatus, QueryError> {
            if !self.status_delay.is_zero() {
                tokio::time::sleep(self.status_delay).await;
            }
            let i = self.queries.fetch_add(1, Ordering::SeqCst);
            let state = self.states.get(i).copied().unwrap_or("processing");
            Ok(JobStatus {
                state: state.to_string(),
                result_urls: if state == "success" {
                    vec!["https://cdn.example/out.png".to_string()]
                } else {
                    Vec::new()
                },
                failure_message: None,
            })
        }
    }

    struct Fixture {
        controller: SessionController,
        api: Arc<FakeApi>,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        tracker: Arc<UsageTracker>,
    }

    fn fixture(api: FakeApi, daily_limit: u32) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::new());
        let limits = QuotaLimits {
            daily_generation_limit: daily_limit,
            monthly_generation_limit: 1000,
            daily_download_limit: 50,
            monthly_download_limit: 1000,
            warning_threshold: 0.8,
        };
        let tracker = Arc::new(UsageTracker::new(
            clock.clone(),
            store.clone(),
            Arc::new(FixedLimits::new(limits)),
        ));
        let sink = Arc::new(RecordingSink::new());
        let api = Arc::new(api);
        let controller = SessionController::new(
            api.clone(),
            tracker.clone(),
            store.clone(),
            sink.clone(),
            clock,
            SessionConfig {
                poll_interval: Duration::from_millis(5),
                max_polls: 10,
            },
        );
        Fixture {
            controller,
            api,
            store,
            sink,
            tracker,
        }
    }

    #[tokio::test]
    async fn test_successful_session_charges_and_records() {
        let f = fixture(FakeApi::new(vec!["waiting", "processing", "success"]), 10);
        let token = CancellationToken::new();

        let result = f
            .controller
            .generate(&JobRequest::new("a quiet harbor at dawn"), |_| {}, &token)
            .await
            .unwrap();

        assert!(matches!(result.outcome, JobOutcome::Succeeded(_)));
        assert_eq!(result.job_id, "task-77");

        // Charged exactly once, on success
        let usage = f.tracker.usage(ResourceClass::Generation).await;
        assert_eq!(usage.daily.count, 1);
        assert_eq!(usage.monthly.count, 1);

        // And recorded in history
        let history = GenerationHistory::load(f.store.as_ref()).await;
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].job_id, "task-77");
        assert!(!f.controller.is_in_progress());
    }

    #[tokio::test]
    async fn test_quota_exhausted_rejects_before_submission() {
        let api = FakeApi::new(vec!["success"]);
        let f = fixture(api, 1);
        let token = CancellationToken::new();

        f.controller
            .generate(&JobRequest::new("first"), |_| {}, &token)
            .await
            .unwrap();

        let err = f
            .controller
            .generate(&JobRequest::new("second"), |_| {}, &token)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::QuotaExceeded {
                class: ResourceClass::Generation,
                scope: WindowScope::Daily,
            }
        ));
        // The second request never reached the service
        assert_eq!(f.api.submits.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.sink
                .usage_notices()
                .iter()
                .filter(|n| matches!(n, UsageNotice::LimitReached { .. }))
                .count(),
            1
        );
        let usage = f.tracker.usage(ResourceClass::Generation).await;
        assert_eq!(usage.daily.count, 1);
    }

    #[tokio::test]
    async fn test_near_limit_warning_is_emitted_but_not_blocking() {
        // Limit 5, threshold 0.8: the session starting at count 4 warns
        let f = fixture(FakeApi::new(vec!["success"]), 5);
        let token = CancellationToken::new();

        for _ in 0..4 {
            f.tracker.track(ResourceClass::Generation).await;
        }

        let result = f
            .controller
            .generate(&JobRequest::new("prompt"), |_| {}, &token)
            .await
            .unwrap();

        assert!(matches!(result.outcome, JobOutcome::Succeeded(_)));
        assert!(f
            .sink
            .usage_notices()
            .iter()
            .any(|n| matches!(n, UsageNotice::NearLimit { remaining_today: 1, .. })));
    }

    #[tokio::test]
    async fn test_cancelled_session_charges_nothing() {
        let f = fixture(FakeApi::new(vec!["processing"]), 10);
        let token = CancellationToken::new();
        let handle = token.clone();

        let result = f
            .controller
            .generate(
                &JobRequest::new("prompt"),
                move |p| {
                    if p.poll_count == 1 {
                        handle.cancel();
                    }
                },
                &token,
            )
            .await
            .unwrap();

        assert_eq!(result.outcome, JobOutcome::Cancelled);
        let usage = f.tracker.usage(ResourceClass::Generation).await;
        assert_eq!(usage.daily.count, 0);
        assert!(f
            .sink
            .job_notices()
            .iter()
            .any(|n| matches!(n, JobNotice::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_timeout_emits_notice_and_charges_nothing() {
        let f = fixture(FakeApi::new(vec!["processing"]), 10);
        let token = CancellationToken::new();

        let result = f
            .controller
            .generate(&JobRequest::new("prompt"), |_| {}, &token)
            .await
            .unwrap();

        assert_eq!(result.outcome, JobOutcome::TimedOut { polls: 10 });
        let usage = f.tracker.usage(ResourceClass::Generation).await;
        assert_eq!(usage.daily.count, 0);
        assert!(f
            .sink
            .job_notices()
            .iter()
            .any(|n| matches!(n, JobNotice::TimedOut { polls: 10, .. })));
    }

    #[tokio::test]
    async fn test_concurrent_session_is_rejected() {
        let api = FakeApi::slow(vec!["processing"], Duration::from_millis(50));
        let f = fixture(api, 10);
        let controller = Arc::new(f.controller);

        let first = {
            let controller = controller.clone();
            let token = CancellationToken::new();
            let stop = token.clone();
            tokio::spawn(async move {
                let result = controller
                    .generate(
                        &JobRequest::new("long job"),
                        move |p| {
                            if p.poll_count == 2 {
                                stop.cancel();
                            }
                        },
                        &token,
                    )
                    .await;
                result.unwrap().outcome
            })
        };

        // Give the first session time to take the flag
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(controller.is_in_progress());

        let token = CancellationToken::new();
        let err = controller
            .generate(&JobRequest::new("impatient"), |_| {}, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Busy));

        assert_eq!(first.await.unwrap(), JobOutcome::Cancelled);
        assert!(!controller.is_in_progress());
    }

    #[tokio::test]
    async fn test_poll_error_surfaces_and_flag_clears() {
        let f = fixture(FakeApi::new(vec!["garbled"]), 10);
        let token = CancellationToken::new();

        let err = f
            .controller
            .generate(&JobRequest::new("prompt"), |_| {}, &token)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Poll(PollError::UnrecognizedState(_))
        ));
        assert!(!f.controller.is_in_progress());
        // Nothing charged on a poll failure
        let usage = f.tracker.usage(ResourceClass::Generation).await;
        assert_eq!(usage.daily.count, 0);
    }
}
