//! Auto-Execute Scheduler
//!
//! Debounces a declared action (autosave, auto-submit) behind field edits.
//! At most one trigger is pending per executor; a new edit cancels and
//! restarts it. Runs of one executor never overlap: a trigger that fires
//! while the previous run is still going waits for it to finish.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AutoExecuteConfig;
use crate::domain::aggregates::FieldResponse;
use crate::ports::inbound::UseCaseError;
use crate::ports::outbound::{ErrorReporter, RepositoryError};

// =============================================================================
// Debounce timer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("no async runtime to schedule on")]
    NoRuntime,
}

/// Cancellable single-shot timer. Dropping the handle cancels it.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, replacing any pending schedule.
    ///
    /// Once the delay elapses the task runs detached, so a later `cancel`
    /// only ever stops a trigger that has not fired yet.
    pub fn schedule<F>(&mut self, delay: Duration, task: F) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let runtime = Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;
        self.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        }));
        Ok(())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// Auto-executed actions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    UseCase(#[from] UseCaseError),
}

/// An action run with the current responses after edits settle
#[async_trait]
pub trait AutoAction: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, responses: Vec<FieldResponse>) -> Result<(), ActionError>;

    /// Whether completion of `run` should clear the loading flag. Actions
    /// that return before their work is visible keep the flag up for the
    /// configured minimum instead.
    fn reports_completion(&self) -> bool {
        true
    }
}

pub struct AutoExecutor {
    action: Arc<dyn AutoAction>,
    reporter: Arc<dyn ErrorReporter>,
    debounce: Duration,
    min_loading: Duration,
    timer: DebounceTimer,
    loading: Arc<watch::Sender<bool>>,
    generation: Arc<AtomicU64>,
    running: Arc<tokio::sync::Mutex<()>>,
}

impl AutoExecutor {
    pub fn new(
        action: Arc<dyn AutoAction>,
        reporter: Arc<dyn ErrorReporter>,
        config: &AutoExecuteConfig,
    ) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            action,
            reporter,
            debounce: config.debounce(),
            min_loading: config.min_loading(),
            timer: DebounceTimer::new(),
            loading: Arc::new(loading),
            generation: Arc::new(AtomicU64::new(0)),
            running: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Supersede any pending trigger with one carrying `responses`
    pub fn trigger(&mut self, responses: Vec<FieldResponse>) {
        self.loading.send_replace(true);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let action = Arc::clone(&self.action);
        let reporter = Arc::clone(&self.reporter);
        let loading = Arc::clone(&self.loading);
        let latest = Arc::clone(&self.generation);
        let running = Arc::clone(&self.running);
        let min_loading = self.min_loading;

        debug!(action = action.name(), generation, "Auto-execute scheduled");

        let scheduled = self.timer.schedule(self.debounce, async move {
            let reports_completion = action.reports_completion();
            let result = {
                let _running = running.lock().await;
                action.run(responses).await
            };
            if let Err(e) = result {
                warn!(action = action.name(), error = %e, "Auto-execute failed");
                reporter.report(&format!("{} failed: {}", action.name(), e));
            }
            if !reports_completion {
                tokio::time::sleep(min_loading).await;
            }
            if latest.load(Ordering::SeqCst) == generation {
                loading.send_replace(false);
            }
        });

        if let Err(e) = scheduled {
            warn!(action = self.action.name(), error = %e, "Auto-execute not scheduled");
            self.reporter
                .report(&format!("{} could not be scheduled: {}", self.action.name(), e));
            self.loading.send_replace(false);
        }
    }

    /// Abandon any pending trigger without firing it
    pub fn shutdown(&mut self) {
        self.timer.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.loading.send_replace(false);
    }
}

impl Drop for AutoExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::time::{sleep, Instant};

    struct Recording {
        runs: Mutex<Vec<Instant>>,
        finished: Mutex<Vec<Instant>>,
        duration: Duration,
        fail: bool,
        reports_completion: bool,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                runs: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
                duration: Duration::ZERO,
                fail: false,
                reports_completion: true,
            }
        }
    }

    #[async_trait]
    impl AutoAction for Recording {
        fn name(&self) -> &str {
            "autosave"
        }

        async fn run(&self, _responses: Vec<FieldResponse>) -> Result<(), ActionError> {
            self.runs.lock().push(Instant::now());
            if !self.duration.is_zero() {
                sleep(self.duration).await;
            }
            self.finished.lock().push(Instant::now());
            if self.fail {
                return Err(ActionError::Failed("offline".into()));
            }
            Ok(())
        }

        fn reports_completion(&self) -> bool {
            self.reports_completion
        }
    }

    #[derive(Default)]
    struct Alerts(Mutex<Vec<String>>);

    impl ErrorReporter for Alerts {
        fn report(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    fn executor(action: Arc<Recording>, alerts: Arc<Alerts>) -> AutoExecutor {
        AutoExecutor::new(action, alerts, &AutoExecuteConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_fire_once_after_last() {
        let action = Arc::new(Recording::new());
        let mut exec = executor(action.clone(), Arc::new(Alerts::default()));

        exec.trigger(vec![]);
        sleep(Duration::from_millis(200)).await;
        exec.trigger(vec![]);
        sleep(Duration::from_millis(200)).await;
        exec.trigger(vec![]);
        let last_edit = Instant::now();

        sleep(Duration::from_millis(999)).await;
        assert!(action.runs.lock().is_empty());

        sleep(Duration::from_millis(1000)).await;
        let runs = action.runs.lock().clone();
        assert_eq!(runs.len(), 1);
        let delay = runs[0] - last_edit;
        assert!(delay >= Duration::from_millis(1000) && delay < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_set_on_trigger_and_cleared_on_completion() {
        let action = Arc::new(Recording::new());
        let mut exec = executor(action, Arc::new(Alerts::default()));

        exec.trigger(vec![]);
        assert!(exec.loading());
        assert!(exec.is_pending());

        sleep(Duration::from_millis(1100)).await;
        assert!(!exec.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_held_for_minimum_without_completion_signal() {
        let action = Arc::new(Recording {
            reports_completion: false,
            ..Recording::new()
        });
        let mut exec = executor(action.clone(), Arc::new(Alerts::default()));
        let mut rx = exec.subscribe();

        exec.trigger(vec![]);
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(action.runs.lock().len(), 1);
        assert!(*rx.borrow_and_update());

        sleep(Duration::from_millis(600)).await;
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported() {
        let action = Arc::new(Recording {
            fail: true,
            ..Recording::new()
        });
        let alerts = Arc::new(Alerts::default());
        let mut exec = executor(action, alerts.clone());

        exec.trigger(vec![]);
        sleep(Duration::from_millis(1100)).await;

        let messages = alerts.0.lock().clone();
        assert_eq!(messages, vec!["autosave failed: offline".to_string()]);
        assert!(!exec.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_pending_trigger() {
        let action = Arc::new(Recording::new());
        let mut exec = executor(action.clone(), Arc::new(Alerts::default()));

        exec.trigger(vec![]);
        sleep(Duration::from_millis(500)).await;
        exec.shutdown();
        assert!(!exec.loading());

        sleep(Duration::from_millis(2000)).await;
        assert!(action.runs.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_timer_cancels_it() {
        let fired = Arc::new(Mutex::new(false));
        let flag = fired.clone();
        {
            let mut timer = DebounceTimer::new();
            timer
                .schedule(Duration::from_millis(100), async move {
                    *flag.lock() = true;
                })
                .unwrap();
        }
        sleep(Duration::from_millis(500)).await;
        assert!(!*fired.lock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_runs_are_serialized_and_keep_loading() {
        let action = Arc::new(Recording {
            duration: Duration::from_millis(1500),
            ..Recording::new()
        });
        let mut exec = executor(action.clone(), Arc::new(Alerts::default()));
        let start = Instant::now();

        // First run fires at 1000 and lasts until 2500
        exec.trigger(vec![]);
        sleep(Duration::from_millis(1200)).await;
        assert_eq!(action.runs.lock().len(), 1);

        // Second trigger fires at 2200 while the first run is still going
        exec.trigger(vec![]);
        sleep(Duration::from_millis(1400)).await;
        assert_eq!(action.finished.lock().len(), 1);
        assert!(exec.loading());

        sleep(Duration::from_millis(1500)).await;
        let runs = action.runs.lock().clone();
        let finished = action.finished.lock().clone();
        assert_eq!(runs.len(), 2);
        assert!(runs[1] >= finished[0]);
        assert!(finished[1] - start >= Duration::from_millis(4000));
        assert!(!exec.loading());
    }

    #[test]
    fn test_trigger_without_runtime_reports_instead_of_panicking() {
        let alerts = Arc::new(Alerts::default());
        let mut exec = executor(Arc::new(Recording::new()), alerts.clone());

        exec.trigger(vec![]);
        assert!(!exec.loading());
        assert!(!exec.is_pending());
        assert_eq!(
            alerts.0.lock().clone(),
            vec!["autosave could not be scheduled: no async runtime to schedule on".to_string()]
        );
    }
}
