//! Server-pushed events.
//!
//! A [`PollScheduler`] owns a set of [`PollJob`]s. Each job runs on its own
//! thread: on every tick it asks the router to run the job's poll method
//! with the job's static parameters and hands the resulting
//! [`PollMessage`] to a [`PushSink`]. The [`EventBroadcaster`] sink fans
//! messages out to subscribers of the event.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::dispatch::{PollMessage, Router};

pub(crate) const POLL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::poll");

const SHUTDOWN_CHECK: Duration = Duration::from_millis(25);

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every period, first tick one period after start.
    Every(Duration),
    /// Once, after a delay.
    Once(Duration),
}

/// A poll method scheduled with static parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PollJob {
    action: String,
    method: String,
    cadence: Cadence,
    params: Map<String, Value>,
    context: RequestContext,
}

impl PollJob {
    /// Schedules `action.method` at `cadence`.
    pub fn new(action: impl Into<String>, method: impl Into<String>, cadence: Cadence) -> Self {
        Self {
            action: action.into(),
            method: method.into(),
            cadence,
            params: Map::new(),
            context: RequestContext::default(),
        }
    }

    /// Adds a static parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Sets the context the method is bound against.
    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Firing cadence.
    pub const fn cadence(&self) -> Cadence {
        self.cadence
    }
}

/// Receives poll messages for delivery.
#[cfg_attr(test, mockall::automock)]
pub trait PushSink: Send + Sync {
    /// Delivers `message`, returning how many recipients took it.
    fn push(&self, message: &PollMessage) -> usize;
}

/// Errors raised by the scheduler and broadcaster.
#[derive(Debug, Error)]
pub enum PollError {
    /// A job cannot fire at a zero period.
    #[error("poll job '{action}.{method}' has a zero period")]
    ZeroPeriod {
        /// Action name.
        action: String,
        /// Method name.
        method: String,
    },
    /// A job thread could not be started.
    #[error("failed to spawn poll thread: {source}")]
    Spawn {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A job thread panicked.
    #[error("poll thread panicked")]
    ThreadPanic,
    /// The subscriber table lock was poisoned.
    #[error("subscriber table lock poisoned")]
    Poisoned,
}

struct Subscriber {
    event: String,
    sender: mpsc::Sender<PollMessage>,
}

/// Fans poll messages out to per-event subscribers.
///
/// Subscribers whose receiver has gone away are dropped on the next push.
#[derive(Default)]
pub struct EventBroadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EventBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBroadcaster {
    /// Creates a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `event`.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Poisoned`] if the subscriber table is poisoned.
    pub fn subscribe(&self, event: impl Into<String>) -> Result<mpsc::Receiver<PollMessage>, PollError> {
        let (sender, receiver) = mpsc::channel();
        let event = event.into();
        debug!(target: POLL_TARGET, event = %event, "subscriber added");
        self.subscribers
            .lock()
            .map_err(|_| PollError::Poisoned)?
            .push(Subscriber { event, sender });
        Ok(receiver)
    }

    /// Number of registered subscribers, live or not.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map_or(0, |subscribers| subscribers.len())
    }
}

impl PushSink for EventBroadcaster {
    fn push(&self, message: &PollMessage) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            warn!(target: POLL_TARGET, "subscriber table poisoned; message dropped");
            return 0;
        };
        let mut delivered = 0_usize;
        subscribers.retain(|subscriber| {
            if subscriber.event != message.name() {
                return true;
            }
            let sent = subscriber.sender.send(message.clone()).is_ok();
            if sent {
                delivered = delivered.saturating_add(1);
            }
            sent
        });
        delivered
    }
}

/// Runs poll jobs on background threads.
pub struct PollScheduler {
    router: Router,
    sink: Arc<dyn PushSink>,
    jobs: Vec<PollJob>,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PollScheduler")
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl PollScheduler {
    /// Creates a scheduler with no jobs.
    pub fn new(router: Router, sink: Arc<dyn PushSink>) -> Self {
        Self {
            router,
            sink,
            jobs: Vec::new(),
        }
    }

    /// Adds a job.
    pub fn add(&mut self, job: PollJob) {
        self.jobs.push(job);
    }

    /// Scheduled jobs.
    pub fn jobs(&self) -> &[PollJob] {
        &self.jobs
    }

    /// Fires `job` once on the calling thread.
    pub fn tick(&self, job: &PollJob) -> PollMessage {
        fire(&self.router, self.sink.as_ref(), job)
    }

    /// Starts one thread per job.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::ZeroPeriod`] for a job with a zero period and
    /// [`PollError::Spawn`] if a thread cannot be started; threads already
    /// started are stopped first.
    pub fn start(self) -> Result<SchedulerHandle, PollError> {
        if let Some(job) = self
            .jobs
            .iter()
            .find(|job| job.cadence == Cadence::Every(Duration::ZERO))
        {
            return Err(PollError::ZeroPeriod {
                action: job.action.clone(),
                method: job.method.clone(),
            });
        }

        let mut handle = SchedulerHandle {
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Vec::with_capacity(self.jobs.len()),
        };
        for job in self.jobs {
            let router = self.router.clone();
            let sink = Arc::clone(&self.sink);
            let shutdown = Arc::clone(&handle.shutdown);
            let name = format!("courier-poll-{}.{}", job.action, job.method);
            let spawned = thread::Builder::new()
                .name(name)
                .spawn(move || run_job(&router, sink.as_ref(), &job, &shutdown));
            match spawned {
                Ok(thread) => handle.threads.push(thread),
                Err(source) => {
                    handle.shutdown();
                    if let Err(error) = handle.join() {
                        warn!(target: POLL_TARGET, %error, "poll thread failed while rolling back");
                    }
                    return Err(PollError::Spawn { source });
                }
            }
        }
        info!(
            target: POLL_TARGET,
            jobs = handle.threads.len(),
            "poll scheduler started"
        );
        Ok(handle)
    }
}

/// Handle to running poll threads.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Asks every job thread to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for every job thread to stop.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::ThreadPanic`] if any job thread panicked.
    pub fn join(mut self) -> Result<(), PollError> {
        let mut panicked = false;
        for thread in self.threads.drain(..) {
            panicked |= thread.join().is_err();
        }
        if panicked {
            return Err(PollError::ThreadPanic);
        }
        Ok(())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_job(router: &Router, sink: &dyn PushSink, job: &PollJob, shutdown: &AtomicBool) {
    let (delay, period) = match job.cadence {
        Cadence::Every(period) => (period, Some(period)),
        Cadence::Once(delay) => (delay, None),
    };
    let mut next = Instant::now() + delay;
    while sleep_until(next, shutdown) {
        fire(router, sink, job);
        let Some(period) = period else {
            break;
        };
        next = (next + period).max(Instant::now());
    }
    debug!(
        target: POLL_TARGET,
        action = %job.action,
        method = %job.method,
        "poll job stopped"
    );
}

/// Sleeps until `deadline`; returns false if shutdown was requested first.
fn sleep_until(deadline: Instant, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SHUTDOWN_CHECK));
    }
}

fn fire(router: &Router, sink: &dyn PushSink, job: &PollJob) -> PollMessage {
    let message = router.poll(&job.action, &job.method, &job.params, &job.context);
    let delivered = sink.push(&message);
    debug!(
        target: POLL_TARGET,
        event = message.name(),
        delivered,
        failed = message.is_exception(),
        "poll tick"
    );
    message
}
