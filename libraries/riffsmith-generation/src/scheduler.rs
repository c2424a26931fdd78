//! Background preset generation
//!
//! ## Architecture
//!
//! ```text
//! Control Thread                Supervisor Thread              Workers
//!       │                              │                          │
//!       │  submit(description)         │                          │
//!       │── queue + Submitted ────────>│ dequeue (cap permitting) │
//!       │                              │── spawn ────────────────>│ client.generate()
//!       │                              │                          │ (blocking)
//!       │                              │<──────────── Finished ───│
//!       │  poll_messages()             │ Generated / retry /      │
//!       │<──── message queue ──────────│ Failed                   │
//! ```
//!
//! The supervisor is the only producer on the message queue; workers report
//! back through the event channel. A failed attempt sleeps its backoff on the
//! worker thread before going back to the end of the queue, so the
//! concurrency cap counts it while it waits.

use crate::client::PresetClient;
use crate::config::SchedulerConfig;
use crate::error::{GenerationError, Result};
use crate::message::GenerationMessage;
use crate::prompts;
use crate::queue::{message_queue, Consumer, Producer};
use crate::request::{GenerationRequest, RequestId};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use riffsmith_core::PresetData;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

enum SchedulerEvent {
    /// New work in the request queue
    Submitted,
    /// Message from the control thread to forward in order
    Post(GenerationMessage),
    Finished(WorkerOutcome),
    Shutdown,
}

struct WorkerOutcome {
    request: GenerationRequest,
    result: Result<PresetData>,
    elapsed: Duration,
}

/// State shared by the control side and the supervisor
#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<GenerationRequest>>,
    /// Requests held by a worker; a cancel for anything else is not stored
    in_flight: Mutex<HashSet<RequestId>>,
    /// Running requests whose result must be dropped
    cancelled: Mutex<HashSet<RequestId>>,
    active: AtomicUsize,
    shutdown: AtomicBool,
}

// Lock order: queue, in_flight, cancelled
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn push_request(&self, request: GenerationRequest) {
        lock(&self.queue).push_back(request);
    }

    /// Pop the next request and mark it in flight in one step
    fn start_next(&self) -> Option<GenerationRequest> {
        let mut queue = lock(&self.queue);
        let request = queue.pop_front()?;
        lock(&self.in_flight).insert(request.id);
        Some(request)
    }

    /// Clear the in-flight mark of a finished attempt
    ///
    /// Returns whether the request was cancelled while running. A retry
    /// goes back on the queue under the same lock so a cancel always finds
    /// the request in one place or the other.
    fn settle(&self, request: &GenerationRequest, retry: bool) -> bool {
        let mut queue = lock(&self.queue);
        lock(&self.in_flight).remove(&request.id);
        let cancelled = lock(&self.cancelled).remove(&request.id);
        if retry && !cancelled {
            queue.push_back(request.clone());
        }
        cancelled
    }

    /// Drop a queued request or flag a running one
    fn cancel(&self, id: RequestId) -> Cancellation {
        let mut queue = lock(&self.queue);
        let before = queue.len();
        queue.retain(|request| request.id != id);
        if queue.len() < before {
            return Cancellation::Dequeued;
        }

        if lock(&self.in_flight).contains(&id) {
            lock(&self.cancelled).insert(id);
            Cancellation::Flagged
        } else {
            Cancellation::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cancellation {
    Dequeued,
    Flagged,
    Unknown,
}

struct SupervisorThread {
    thread: JoinHandle<()>,
    /// Disconnects when the supervisor returns
    done: Receiver<()>,
}

/// Queues generation requests and runs them on background threads
///
/// Results arrive as [`GenerationMessage`]s on the thread that owns the
/// scheduler, via [`poll_messages`](Self::poll_messages).
pub struct GenerationScheduler {
    shared: Arc<Shared>,
    events: Sender<SchedulerEvent>,
    messages: Consumer<GenerationMessage>,
    supervisor: Option<SupervisorThread>,
    next_id: AtomicU64,
    config: SchedulerConfig,
}

impl GenerationScheduler {
    /// Validate `config` and start the supervisor thread
    pub fn new(client: impl PresetClient + 'static, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared::default());
        let (events_tx, events_rx) = unbounded();
        let (producer, consumer) = message_queue();
        let (done_tx, done_rx) = bounded::<()>(0);

        let supervisor = Supervisor {
            shared: Arc::clone(&shared),
            client: Arc::new(client),
            config: config.clone(),
            events: events_rx,
            worker_events: events_tx.clone(),
            messages: producer,
        };

        let thread = thread::Builder::new()
            .name("preset-scheduler".to_string())
            .spawn(move || {
                supervisor.run();
                drop(done_tx);
            })?;

        info!(
            "Generation scheduler started (max concurrent: {}, max retries: {})",
            config.max_concurrent_requests, config.max_retries
        );

        Ok(Self {
            shared,
            events: events_tx,
            messages: consumer,
            supervisor: Some(SupervisorThread {
                thread,
                done: done_rx,
            }),
            next_id: AtomicU64::new(1),
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Queue a generation
    ///
    /// Returns `None` for a blank description.
    pub fn submit(&self, description: &str) -> Option<RequestId> {
        self.enqueue(description, None)
    }

    /// Queue a generation under a caller-chosen id
    ///
    /// Ids handed out later by [`submit`](Self::submit) start above `id`.
    pub fn submit_with_id(&self, description: &str, id: RequestId) -> Option<RequestId> {
        self.enqueue(description, Some(id))
    }

    fn enqueue(&self, description: &str, id: Option<RequestId>) -> Option<RequestId> {
        let description = description.trim();
        if description.is_empty() {
            return None;
        }

        let id = match id {
            Some(id) => {
                self.next_id
                    .fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
                id
            }
            None => self.next_request_id(),
        };
        let request = GenerationRequest::new(id, description);
        debug!("Request {} (\"{}\"): Queued", id, request.summary());
        self.shared.push_request(request);
        self.notify(SchedulerEvent::Submitted);
        Some(id)
    }

    /// Queue `count` randomized variations of `base`
    pub fn generate_variations(&self, base: &str, count: usize) -> Vec<RequestId> {
        let base = base.trim();
        if base.is_empty() || count == 0 {
            return Vec::new();
        }

        let requests: Vec<GenerationRequest> =
            prompts::variation_prompts(base, count, &mut rand::thread_rng())
                .into_iter()
                .map(|prompt| {
                    GenerationRequest::new(self.next_request_id(), prompt).variation_of(base)
                })
                .collect();
        let ids = requests.iter().map(|request| request.id).collect();

        lock(&self.shared.queue).extend(requests);
        debug!("Queued {} variations of \"{}\"", count, base);

        self.notify(SchedulerEvent::Post(GenerationMessage::status(
            format!("Generating {count} variations..."),
            Some(0.0),
        )));
        self.notify(SchedulerEvent::Submitted);
        ids
    }

    /// Queue one of the built-in prompts
    pub fn generate_surprise_me(&self) -> Option<RequestId> {
        self.submit(prompts::surprise_prompt(&mut rand::thread_rng()))
    }

    /// Cancel a request
    ///
    /// A queued request is removed from the queue. A request already
    /// running finishes, but its result is discarded. Ids that are neither
    /// queued nor running are ignored, so the id can be submitted again.
    pub fn cancel_request(&self, id: RequestId) {
        match self.shared.cancel(id) {
            Cancellation::Dequeued => debug!("Request {}: Cancelled", id),
            Cancellation::Flagged => debug!("Request {}: Cancel requested while running", id),
            Cancellation::Unknown => {
                debug!("Request {}: Not queued or running, cancel ignored", id);
            }
        }
    }

    /// Cancel every queued request
    pub fn cancel_all_requests(&self) {
        let count = {
            let mut queue = lock(&self.shared.queue);
            let count = queue.len();
            queue.clear();
            count
        };

        info!("Cancelled {} queued requests", count);
        self.notify(SchedulerEvent::Post(GenerationMessage::status(
            "Cancelled all requests",
            Some(0.0),
        )));
    }

    /// Requests waiting for a worker, including retries in line
    pub fn queue_size(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    /// Requests currently held by a worker
    pub fn active_request_count(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn is_generating(&self) -> bool {
        self.active_request_count() > 0
    }

    /// Hand every pending message to `handler`, oldest first
    ///
    /// Returns how many were delivered.
    pub fn poll_messages(&mut self, mut handler: impl FnMut(GenerationMessage)) -> usize {
        let mut delivered = 0;
        for message in self.messages.drain() {
            handler(message);
            delivered += 1;
        }
        delivered
    }

    /// Pop the oldest pending message
    pub fn try_recv_message(&mut self) -> Option<GenerationMessage> {
        self.messages.try_pop()
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Stop the supervisor and drop whatever is still queued
    ///
    /// Waits up to `join_timeout` for the supervisor. Workers that are still
    /// generating are left to finish on their own; their results go nowhere.
    pub fn shutdown(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            return;
        };

        self.shared.shutdown.store(true, Ordering::Release);
        let dropped = {
            let mut queue = lock(&self.shared.queue);
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        if dropped > 0 {
            debug!("Dropped {} queued requests on shutdown", dropped);
        }
        self.notify(SchedulerEvent::Shutdown);

        match supervisor.done.recv_timeout(self.config.join_timeout()) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Generation supervisor did not exit within {:?}, abandoning it",
                    self.config.join_timeout()
                );
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if supervisor.thread.join().is_err() {
                    error!("Generation supervisor panicked");
                } else {
                    info!("Generation scheduler stopped");
                }
            }
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn notify(&self, event: SchedulerEvent) {
        if self.events.send(event).is_err() {
            warn!("Generation supervisor is gone, event dropped");
        }
    }
}

impl Drop for GenerationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for GenerationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationScheduler")
            .field("queue_size", &self.queue_size())
            .field("active", &self.active_request_count())
            .field("running", &self.supervisor.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Supervisor {
    shared: Arc<Shared>,
    client: Arc<dyn PresetClient>,
    config: SchedulerConfig,
    events: Receiver<SchedulerEvent>,
    /// Cloned into every worker
    worker_events: Sender<SchedulerEvent>,
    messages: Producer<GenerationMessage>,
}

impl Supervisor {
    fn run(mut self) {
        debug!("Generation supervisor thread started");

        loop {
            if self.shared.shutdown.load(Ordering::Acquire) {
                break;
            }

            self.dispatch_pending();

            match self.events.recv_timeout(self.config.poll_interval()) {
                Ok(SchedulerEvent::Submitted) | Err(RecvTimeoutError::Timeout) => {}
                Ok(SchedulerEvent::Post(message)) => self.messages.push(message),
                Ok(SchedulerEvent::Finished(outcome)) => self.finish(outcome),
                Ok(SchedulerEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!("Generation supervisor thread exiting");
    }

    /// Start queued requests until the cap is reached
    fn dispatch_pending(&mut self) {
        while self.shared.active.load(Ordering::Acquire) < self.config.max_concurrent_requests {
            let Some(request) = self.shared.start_next() else {
                break;
            };

            if request.is_first_attempt() {
                self.messages
                    .push(GenerationMessage::started(request.id, &request.description));
            }
            self.spawn_worker(request);
        }
    }

    fn spawn_worker(&mut self, request: GenerationRequest) {
        debug!(
            "Request {} (\"{}\"): Processing (attempt {})",
            request.id,
            request.summary(),
            request.retry_count + 1
        );

        let id = request.id;
        let description = request.description.clone();
        let client = Arc::clone(&self.client);
        let events = self.worker_events.clone();
        let policy = AttemptPolicy::from_config(&self.config);

        self.shared.active.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("preset-worker-{}", id.0))
            .spawn(move || {
                let outcome = run_attempt(client.as_ref(), request, policy);
                if events.send(SchedulerEvent::Finished(outcome)).is_err() {
                    debug!("Request {}: Scheduler stopped, result dropped", id);
                }
            });

        if let Err(e) = spawned {
            self.shared.active.fetch_sub(1, Ordering::AcqRel);
            lock(&self.shared.in_flight).remove(&id);
            lock(&self.shared.cancelled).remove(&id);
            let error = GenerationError::from(e);
            error!("Request {}: {}", id, error);
            self.messages
                .push(GenerationMessage::failed(id, &description, error.to_string()));
        }
    }

    fn finish(&mut self, outcome: WorkerOutcome) {
        self.shared.active.fetch_sub(1, Ordering::AcqRel);
        let WorkerOutcome {
            mut request,
            result,
            elapsed,
        } = outcome;

        let retry = result.is_err() && request.retry_count < self.config.max_retries;
        if retry {
            request.retry_count += 1;
        }
        if self.shared.settle(&request, retry) {
            debug!(
                "Request {} (\"{}\"): Cancelled while running, result discarded",
                request.id,
                request.summary()
            );
            return;
        }

        let generation_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(preset) => {
                info!(
                    "Request {} (\"{}\"): Completed in {}ms",
                    request.id,
                    request.summary(),
                    generation_ms
                );
                self.messages.push(GenerationMessage::generated(
                    request.id,
                    &request.description,
                    preset,
                    generation_ms,
                ));
            }
            Err(e) if retry => {
                let attempts = self.config.max_retries + 1;
                warn!(
                    "Request {} (\"{}\"): {}, retrying (attempt {} of {})",
                    request.id,
                    request.summary(),
                    e,
                    request.retry_count + 1,
                    attempts
                );
                self.messages.push(GenerationMessage::status(
                    format!(
                        "Retrying \"{}\" (attempt {} of {})",
                        request.summary(),
                        request.retry_count + 1,
                        attempts
                    ),
                    None,
                ));
            }
            Err(e) => {
                let attempts = self.config.max_retries + 1;
                warn!(
                    "Request {} (\"{}\"): Failed after {} attempts: {}",
                    request.id,
                    request.summary(),
                    attempts,
                    e
                );
                self.messages.push(GenerationMessage::failed(
                    request.id,
                    &request.description,
                    format!("Failed to generate preset after {attempts} attempts: {e}"),
                ));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AttemptPolicy {
    max_retries: u32,
    retry_backoff: Duration,
    request_timeout: Duration,
}

impl AttemptPolicy {
    fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// One attempt on a worker thread, including the backoff before a retry
fn run_attempt(
    client: &dyn PresetClient,
    request: GenerationRequest,
    policy: AttemptPolicy,
) -> WorkerOutcome {
    let start = Instant::now();
    let result = client.generate_with_timeout(&request.description, policy.request_timeout);
    let elapsed = start.elapsed();

    let result = result.and_then(|preset| {
        if elapsed > policy.request_timeout {
            return Err(GenerationError::Timeout(policy.request_timeout));
        }
        accept_preset(preset, &request.description)
    });

    if result.is_err() && request.retry_count < policy.max_retries {
        thread::sleep(policy.retry_backoff * (request.retry_count + 1));
    }

    WorkerOutcome {
        request,
        result,
        elapsed,
    }
}

/// Clamp into range and reject presets the chain cannot use
fn accept_preset(mut preset: PresetData, description: &str) -> Result<PresetData> {
    if preset.name.trim().is_empty() {
        preset.name = description.to_string();
    }
    preset.clamp_to_valid_ranges();
    preset.validate()?;
    Ok(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riffsmith_core::{DriveParams, EffectBlock};

    fn drive_preset(name: &str) -> PresetData {
        PresetData::new(name).with_block(EffectBlock::Drive(DriveParams::default()))
    }

    fn policy() -> AttemptPolicy {
        AttemptPolicy {
            max_retries: 0,
            retry_backoff: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn nameless_preset_takes_the_description() {
        let preset = accept_preset(drive_preset(""), "glassy clean").unwrap();
        assert_eq!(preset.name, "glassy clean");
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let preset = PresetData::new("hot").with_block(EffectBlock::Drive(DriveParams {
            drive: 7.0,
            ..DriveParams::default()
        }));
        let accepted = accept_preset(preset, "hot").unwrap();
        match &accepted.chain[0] {
            EffectBlock::Drive(p) => assert!(p.drive <= 1.0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_preset_is_a_failed_attempt() {
        let client = |_: &str| -> Result<PresetData> { Ok(PresetData::new("nothing")) };
        let outcome = run_attempt(&client, GenerationRequest::new(RequestId(1), "x"), policy());
        assert!(matches!(
            outcome.result,
            Err(GenerationError::InvalidPreset(_))
        ));
    }

    #[test]
    fn slow_answer_counts_as_timeout() {
        let client = |name: &str| -> Result<PresetData> {
            thread::sleep(Duration::from_millis(20));
            Ok(drive_preset(name))
        };
        let policy = AttemptPolicy {
            request_timeout: Duration::from_millis(1),
            ..policy()
        };
        let outcome = run_attempt(&client, GenerationRequest::new(RequestId(2), "slow"), policy);
        assert!(matches!(outcome.result, Err(GenerationError::Timeout(_))));
    }

    #[test]
    fn attempt_hands_the_deadline_to_the_client() {
        struct DeadlineClient(Mutex<Option<Duration>>);

        impl PresetClient for DeadlineClient {
            fn generate(&self, description: &str) -> Result<PresetData> {
                Ok(drive_preset(description))
            }

            fn generate_with_timeout(
                &self,
                description: &str,
                timeout: Duration,
            ) -> Result<PresetData> {
                *lock(&self.0) = Some(timeout);
                self.generate(description)
            }
        }

        let client = DeadlineClient(Mutex::new(None));
        let policy = AttemptPolicy {
            request_timeout: Duration::from_millis(750),
            ..policy()
        };
        let outcome = run_attempt(&client, GenerationRequest::new(RequestId(3), "tight"), policy);
        assert!(outcome.result.is_ok());
        assert_eq!(*lock(&client.0), Some(Duration::from_millis(750)));
    }

    #[test]
    fn cancel_of_unknown_id_leaves_no_trace() {
        let client = |name: &str| -> Result<PresetData> { Ok(drive_preset(name)) };
        let scheduler = GenerationScheduler::new(client, SchedulerConfig::default()).unwrap();
        for id in 1..=100 {
            scheduler.cancel_request(RequestId(id));
        }
        assert!(lock(&scheduler.shared.cancelled).is_empty());
        assert!(lock(&scheduler.shared.in_flight).is_empty());
    }

    #[test]
    fn cancel_removes_a_queued_request() {
        let shared = Shared::default();
        shared.push_request(GenerationRequest::new(RequestId(1), "one"));
        shared.push_request(GenerationRequest::new(RequestId(2), "two"));

        assert_eq!(shared.cancel(RequestId(2)), Cancellation::Dequeued);
        assert_eq!(lock(&shared.queue).len(), 1);
        assert!(lock(&shared.cancelled).is_empty());

        let running = shared.start_next().unwrap();
        assert_eq!(shared.cancel(running.id), Cancellation::Flagged);
        assert!(shared.settle(&running, false));
        assert!(lock(&shared.cancelled).is_empty());
        assert!(lock(&shared.in_flight).is_empty());
    }

    #[test]
    fn blank_submissions_are_ignored() {
        let client = |name: &str| -> Result<PresetData> { Ok(drive_preset(name)) };
        let scheduler = GenerationScheduler::new(client, SchedulerConfig::default()).unwrap();
        assert_eq!(scheduler.submit("   "), None);
        assert!(scheduler.generate_variations("", 3).is_empty());
        assert_eq!(scheduler.queue_size(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let client = |name: &str| -> Result<PresetData> { Ok(drive_preset(name)) };
        let config = SchedulerConfig::default().with_max_concurrent_requests(0);
        assert!(GenerationScheduler::new(client, config).is_err());
    }
}
