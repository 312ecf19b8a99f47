//! Connection state machine for the per-job push channel.
//!
//! [`ChannelClient`] owns at most one live transport at a time. Each
//! `connect` spawns a channel task that runs the connect → read →
//! backoff loop until the channel closes cleanly, the reconnect ceiling
//! is hit, or the task is cancelled by `disconnect` / a superseding
//! `connect`. State transitions are published on a watch channel;
//! decoded traffic and lifecycle events flow to a single consumer over
//! an unbounded mpsc.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use lumen_core::messages::parse_event;
use lumen_core::types::JobId;

use crate::backoff::ReconnectConfig;
use crate::events::ChannelEvent;
use crate::transport::{
    Transport, TransportConnection, TransportEvent, ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};

/// Connection lifecycle state of a [`ChannelClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and nothing scheduled.
    Idle,
    /// A transport open is in flight.
    Connecting,
    /// The channel is live and reading frames.
    Open,
    /// The transport closed; deciding whether to reconnect.
    Closing,
    /// A reconnect is scheduled for `deadline`.
    Backoff { attempt: u32, deadline: Instant },
    /// The client ignores `connect` calls until re-enabled.
    Disabled,
}

/// Channel client configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base channel URL, e.g. `ws://localhost:8000/api/v1`.
    pub base_url: String,
    /// Reconnection policy for unclean closes.
    pub reconnect: ReconnectConfig,
    /// Keep-alive ping cadence while the channel is open.
    pub ping_interval: Duration,
}

impl ChannelConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reconnect: ReconnectConfig::default(),
            ping_interval: Duration::from_secs(30),
        }
    }

    /// Channel endpoint for a job.
    fn endpoint_for_job(&self, job_id: &str) -> String {
        format!("{}/generate/{}", self.base_url.trim_end_matches('/'), job_id)
    }
}

/// Bookkeeping for the currently spawned channel task.
struct ActiveChannel {
    job_id: JobId,
    cancel: CancellationToken,
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

/// Push-channel client with automatic reconnection.
///
/// Create with [`ChannelClient::new`], which also returns the single
/// event receiver. At most one transport is live per client instance.
pub struct ChannelClient<T: Transport> {
    transport: Arc<T>,
    config: ChannelConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    active: Mutex<Option<ActiveChannel>>,
    enabled: AtomicBool,
    last_error: Arc<Mutex<Option<String>>>,
}

// Locks are only held for short, non-awaiting sections; a poisoned
// lock still holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T: Transport> ChannelClient<T> {
    /// Create a client and the receiving half of its event stream.
    pub fn new(transport: T, config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let client = Self {
            transport: Arc::new(transport),
            config,
            state_tx: Arc::new(state_tx),
            event_tx,
            active: Mutex::new(None),
            enabled: AtomicBool::new(true),
            last_error: Arc::new(Mutex::new(None)),
        };
        (client, event_rx)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Most recent connection error, cleared on a successful open and
    /// on `disconnect`.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Job id of the active channel, if any.
    pub fn job_id(&self) -> Option<JobId> {
        lock(&self.active).as_ref().map(|a| a.job_id.clone())
    }

    /// Open the channel for `job_id`.
    ///
    /// No-op when the client is disabled or `job_id` is empty. Any
    /// existing channel (same or different job) is superseded first:
    /// its task is cancelled and its transport clean-closed, with no
    /// reconnect scheduled for the old job.
    pub fn connect(&self, job_id: &str) {
        if !self.enabled.load(Ordering::SeqCst) {
            tracing::debug!(job_id, "Client disabled, ignoring connect");
            return;
        }
        if job_id.is_empty() {
            tracing::warn!("Ignoring connect with empty job id");
            return;
        }

        let mut active = lock(&self.active);
        if let Some(old) = active.take() {
            tracing::info!(
                old_job_id = %old.job_id,
                new_job_id = job_id,
                "Superseding existing channel",
            );
            old.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let task = ChannelTask {
            transport: Arc::clone(&self.transport),
            endpoint: self.config.endpoint_for_job(job_id),
            job_id: job_id.to_string(),
            reconnect: self.config.reconnect.clone(),
            ping_interval: self.config.ping_interval,
            state: Arc::clone(&self.state_tx),
            events: self.event_tx.clone(),
            last_error: Arc::clone(&self.last_error),
            cancel: cancel.clone(),
        };

        let handle = tokio::spawn(task.run());

        *active = Some(ActiveChannel {
            job_id: job_id.to_string(),
            cancel,
            task: handle,
        });
    }

    /// Close the channel and cancel any pending reconnect.
    ///
    /// Transitions to `Idle` synchronously and clears the stored error.
    /// Safe to call from any state; idempotent.
    pub fn disconnect(&self) {
        let mut active = lock(&self.active);
        if let Some(old) = active.take() {
            tracing::info!(job_id = %old.job_id, "Disconnecting channel");
            old.cancel.cancel();
        }
        *lock(&self.last_error) = None;
        self.state_tx.send_replace(ConnectionState::Idle);
    }

    /// Enable or disable the client. Disabling disconnects first and
    /// makes subsequent `connect` calls no-ops.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            if self.state() == ConnectionState::Disabled {
                self.state_tx.send_replace(ConnectionState::Idle);
            }
        } else {
            self.disconnect();
            self.state_tx.send_replace(ConnectionState::Disabled);
        }
    }
}

/// How a live connection ended.
enum CloseOutcome {
    /// Cancelled by `disconnect` or a superseding `connect`.
    Cancelled,
    /// Peer closed with the normal-closure code.
    Clean,
    /// Peer closed abnormally or the stream ended without a close.
    Unclean { code: u16, reason: String },
}

/// State owned by one spawned channel task.
struct ChannelTask<T: Transport> {
    transport: Arc<T>,
    endpoint: String,
    job_id: JobId,
    reconnect: ReconnectConfig,
    ping_interval: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    last_error: Arc<Mutex<Option<String>>>,
    cancel: CancellationToken,
}

impl<T: Transport> ChannelTask<T> {
    /// Connect → read → backoff loop. Returns when the channel closes
    /// cleanly, the reconnect ceiling is hit, or the task is cancelled.
    async fn run(self) {
        let mut attempt: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);

            let conn = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = self.transport.open(&self.endpoint) => match result {
                    Ok(conn) => Some(conn),
                    Err(e) => {
                        tracing::warn!(
                            job_id = %self.job_id,
                            error = %e,
                            "Channel open failed",
                        );
                        self.record_error(e.to_string());
                        let _ = self.events.send(ChannelEvent::TransportError {
                            message: e.to_string(),
                        });
                        None
                    }
                },
            };

            if let Some(mut conn) = conn {
                attempt = 0;
                *lock(&self.last_error) = None;
                self.set_state(ConnectionState::Open);
                tracing::info!(job_id = %self.job_id, "Channel open");
                let _ = self.events.send(ChannelEvent::Connected {
                    job_id: self.job_id.clone(),
                });

                let outcome = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => CloseOutcome::Cancelled,
                    outcome = self.read_frames(&mut conn) => outcome,
                };

                match outcome {
                    CloseOutcome::Cancelled => {
                        let _ = conn.close(NORMAL_CLOSURE, "client disconnect").await;
                        return;
                    }
                    CloseOutcome::Clean => {
                        self.set_state(ConnectionState::Closing);
                        tracing::info!(job_id = %self.job_id, "Channel closed cleanly");
                        let _ = self.events.send(ChannelEvent::Disconnected {
                            job_id: self.job_id.clone(),
                            clean: true,
                        });
                        self.set_state(ConnectionState::Idle);
                        return;
                    }
                    CloseOutcome::Unclean { code, reason } => {
                        self.set_state(ConnectionState::Closing);
                        tracing::warn!(
                            job_id = %self.job_id,
                            code,
                            reason = %reason,
                            "Channel closed uncleanly",
                        );
                        let _ = self.events.send(ChannelEvent::Disconnected {
                            job_id: self.job_id.clone(),
                            clean: false,
                        });
                    }
                }
            }

            if attempt >= self.reconnect.max_attempts {
                tracing::warn!(
                    job_id = %self.job_id,
                    attempts = attempt,
                    "Reconnect attempts exhausted",
                );
                self.record_error(format!(
                    "Connection lost after {attempt} reconnect attempts"
                ));
                let _ = self.events.send(ChannelEvent::ReconnectsExhausted {
                    job_id: self.job_id.clone(),
                    attempts: attempt,
                });
                self.set_state(ConnectionState::Idle);
                return;
            }

            let delay = self.reconnect.delay_for_attempt(attempt);
            let deadline = Instant::now() + delay;
            tracing::info!(
                job_id = %self.job_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect",
            );
            self.set_state(ConnectionState::Backoff { attempt, deadline });
            attempt += 1;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    /// Read frames until the connection ends, forwarding decoded
    /// events and sending keep-alive pings on a fixed cadence.
    ///
    /// Decode failures are logged and dropped; the channel stays open.
    async fn read_frames(&self, conn: &mut T::Conn) -> CloseOutcome {
        let mut next_ping = Instant::now() + self.ping_interval;

        loop {
            match tokio::time::timeout_at(next_ping, conn.next_event()).await {
                Err(_) => {
                    if let Err(e) = conn.send_text("ping".to_string()).await {
                        tracing::debug!(
                            job_id = %self.job_id,
                            error = %e,
                            "Keep-alive send failed",
                        );
                    }
                    next_ping = Instant::now() + self.ping_interval;
                }
                Ok(Some(TransportEvent::Text(text))) => match parse_event(&text) {
                    Ok(event) => {
                        tracing::debug!(job_id = %self.job_id, "Channel message");
                        let _ = self.events.send(ChannelEvent::Message(event));
                    }
                    Err(e) => {
                        tracing::warn!(
                            job_id = %self.job_id,
                            error = %e,
                            raw_message = %text,
                            "Failed to parse channel message",
                        );
                    }
                },
                Ok(Some(TransportEvent::Error(message))) => {
                    tracing::warn!(job_id = %self.job_id, error = %message, "Transport error");
                    self.record_error(message.clone());
                    let _ = self.events.send(ChannelEvent::TransportError { message });
                }
                Ok(Some(TransportEvent::Closed { code, reason })) => {
                    return if code == NORMAL_CLOSURE {
                        CloseOutcome::Clean
                    } else {
                        CloseOutcome::Unclean { code, reason }
                    };
                }
                Ok(None) => {
                    return CloseOutcome::Unclean {
                        code: ABNORMAL_CLOSURE,
                        reason: "connection lost".to_string(),
                    };
                }
            }
        }
    }

    /// Publish a state transition unless this task has been superseded.
    ///
    /// The cancellation check runs under the watch channel's lock, so a
    /// cancelled task can never overwrite the `Idle`/`Connecting` state
    /// written by `disconnect` or a newer `connect`.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if self.cancel.is_cancelled() {
                return false;
            }
            *state = next;
            true
        });
    }

    fn record_error(&self, message: String) {
        *lock(&self.last_error) = Some(message);
    }
}
