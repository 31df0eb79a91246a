//! The relay task: sole owner of the session registry.
//!
//! # Data Flow
//! ```text
//! HTTP handlers ─┐
//!                ├─→ command queue → relay task → SessionRegistry
//! socket tasks ──┘                        │
//!                                         ├─→ oneshot replies to HTTP handlers
//!                                         └─→ outbound queues of socket tasks
//! ```
//!
//! # Design Decisions
//! - One task processes one event at a time to completion; no registry
//!   state is shared or locked
//! - Nothing in the task awaits I/O: waiting callers hold an open oneshot
//! - Shutdown disposes every session before the task exits

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::relay::error::RelayError;
use crate::relay::peer::{BindingId, SocketHandle};
use crate::relay::registry::{RegistryStats, SessionRegistry};
use crate::relay::sink::Reply;

type LiveRegistry = SessionRegistry<oneshot::Sender<Reply>, SocketHandle>;

enum Command {
    Submit {
        key: String,
        payload: Bytes,
        sink: oneshot::Sender<Reply>,
    },
    Bind {
        key: String,
        binding: BindingId,
        socket: SocketHandle,
    },
    Frame {
        key: String,
        binding: BindingId,
        frame: Vec<u8>,
    },
    Closed {
        key: String,
        binding: BindingId,
    },
    Release {
        key: String,
    },
    Stats {
        reply: oneshot::Sender<RegistryStats>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable entry point to the relay task, injected into the transports.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RelayHandle {
    /// Spawn the relay task with a fresh registry.
    pub fn spawn(config: SessionConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reap_every = Duration::from_secs(config.reap_interval_secs);
        let registry = SessionRegistry::new(config);
        let task = tokio::spawn(run(registry, rx, reap_every));
        (Self { tx }, task)
    }

    /// Relay one HTTP request body for `key` and wait for its outcome.
    pub async fn call(&self, key: String, payload: Bytes) -> Reply {
        let (sink, reply) = oneshot::channel();
        if self.tx.send(Command::Submit { key, payload, sink }).is_err() {
            return Err(RelayError::ShuttingDown);
        }
        // A dropped sender means the task went away mid-call.
        reply.await.unwrap_or(Err(RelayError::ShuttingDown))
    }

    /// Offer the socket accepted as `binding` for `key`.
    pub fn bind(&self, key: String, binding: BindingId, socket: SocketHandle) {
        self.send(Command::Bind { key, binding, socket });
    }

    /// Forward a frame read from the socket accepted as `binding`.
    pub fn frame(&self, key: String, binding: BindingId, frame: Vec<u8>) {
        self.send(Command::Frame { key, binding, frame });
    }

    /// Report that the socket accepted as `binding` closed or errored.
    pub fn closed(&self, key: String, binding: BindingId) {
        self.send(Command::Closed { key, binding });
    }

    /// Tear down `key`'s session, whatever its state.
    pub fn release(&self, key: String) {
        self.send(Command::Release { key });
    }

    /// Snapshot of registry counters, `None` once the relay has stopped.
    pub async fn stats(&self) -> Option<RegistryStats> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Stats { reply }).ok()?;
        rx.await.ok()
    }

    /// Dispose every session and stop the relay task.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::debug!("Relay stopped, dropping event");
        }
    }
}

async fn run(
    mut registry: LiveRegistry,
    mut commands: mpsc::UnboundedReceiver<Command>,
    reap_every: Duration,
) {
    let mut reap = tokio::time::interval(reap_every);
    reap.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!("Relay task started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    if let Some(done) = handle(&mut registry, command) {
                        registry.dispose_all();
                        let _ = done.send(());
                        break;
                    }
                }
                None => {
                    registry.dispose_all();
                    break;
                }
            },
            _ = reap.tick() => {
                let reaped = registry.reap_abandoned();
                if reaped > 0 {
                    tracing::debug!(reaped, "Reaped abandoned sessions");
                }
            }
        }
        metrics::record_sessions(&registry.stats());
    }

    metrics::record_sessions(&registry.stats());
    tracing::debug!("Relay task stopped");
}

/// Apply one event. Returns the completion channel if it was a shutdown.
fn handle(registry: &mut LiveRegistry, command: Command) -> Option<oneshot::Sender<()>> {
    match command {
        Command::Submit { key, payload, sink } => registry.submit(&key, payload, sink),
        Command::Bind { key, binding, socket } => {
            registry.bind(&key, binding, socket);
        }
        Command::Frame { key, binding, frame } => {
            registry.on_frame(&key, binding, &frame);
        }
        Command::Closed { key, binding } => {
            registry.release_binding(&key, binding);
        }
        Command::Release { key } => {
            registry.release(&key);
        }
        Command::Stats { reply } => {
            let _ = reply.send(registry.stats());
        }
        Command::Shutdown { done } => return Some(done),
    }
    None
}
