//! Record forwarder
//!
//! One worker thread per peer, each fed by a bounded queue. The writer only
//! ever does a non-blocking enqueue; a slow or dead peer costs its own queue
//! space and nothing else.
//!
//! Policy for a record that cannot be delivered: retry up to `max_attempts`
//! with linear backoff, then drop it for that peer. A full queue drops the
//! record immediately. Drops are logged and counted. A peer that misses
//! records stays behind until it is repaired out of band; the originating
//! node's durability is unaffected.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::config::ReplicationConfig;
use crate::error::DriftError;
use crate::wal::LogRecord;
use super::PeerTransport;

/// Point-in-time forwarding counters, summed over all peers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    /// Records accepted into a peer queue
    pub enqueued: u64,

    /// Records a peer acknowledged
    pub delivered: u64,

    /// Records dropped because a peer queue was full
    pub dropped_full: u64,

    /// Records dropped after exhausting retries (or on shutdown)
    pub failed: u64,

    /// Records enqueued but not yet delivered or dropped
    pub pending: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped_full: AtomicU64,
    failed: AtomicU64,
    pending: AtomicU64,
}

/// Worker shared state
struct LinkContext {
    peer: String,
    transport: Arc<dyn PeerTransport>,
    settings: ReplicationConfig,
    counters: Arc<Counters>,
    stopped: Arc<AtomicBool>,
}

struct PeerLink {
    peer: String,
    tx: Option<Sender<LogRecord>>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeerLink {
    fn spawn(
        peer: String,
        transport: Arc<dyn PeerTransport>,
        settings: &ReplicationConfig,
        counters: Arc<Counters>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded(settings.queue_capacity);
        let stopped = Arc::new(AtomicBool::new(false));

        let ctx = LinkContext {
            peer: peer.clone(),
            transport,
            settings: settings.clone(),
            counters,
            stopped: Arc::clone(&stopped),
        };

        let handle = thread::Builder::new()
            .name(format!("forward-{}", peer))
            .spawn(move || run_link(ctx, rx))?;

        Ok(Self {
            peer,
            tx: Some(tx),
            stopped,
            handle: Some(handle),
        })
    }

    /// Stop the worker. Records still queued are dropped.
    fn stop(mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(peer = %self.peer, "forwarder worker panicked");
            }
        }
    }
}

fn run_link(ctx: LinkContext, rx: Receiver<LogRecord>) {
    tracing::debug!(peer = %ctx.peer, "forwarder started");

    for record in rx.iter() {
        if ctx.stopped.load(Ordering::SeqCst) {
            ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
        } else {
            deliver_with_retry(&ctx, &record);
        }
        ctx.counters.pending.fetch_sub(1, Ordering::SeqCst);
    }

    tracing::debug!(peer = %ctx.peer, "forwarder stopped");
}

fn deliver_with_retry(ctx: &LinkContext, record: &LogRecord) {
    let max_attempts = ctx.settings.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match ctx.transport.deliver(&ctx.peer, record) {
            Ok(()) => {
                ctx.counters.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(peer = %ctx.peer, seq = record.seq, "record delivered");
                return;
            }
            Err(DriftError::ReplicationRejected(reason)) => {
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(peer = %ctx.peer, seq = record.seq, %reason, "peer rejected record");
                return;
            }
            Err(e) if attempt < max_attempts && !ctx.stopped.load(Ordering::SeqCst) => {
                tracing::debug!(
                    peer = %ctx.peer,
                    seq = record.seq,
                    attempt,
                    error = %e,
                    "delivery failed, retrying"
                );
                thread::sleep(ctx.settings.retry_backoff() * attempt);
                attempt += 1;
            }
            Err(e) => {
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    peer = %ctx.peer,
                    seq = record.seq,
                    attempts = attempt,
                    error = %e,
                    "dropping record for peer"
                );
                return;
            }
        }
    }
}

/// Fans committed records out to a set of peers
pub struct Forwarder {
    transport: Arc<dyn PeerTransport>,
    settings: ReplicationConfig,
    links: Mutex<Vec<PeerLink>>,
    counters: Arc<Counters>,
}

impl Forwarder {
    pub fn new(
        transport: Arc<dyn PeerTransport>,
        settings: ReplicationConfig,
        peers: Vec<String>,
    ) -> Self {
        let forwarder = Self {
            transport,
            settings,
            links: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        };
        forwarder.set_peers(peers);
        forwarder
    }

    /// Queue `record` for every peer without blocking
    pub fn forward(&self, record: &LogRecord) {
        let links = self.links.lock();

        for link in links.iter() {
            let Some(tx) = link.tx.as_ref() else { continue };

            self.counters.pending.fetch_add(1, Ordering::SeqCst);
            match tx.try_send(record.clone()) {
                Ok(()) => {
                    self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                    self.counters.dropped_full.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(peer = %link.peer, seq = record.seq, "peer queue full, record dropped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.counters.pending.fetch_sub(1, Ordering::SeqCst);
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(peer = %link.peer, seq = record.seq, "peer worker gone, record dropped");
                }
            }
        }
    }

    /// Retarget to `peers`: workers for removed peers stop, new peers get
    /// fresh workers, unchanged peers keep their queues.
    pub fn set_peers(&self, peers: Vec<String>) {
        let mut links = self.links.lock();

        let (keep, remove): (Vec<PeerLink>, Vec<PeerLink>) =
            links.drain(..).partition(|link| peers.contains(&link.peer));
        for link in remove {
            link.stop();
        }
        *links = keep;

        for peer in peers {
            if links.iter().any(|link| link.peer == peer) {
                continue;
            }
            match PeerLink::spawn(
                peer.clone(),
                Arc::clone(&self.transport),
                &self.settings,
                Arc::clone(&self.counters),
            ) {
                Ok(link) => links.push(link),
                Err(e) => tracing::error!(%peer, error = %e, "could not start forwarder worker"),
            }
        }
    }

    /// Peers currently forwarded to
    pub fn peers(&self) -> Vec<String> {
        self.links.lock().iter().map(|link| link.peer.clone()).collect()
    }

    pub fn stats(&self) -> ForwarderStats {
        ForwarderStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped_full: self.counters.dropped_full.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            pending: self.counters.pending.load(Ordering::SeqCst),
        }
    }

    /// Block until every queued record was delivered or dropped, or until
    /// `timeout` passes. Returns whether the queues drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.counters.pending.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        true
    }

    /// Stop all workers, dropping anything still queued
    pub fn shutdown(&self) {
        let links: Vec<PeerLink> = self.links.lock().drain(..).collect();
        for link in links {
            link.stop();
        }
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
