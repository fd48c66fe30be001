// src/recording/scheduler.rs
//! Delivery scheduler
//!
//! Drains the message buffer on a fixed interval, or early when producers
//! report pressure, and hands gzip bodies to the sender.
//!
//! # Per-tick state machine
//!
//! ```text
//! IDLE → DRAINING → COMPRESSING → SENDING ─┬→ CONFIRMED → DRAINING (until empty)
//!                                           └→ FAILED → requeue_front → IDLE
//! ```
//!
//! A confirmed batch does not end the tick: the tick keeps draining until the
//! buffer is empty or a send fails, rather than sending one batch per tick.
//!
//! Ticks never overlap: a tick that finds another still in flight is skipped,
//! not queued. No buffer lock is held while a send is awaited. After a failed
//! tick, pressure notifications are ignored until a tick succeeds, so retries
//! during an outage follow the timer.

use crate::observability::names;
use crate::recording::buffer::{Batch, MessageBuffer};
use crate::recording::compressor::{BodyCompressor, Compressor};
use crate::recording::sender::Sender;
use crate::recording::storage::PendingStore;
use crate::utils::config::DeliverySettings;
use crate::utils::errors::{Result, TrackerError};
use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the scheduler is within a delivery cycle
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle = 0,
    Draining = 1,
    Compressing = 2,
    Sending = 3,
    FinalFlush = 4,
}

impl DeliveryState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => DeliveryState::Draining,
            2 => DeliveryState::Compressing,
            3 => DeliveryState::Sending,
            4 => DeliveryState::FinalFlush,
            _ => DeliveryState::Idle,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending, or the scheduler is in buffering mode
    Idle,

    /// Another tick was still in flight
    Skipped,

    /// Every drained batch was accepted
    Confirmed { batches: usize, messages: usize },

    /// A send failed; that batch went back to the head of the buffer
    Failed {
        first_index: u64,
        messages: usize,
        confirmed_batches: usize,
    },
}

/// Delivery statistics
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    pub ticks: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub batches_dropped: u64,
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub compression_fallbacks: u64,
    pub late_batches_delivered: u64,
    pub late_batches_persisted: u64,
}

/// Periodic drain-compress-send loop over one message buffer
pub struct DeliveryScheduler {
    settings: DeliverySettings,
    buffer: Arc<MessageBuffer>,
    sender: Arc<dyn Sender>,
    store: Arc<dyn PendingStore>,
    compressor: Box<dyn BodyCompressor>,
    state: AtomicU8,
    buffering: AtomicBool,
    backing_off: AtomicBool,
    tick_lock: tokio::sync::Mutex<()>,
    pressure: Notify,
    cancel: CancellationToken,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    stats: parking_lot::Mutex<DeliveryStats>,
}

impl DeliveryScheduler {
    pub fn new(
        settings: DeliverySettings,
        buffer: Arc<MessageBuffer>,
        sender: Arc<dyn Sender>,
        store: Arc<dyn PendingStore>,
    ) -> Self {
        let compressor = Compressor::new(settings.compression_level);
        Self {
            settings,
            buffer,
            sender,
            store,
            compressor: Box::new(compressor),
            state: AtomicU8::new(DeliveryState::Idle as u8),
            buffering: AtomicBool::new(false),
            backing_off: AtomicBool::new(false),
            tick_lock: tokio::sync::Mutex::new(()),
            pressure: Notify::new(),
            cancel: CancellationToken::new(),
            worker: parking_lot::Mutex::new(None),
            stats: parking_lot::Mutex::new(DeliveryStats::default()),
        }
    }

    /// Replace the gzip compressor
    pub fn with_compressor(mut self, compressor: impl BodyCompressor + 'static) -> Self {
        self.compressor = Box::new(compressor);
        self
    }

    pub fn state(&self) -> DeliveryState {
        DeliveryState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DeliveryState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// While buffering, ticks leave the buffer alone
    pub fn set_buffering(&self, buffering: bool) {
        self.buffering.store(buffering, Ordering::Release);
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering.load(Ordering::Acquire)
    }

    /// The last tick failed; pressure wake-ups wait for the timer
    pub fn is_backing_off(&self) -> bool {
        self.backing_off.load(Ordering::Acquire)
    }

    /// Request a tick ahead of the timer
    pub fn notify_pressure(&self) {
        self.pressure.notify_one();
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats.lock().clone()
    }

    /// Spawn the timer loop on the current runtime
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Delivery scheduler already started");
            return;
        }

        info!(
            "Starting delivery scheduler (interval {:?}, batch limit {} bytes)",
            self.settings.flush_interval(),
            self.settings.batch_max_bytes
        );

        let this = Arc::clone(self);
        *worker = Some(tokio::spawn(async move { this.run().await }));
    }

    async fn run(&self) {
        let mut interval = tokio::time::interval(self.settings.flush_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            // An in-flight tick always runs to completion, so its batch is
            // either confirmed or requeued before the loop can stop.
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                _ = interval.tick() => {
                    self.tick().await;
                }

                _ = self.pressure.notified() => {
                    if self.is_backing_off() {
                        debug!("Buffer under pressure, backing off until the next timer tick");
                    } else {
                        debug!("Buffer under pressure, flushing early");
                        self.tick().await;
                    }
                }
            }
        }

        debug!("Delivery loop stopped");
    }

    /// Run one delivery cycle: drain and send until empty or a send fails
    pub async fn tick(&self) -> TickOutcome {
        if self.is_buffering() {
            return TickOutcome::Idle;
        }

        let Ok(_guard) = self.tick_lock.try_lock() else {
            debug!("Delivery tick still in flight, skipping");
            return TickOutcome::Skipped;
        };
        self.stats.lock().ticks += 1;

        let mut batches = 0;
        let mut messages = 0;

        loop {
            self.set_state(DeliveryState::Draining);
            let Some(batch) = self.buffer.drain(self.settings.batch_max_bytes) else {
                break;
            };
            let first_index = batch.first_index();
            let count = batch.len();

            match self.deliver(&batch).await {
                Ok(()) => {
                    batches += 1;
                    messages += count;
                }
                Err(TrackerError::SendFailed(reason)) => {
                    warn!(
                        "Batch at index {} not delivered ({}), requeueing {} messages",
                        first_index, reason, count
                    );
                    self.buffer.requeue_front(batch);
                    self.backing_off.store(true, Ordering::Release);
                    self.set_state(DeliveryState::Idle);
                    return TickOutcome::Failed {
                        first_index,
                        messages: count,
                        confirmed_batches: batches,
                    };
                }
                Err(e) => {
                    error!("Dropping batch at index {}: {}", first_index, e);
                    self.stats.lock().batches_dropped += 1;
                    metrics::counter!(names::MESSAGES_DROPPED).increment(count as u64);
                }
            }
        }

        self.backing_off.store(false, Ordering::Release);
        self.set_state(DeliveryState::Idle);
        if batches == 0 {
            TickOutcome::Idle
        } else {
            debug!("Tick delivered {} batches ({} messages)", batches, messages);
            TickOutcome::Confirmed { batches, messages }
        }
    }

    async fn deliver(&self, batch: &Batch) -> Result<()> {
        let body = batch.encode()?;

        self.set_state(DeliveryState::Compressing);
        let (payload, headers) = self.prepare(body);
        let size = payload.len();

        self.set_state(DeliveryState::Sending);
        if self.sender.send(payload, headers).await {
            {
                let mut stats = self.stats.lock();
                stats.batches_sent += 1;
                stats.messages_sent += batch.len() as u64;
                stats.bytes_sent += size as u64;
            }
            metrics::counter!(names::BATCHES_SENT).increment(1);
            metrics::counter!(names::MESSAGES_SENT).increment(batch.len() as u64);
            Ok(())
        } else {
            self.stats.lock().batches_failed += 1;
            metrics::counter!(names::BATCHES_FAILED).increment(1);
            Err(TrackerError::SendFailed(format!(
                "{} byte body rejected",
                size
            )))
        }
    }

    /// gzip the body, falling back to the raw bytes if compression fails
    fn prepare(&self, body: Bytes) -> (Bytes, HeaderMap) {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );

        match self.compressor.compress(&body) {
            Ok(compressed) => {
                headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                (Bytes::from(compressed), headers)
            }
            Err(e) => {
                warn!("{}; sending {} bytes uncompressed", e, body.len());
                self.stats.lock().compression_fallbacks += 1;
                metrics::counter!(names::COMPRESSION_FALLBACKS).increment(1);
                (body, headers)
            }
        }
    }

    /// Try once to deliver persisted late messages.
    ///
    /// Returns whether anything was delivered. On failure the file stays for
    /// the next start.
    pub async fn deliver_late_messages(&self) -> Result<bool> {
        let Some(body) = self.store.load_pending().await? else {
            return Ok(false);
        };

        info!("Delivering {} bytes of late messages", body.len());
        let (payload, headers) = self.prepare(body);

        if self.sender.send(payload, headers).await {
            self.store.delete_pending().await?;
            self.stats.lock().late_batches_delivered += 1;
            metrics::counter!(names::LATE_DELIVERED).increment(1);
            Ok(true)
        } else {
            warn!("Late message delivery failed, keeping them for the next start");
            Ok(false)
        }
    }

    /// Stop the timer loop, then flush everything still pending
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down delivery scheduler");

        self.cancel.cancel();
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!("Delivery loop ended abnormally: {}", e);
            }
        }

        self.final_flush().await
    }

    /// One synchronous drain-and-send of every pending message.
    ///
    /// A failed send is persisted as a late message instead of dropped.
    pub async fn final_flush(&self) -> Result<()> {
        let _guard = self.tick_lock.lock().await;

        if self.is_buffering() {
            let discarded = self.buffer.clear();
            info!(
                "Stopping in buffering mode, discarding {} unconfirmed messages",
                discarded
            );
            return Ok(());
        }

        self.set_state(DeliveryState::FinalFlush);
        let result = self.flush_remaining().await;
        self.set_state(DeliveryState::Idle);
        result
    }

    async fn flush_remaining(&self) -> Result<()> {
        let Some(batch) = self.buffer.drain_all() else {
            debug!("Nothing pending at shutdown");
            return self.deliver_late_messages().await.map(|_| ());
        };

        let count = batch.len();
        let body = batch.encode()?;
        let (payload, headers) = self.prepare(body.clone());

        if self.sender.send(payload, headers).await {
            info!("Final flush delivered {} messages", count);
            {
                let mut stats = self.stats.lock();
                stats.batches_sent += 1;
                stats.messages_sent += count as u64;
            }
            metrics::counter!(names::BATCHES_SENT).increment(1);
            if let Err(e) = self.deliver_late_messages().await {
                warn!("Late message delivery after final flush failed: {}", e);
            }
            return Ok(());
        }

        warn!(
            "Final flush failed, persisting {} messages for the next start",
            count
        );

        // Keep older late messages ahead of this batch
        let mut late = match self.store.load_pending().await {
            Ok(Some(existing)) => existing.to_vec(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read existing late messages: {}", e);
                Vec::new()
            }
        };
        late.extend_from_slice(&body);
        self.store.save_pending(&late).await?;

        self.stats.lock().late_batches_persisted += 1;
        metrics::counter!(names::LATE_PERSISTED).increment(1);
        Ok(())
    }
}
