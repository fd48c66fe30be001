// src/recording/recorder.rs
//! Session recorder
//!
//! Owns one session's buffer, cycler and scheduler. Construct one per
//! session and hand it to whatever produces events; there is no global state.

use crate::conditions::{ConditionEvaluator, ConditionSet};
use crate::messages::EventRecord;
use crate::observability::names;
use crate::recording::buffer::{BufferStats, MessageBuffer};
use crate::recording::cycler::BufferCycler;
use crate::recording::scheduler::{DeliveryScheduler, DeliveryStats};
use crate::recording::sender::Sender;
use crate::recording::storage::PendingStore;
use crate::utils::config::TrackerConfig;
use crate::utils::errors::{Result, TrackerError};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// How recording starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Deliver from the first event
    #[default]
    Live,

    /// Keep a rolling window until a condition triggers
    Buffered,
}

/// One recording session
pub struct SessionRecorder {
    session_id: Ulid,
    config: TrackerConfig,
    buffer: Arc<MessageBuffer>,
    cycler: Arc<BufferCycler>,
    scheduler: Arc<DeliveryScheduler>,
    conditions: Arc<dyn ConditionEvaluator>,
    buffering: AtomicBool,
    running: AtomicBool,
    cycle_cancel: CancellationToken,
    cycle_handle: Mutex<Option<JoinHandle<()>>>,
    trigger: Mutex<Option<String>>,
}

impl SessionRecorder {
    pub fn new(
        config: TrackerConfig,
        sender: Arc<dyn Sender>,
        store: Arc<dyn PendingStore>,
        conditions: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        let session_id = Ulid::new();
        let buffer = Arc::new(MessageBuffer::new(config.buffer.clone()));
        let cycler = Arc::new(BufferCycler::new(
            Arc::clone(&buffer),
            config.buffer.clone(),
        ));
        let scheduler = Arc::new(DeliveryScheduler::new(
            config.delivery.clone(),
            Arc::clone(&buffer),
            sender,
            store,
        ));

        debug!("Created session recorder {}", session_id);

        Self {
            session_id,
            config,
            buffer,
            cycler,
            scheduler,
            conditions,
            buffering: AtomicBool::new(false),
            running: AtomicBool::new(false),
            cycle_cancel: CancellationToken::new(),
            cycle_handle: Mutex::new(None),
            trigger: Mutex::new(None),
        }
    }

    /// Use the trigger rules declared in `config.conditions`
    pub fn with_config_conditions(
        config: TrackerConfig,
        sender: Arc<dyn Sender>,
        store: Arc<dyn PendingStore>,
    ) -> Self {
        let conditions = ConditionSet::new(config.conditions.clone());
        debug!("Loaded {} trigger rules from configuration", conditions.len());
        Self::new(config, sender, store, Arc::new(conditions))
    }

    pub fn session_id(&self) -> Ulid {
        self.session_id
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering.load(Ordering::Acquire)
    }

    /// Name of the condition that ended buffering, if one did
    pub fn trigger(&self) -> Option<String> {
        self.trigger.lock().clone()
    }

    pub fn scheduler(&self) -> &Arc<DeliveryScheduler> {
        &self.scheduler
    }

    /// Deliver late messages, then start delivery in the configured mode
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(TrackerError::AlreadyRunning);
        }

        let mode = self.config.recording.mode;
        info!("Starting session {} in {:?} mode", self.session_id, mode);

        match self.scheduler.deliver_late_messages().await {
            Ok(true) => info!("Delivered late messages from a previous run"),
            Ok(false) => {}
            Err(e) => warn!("Late message recovery failed: {}", e),
        }

        if mode == RecordingMode::Buffered {
            self.enter_buffering();
        }
        self.scheduler.start();
        Ok(())
    }

    fn enter_buffering(&self) {
        self.buffering.store(true, Ordering::Release);
        self.scheduler.set_buffering(true);

        let cycler = Arc::clone(&self.cycler);
        let cancel = self.cycle_cancel.clone();
        let period = self.config.cycling.cycle_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        cycler.cycle();
                    }
                }
            }
            debug!("Buffer cycling stopped");
        });

        *self.cycle_handle.lock() = Some(handle);
    }

    /// Record one event.
    ///
    /// Never blocks on the network. In buffering mode the record is also
    /// checked against the trigger conditions.
    pub fn record(&self, record: EventRecord) -> Result<()> {
        if !self.is_buffering() {
            let receipt = self.buffer.append(&record).map_err(|e| self.dropped(e))?;
            if receipt.under_pressure {
                self.scheduler.notify_pressure();
            }
            return Ok(());
        }

        self.cycler.append(&record).map_err(|e| self.dropped(e))?;
        if let Some(trigger) = self.conditions.evaluate(&record) {
            self.commit(&trigger);
        }
        Ok(())
    }

    fn dropped(&self, e: TrackerError) -> TrackerError {
        warn!("Dropping {} record: {}", self.session_id, e);
        metrics::counter!(names::MESSAGES_DROPPED).increment(1);
        e
    }

    /// Leave buffering mode keeping the more complete history.
    ///
    /// Returns `false` when the session was already delivering.
    pub fn commit(&self, trigger: &str) -> bool {
        let mut committed = self.trigger.lock();
        if committed.is_some() || !self.is_buffering() {
            return false;
        }

        info!("Condition {:?} triggered, committing session {}", trigger, self.session_id);
        *committed = Some(trigger.to_string());

        // Live appends must not reach `active` before the sync
        self.cycle_cancel.cancel();
        self.cycler.sync_buffers();
        self.buffering.store(false, Ordering::Release);
        self.scheduler.set_buffering(false);
        self.scheduler.notify_pressure();
        true
    }

    /// Stop cycling and delivery, flushing whatever is pending
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        info!("Stopping session {}", self.session_id);

        self.cycle_cancel.cancel();
        let cycle_handle = self.cycle_handle.lock().take();
        if let Some(handle) = cycle_handle {
            if let Err(e) = handle.await {
                error!("Buffer cycling ended abnormally: {}", e);
            }
        }

        self.scheduler.shutdown().await
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    pub fn delivery_stats(&self) -> DeliveryStats {
        self.scheduler.stats()
    }
}
