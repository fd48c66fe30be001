// src/recording/cycler.rs
//! Dual-buffer cycling for cold-start recording
//!
//! While buffering, every record goes to both the active buffer (the one the
//! scheduler drains) and a private backup. Each cycle clears exactly one of
//! the two, alternating, so one of them always holds at least a full cycle of
//! history and together they hold at most about two.
//!
//! When a trigger fires, the larger of the two is kept as the more complete
//! history and becomes the active buffer's content. This is a heuristic, not
//! a timeline reconstruction.

use crate::messages::EventRecord;
use crate::recording::buffer::MessageBuffer;
use crate::utils::config::BufferSettings;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Which buffer a cycle or sync acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSide {
    Active,
    Backup,
}

#[derive(Debug, Default)]
struct CycleState {
    cycles: u64,
    /// Set by `sync_buffers`; from then on only `active` is written
    committed: bool,
}

/// Alternating pair of buffers
///
/// Append, cycle and sync run under one lock, so a sync never interleaves
/// with a half-finished append to the two buffers.
pub struct BufferCycler {
    active: Arc<MessageBuffer>,
    backup: MessageBuffer,
    state: Mutex<CycleState>,
}

impl BufferCycler {
    pub fn new(active: Arc<MessageBuffer>, settings: BufferSettings) -> Self {
        Self {
            active,
            backup: MessageBuffer::new(settings),
            state: Mutex::new(CycleState::default()),
        }
    }

    /// Append to both buffers, or only to `active` once committed.
    ///
    /// Succeeds when at least one buffer accepted the record.
    pub fn append(&self, record: &EventRecord) -> Result<()> {
        let message = record.encode()?;
        let state = self.state.lock();

        if state.committed {
            return self.active.append_encoded(message).map(|_| ());
        }

        let active = self.active.append_encoded(message.clone());
        let backup = self.backup.append_encoded(message);
        match (active, backup) {
            (Err(e), Err(_)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Clear one buffer, alternating by cycle parity.
    ///
    /// Returns `None` once the buffers have been synced.
    pub fn cycle(&self) -> Option<BufferSide> {
        let mut state = self.state.lock();
        if state.committed {
            return None;
        }

        let n = state.cycles;
        state.cycles += 1;
        let (side, cleared) = if n % 2 == 0 {
            (BufferSide::Active, self.active.clear())
        } else {
            (BufferSide::Backup, self.backup.clear())
        };
        debug!("Buffer cycle {} cleared {:?} ({} messages)", n, side, cleared);
        Some(side)
    }

    pub fn cycles(&self) -> u64 {
        self.state.lock().cycles
    }

    pub fn is_committed(&self) -> bool {
        self.state.lock().committed
    }

    pub fn active_bytes(&self) -> usize {
        self.active.pending_bytes()
    }

    pub fn backup_bytes(&self) -> usize {
        self.backup.pending_bytes()
    }

    /// Keep the larger buffer as the active content, empty the backup and
    /// stop cycling.
    ///
    /// Returns which side's history was kept.
    pub fn sync_buffers(&self) -> BufferSide {
        let mut state = self.state.lock();
        let active_bytes = self.active.pending_bytes();
        let backup_bytes = self.backup.pending_bytes();

        let kept = if backup_bytes > active_bytes {
            self.active.replace_pending(self.backup.take_all());
            BufferSide::Backup
        } else {
            self.backup.clear();
            BufferSide::Active
        };
        state.cycles = 0;
        state.committed = true;

        info!(
            "Synced buffers: kept {:?} ({} bytes active, {} bytes backup)",
            kept, active_bytes, backup_bytes
        );
        kept
    }
}
