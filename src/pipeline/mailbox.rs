// SPDX-License-Identifier: GPL-3.0-only

use crate::stages::StageHandle;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Single-slot hand-off of the next effect to the render thread.
///
/// Any thread may post a stage; the frame pipeline takes it at the start of
/// its next frame. Posting again before that replaces the earlier request.
#[derive(Clone, Default)]
pub struct EffectSwitch {
    slot: Arc<Mutex<Option<StageHandle>>>,
}

impl EffectSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `stage`, returning the request it superseded, if any
    pub fn request(&self, stage: StageHandle) -> Option<StageHandle> {
        let superseded = self.lock().replace(stage);
        if superseded.is_some() {
            debug!("Pending effect superseded before it was adopted");
        }
        superseded
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Take the pending stage, leaving the slot empty
    pub fn take(&self) -> Option<StageHandle> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<StageHandle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EffectSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectSwitch")
            .field("pending", &self.is_pending())
            .finish()
    }
}
