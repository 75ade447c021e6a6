// SPDX-License-Identifier: GPL-3.0-only

//! Ordered chain of stages drawn as one
//!
//! Each child is its own offscreen pass; the output of one child is the input
//! of the next. Nested composites are flattened when added, so the child list
//! only ever holds leaf stages.

use super::{Capabilities, ParameterSlot, RenderStage, StageHandle, TransformMatrix};
use crate::constants::IDENTITY_MATRIX;
use crate::errors::{StageError, StageResult};
use crate::gpu::{Dimensions, FrameEncoder, FrameTexture, GpuContext};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub struct CompositeStage {
    children: Mutex<Vec<StageHandle>>,
    size: Option<Dimensions>,
    parameter1: f32,
    parameter2: f32,
}

impl Default for CompositeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeStage {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(Vec::new()),
            size: None,
            parameter1: 0.0,
            parameter2: 0.0,
        }
    }

    /// Build a composite from `stages`, in order
    pub fn from_children(stages: impl IntoIterator<Item = StageHandle>) -> StageResult<Self> {
        let composite = Self::new();
        for stage in stages {
            composite.add_child(stage)?;
        }
        Ok(composite)
    }

    /// Append `stage` unless it is already a child.
    ///
    /// A composite is flattened: its children are appended instead of the
    /// composite itself. Blocks while another thread holds `stage`. Adding
    /// a composite to itself fails with [`StageError::SelfInsertion`].
    pub fn add_child(&self, stage: StageHandle) -> StageResult<()> {
        if stage.wraps(self) {
            warn!("Rejected adding a composite to itself");
            return Err(StageError::SelfInsertion(self.name().to_string()));
        }

        let nested = stage.lock().children();

        let mut children = self.lock_children();
        match nested {
            Some(grandchildren) => {
                for child in grandchildren {
                    push_unique(&mut children, child);
                }
            }
            None => push_unique(&mut children, stage),
        }
        Ok(())
    }

    pub fn child_count(&self) -> usize {
        self.lock_children().len()
    }

    fn lock_children(&self) -> MutexGuard<'_, Vec<StageHandle>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn children_mut(&mut self) -> &mut Vec<StageHandle> {
        self.children.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push_unique(children: &mut Vec<StageHandle>, stage: StageHandle) {
    if children.iter().any(|child| child.ptr_eq(&stage)) {
        debug!("Composite already contains stage, skipping");
        return;
    }
    children.push(stage);
}

impl RenderStage for CompositeStage {
    fn name(&self) -> &str {
        "composite"
    }

    fn create(&mut self, gpu: &GpuContext) -> StageResult<()> {
        for child in self.children_mut().iter() {
            child.lock().create(gpu)?;
        }
        Ok(())
    }

    fn destroy(&mut self) {
        for child in self.children_mut().iter() {
            child.lock().destroy();
        }
    }

    fn size(&self) -> Option<Dimensions> {
        self.size
    }

    fn set_size(&mut self, size: Dimensions) {
        if self.size == Some(size) {
            return;
        }
        self.size = Some(size);
        for child in self.children_mut().iter() {
            child.lock().set_size(size);
        }
    }

    /// Thread `input` through every child in order.
    ///
    /// The capture transform is applied by the first child only; later
    /// children already sample a transformed image and get the identity.
    fn draw_offscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &FrameTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
    ) -> StageResult<FrameTexture> {
        let size = self.size;
        let mut current = input.clone();

        for (index, child) in self.children_mut().iter().enumerate() {
            let mut stage = child.lock();
            if let Some(size) = size
                && stage.size() != Some(size)
            {
                stage.set_size(size);
            }
            let child_transform = if index == 0 {
                transform
            } else {
                &IDENTITY_MATRIX
            };
            current = stage.draw_offscreen(frame, &current, timestamp_us, child_transform)?;
        }

        Ok(current)
    }

    fn copy(&self) -> StageHandle {
        let children = self
            .lock_children()
            .iter()
            .map(|child| child.lock().copy())
            .collect();
        StageHandle::new(Self {
            children: Mutex::new(children),
            size: self.size,
            parameter1: self.parameter1,
            parameter2: self.parameter2,
        })
        .into_dyn()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TWO_PARAMETERS
    }

    fn parameter(&self, slot: ParameterSlot) -> Option<f32> {
        match slot {
            ParameterSlot::First => Some(self.parameter1),
            ParameterSlot::Second => Some(self.parameter2),
        }
    }

    /// Store the value and forward it to every child supporting the slot
    fn set_parameter(&mut self, slot: ParameterSlot, value: f32) {
        match slot {
            ParameterSlot::First => self.parameter1 = value,
            ParameterSlot::Second => self.parameter2 = value,
        }
        for child in self.children_mut().iter() {
            let mut stage = child.lock();
            if stage.capabilities().supports(slot) {
                stage.set_parameter(slot, value);
            }
        }
    }

    fn children(&self) -> Option<Vec<StageHandle>> {
        Some(self.lock_children().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{FillLight, Identity, Mono, Vignette};
    use crate::stages::EffectStage;

    fn identity() -> StageHandle {
        StageHandle::new(EffectStage::new(Identity)).into_dyn()
    }

    #[test]
    fn test_duplicate_child_is_ignored() {
        let composite = CompositeStage::new();
        let stage = identity();
        composite.add_child(stage.clone()).unwrap();
        composite.add_child(stage.clone()).unwrap();
        assert_eq!(composite.child_count(), 1);
    }

    #[test]
    fn test_nested_composite_is_flattened() {
        let (a, b, c) = (identity(), identity(), identity());
        let inner = CompositeStage::from_children([b.clone(), c.clone()]).unwrap();
        let inner = StageHandle::new(inner).into_dyn();

        let outer = CompositeStage::new();
        outer.add_child(a.clone()).unwrap();
        outer.add_child(inner.clone()).unwrap();

        let children = outer.children().unwrap();
        assert_eq!(children.len(), 3);
        assert!(children[0].ptr_eq(&a));
        assert!(children[1].ptr_eq(&b));
        assert!(children[2].ptr_eq(&c));
        assert!(!children.iter().any(|child| child.ptr_eq(&inner)));
    }

    #[test]
    fn test_flattening_skips_existing_children() {
        let (a, b) = (identity(), identity());
        let inner = CompositeStage::from_children([a.clone(), b.clone()]).unwrap();
        let inner = StageHandle::new(inner);

        let outer = CompositeStage::new();
        outer.add_child(a.clone()).unwrap();
        outer.add_child(inner.into_dyn()).unwrap();
        assert_eq!(outer.child_count(), 2);
    }

    #[test]
    fn test_adding_composite_to_itself_is_rejected() {
        let composite = StageHandle::new(CompositeStage::new());
        let erased = composite.clone().into_dyn();

        let guard = composite.lock();
        let err = guard.add_child(erased).unwrap_err();
        assert!(matches!(err, StageError::SelfInsertion(_)));
        assert_eq!(guard.child_count(), 0);
    }

    #[test]
    fn test_add_child_waits_for_busy_child() {
        let child = identity();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();

        let holder = {
            let child = child.clone();
            std::thread::spawn(move || {
                let _guard = child.lock();
                let _ = locked_tx.send(());
                std::thread::sleep(std::time::Duration::from_millis(100));
            })
        };
        locked_rx.recv().unwrap();

        let composite = CompositeStage::new();
        composite.add_child(child.clone()).unwrap();
        holder.join().unwrap();

        assert_eq!(composite.child_count(), 1);
        assert!(composite.children().unwrap()[0].ptr_eq(&child));
    }

    #[test]
    fn test_parameter_fan_out() {
        let fill = StageHandle::new(EffectStage::new(FillLight::new(0.1))).into_dyn();
        let vignette = StageHandle::new(EffectStage::new(Vignette::default())).into_dyn();
        let mono = StageHandle::new(EffectStage::new(Mono)).into_dyn();

        let mut composite =
            CompositeStage::from_children([fill.clone(), vignette.clone(), mono.clone()]).unwrap();

        composite.set_parameter(ParameterSlot::First, 0.7);
        composite.set_parameter(ParameterSlot::Second, 0.4);

        assert_eq!(composite.parameter(ParameterSlot::First), Some(0.7));
        assert_eq!(composite.parameter(ParameterSlot::Second), Some(0.4));
        assert_eq!(fill.lock().parameter(ParameterSlot::First), Some(0.7));
        assert_eq!(fill.lock().parameter(ParameterSlot::Second), None);
        assert_eq!(vignette.lock().parameter(ParameterSlot::First), Some(0.7));
        assert_eq!(vignette.lock().parameter(ParameterSlot::Second), Some(0.4));
        assert_eq!(mono.lock().parameter(ParameterSlot::First), None);
    }

    #[test]
    fn test_set_size_fans_out() {
        let (a, b) = (identity(), identity());
        let mut composite = CompositeStage::from_children([a.clone(), b.clone()]).unwrap();
        composite.set_size(Dimensions::new(320, 240));
        assert_eq!(a.lock().size(), Some(Dimensions::new(320, 240)));
        assert_eq!(b.lock().size(), Some(Dimensions::new(320, 240)));
    }

    #[test]
    fn test_copy_is_deep() {
        let child = StageHandle::new(EffectStage::new(FillLight::new(0.2))).into_dyn();
        let mut composite = CompositeStage::from_children([child.clone()]).unwrap();
        composite.set_size(Dimensions::new(16, 16));

        let copy = composite.copy();
        let copied_children = copy.lock().children().unwrap();
        assert_eq!(copied_children.len(), 1);
        assert!(!copied_children[0].ptr_eq(&child));
        assert_eq!(copy.lock().size(), Some(Dimensions::new(16, 16)));

        composite.set_parameter(ParameterSlot::First, 0.9);
        assert_eq!(
            copied_children[0].lock().parameter(ParameterSlot::First),
            Some(0.2)
        );
    }

    #[test]
    fn test_destroy_reaches_every_child() {
        let child = StageHandle::new(EffectStage::new(Identity));
        let mut composite = CompositeStage::from_children([child.clone().into_dyn()]).unwrap();
        composite.destroy();
        composite.destroy();
        assert_eq!(child.lock().framebuffer_allocations(), 0);
    }
}
