// SPDX-License-Identifier: GPL-3.0-only

//! Render stages
//!
//! A stage consumes one texture plus the frame timestamp and transform, and
//! produces one texture. The chain of a frame is always:
//!
//! ```text
//! ExternalTexture -> InputConversionStage -> effect (any RenderStage) -> DisplayStage -> surface
//! ```
//!
//! Every stage owns its GPU program and offscreen target. Both are allocated
//! lazily on the first draw and released by [`RenderStage::destroy`].

mod composite;
mod display;
mod effect;
mod input;
mod pass;

pub use composite::CompositeStage;
pub use display::DisplayStage;
pub use effect::{Effect, EffectStage};
pub use input::InputConversionStage;
pub use pass::{ShaderNames, StageUniforms, default_vertex_shader};

use crate::errors::{StageError, StageResult};
use crate::gpu::{Dimensions, FrameEncoder, FrameTexture, GpuContext, SurfaceTarget};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// Column-major 4x4 matrix supplied by the capture collaborator
pub type TransformMatrix = [f32; 16];

/// One of the two scalar controls an effect may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterSlot {
    First,
    Second,
}

impl ParameterSlot {
    pub const ALL: [ParameterSlot; 2] = [ParameterSlot::First, ParameterSlot::Second];
}

/// Scalar controls a stage declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub parameter1: bool,
    pub parameter2: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        parameter1: false,
        parameter2: false,
    };
    pub const ONE_PARAMETER: Capabilities = Capabilities {
        parameter1: true,
        parameter2: false,
    };
    pub const TWO_PARAMETERS: Capabilities = Capabilities {
        parameter1: true,
        parameter2: true,
    };

    pub fn supports(&self, slot: ParameterSlot) -> bool {
        match slot {
            ParameterSlot::First => self.parameter1,
            ParameterSlot::Second => self.parameter2,
        }
    }
}

/// Contract shared by every stage of the chain
pub trait RenderStage: Send {
    /// Stage name used in logs and errors
    fn name(&self) -> &str;

    /// Compile the program and resolve its bindings.
    ///
    /// Drawing calls this lazily, so an explicit call is only needed to surface
    /// contract errors early.
    fn create(&mut self, gpu: &GpuContext) -> StageResult<()>;

    /// Release the program and offscreen target. Safe to call repeatedly.
    fn destroy(&mut self);

    /// Current target size, `None` until the first [`RenderStage::set_size`]
    fn size(&self) -> Option<Dimensions>;

    /// Record a new target size; the target is reallocated on the next draw
    fn set_size(&mut self, size: Dimensions);

    /// Draw `input` into the stage's own offscreen target and return it
    fn draw_offscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &FrameTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
    ) -> StageResult<FrameTexture>;

    /// Draw `input` into a presentable surface
    fn draw_onscreen(
        &mut self,
        _frame: &mut FrameEncoder<'_>,
        _input: &FrameTexture,
        _timestamp_us: i64,
        _transform: &TransformMatrix,
        _target: &SurfaceTarget<'_>,
    ) -> StageResult<()> {
        Err(StageError::Unsupported {
            stage: self.name().to_string(),
            operation: "onscreen drawing",
        })
    }

    /// Fresh instance with the same size and parameters and no GPU resources
    fn copy(&self) -> StageHandle;

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Value of a scalar control, `None` when the slot is not supported
    fn parameter(&self, _slot: ParameterSlot) -> Option<f32> {
        None
    }

    /// Set a scalar control; unsupported slots are ignored
    fn set_parameter(&mut self, _slot: ParameterSlot, _value: f32) {}

    /// Children of a composite, used to flatten nested composites
    fn children(&self) -> Option<Vec<StageHandle>> {
        None
    }
}

/// Shared, lockable reference to a stage.
///
/// Handles compare by identity: two handles are the same stage only if they
/// point at the same allocation. A typed handle (`StageHandle<CompositeStage>`)
/// keeps access to inherent methods and converts to the erased form with
/// [`StageHandle::into_dyn`].
pub struct StageHandle<S: ?Sized + RenderStage = dyn RenderStage> {
    inner: Arc<Mutex<S>>,
    // Address of the stage value inside the mutex, stable for the Arc's life
    stage_address: usize,
}

impl<S: RenderStage + 'static> StageHandle<S> {
    pub fn new(stage: S) -> Self {
        let inner = Arc::new(Mutex::new(stage));
        let stage_address = {
            let guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            &*guard as *const S as *const () as usize
        };
        Self {
            inner,
            stage_address,
        }
    }

    /// Erase the concrete stage type
    pub fn into_dyn(self) -> StageHandle {
        let inner: Arc<Mutex<dyn RenderStage>> = self.inner;
        StageHandle {
            inner,
            stage_address: self.stage_address,
        }
    }
}

impl<S: ?Sized + RenderStage> StageHandle<S> {
    /// Lock the stage. A poisoned lock is recovered: stage state stays usable
    /// after a panic on another thread.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock without blocking; `None` if the lock is held elsewhere
    pub fn try_lock(&self) -> Option<MutexGuard<'_, S>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Whether this handle wraps `stage` itself. Does not lock.
    pub(crate) fn wraps<T: ?Sized>(&self, stage: &T) -> bool {
        self.stage_address == stage as *const T as *const () as usize
    }

    /// Identity comparison
    pub fn ptr_eq<T: ?Sized + RenderStage>(&self, other: &StageHandle<T>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl<S: ?Sized + RenderStage> Clone for StageHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stage_address: self.stage_address,
        }
    }
}

impl<S: ?Sized + RenderStage> fmt::Debug for StageHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(stage) => f
                .debug_struct("StageHandle")
                .field("name", &stage.name())
                .field("size", &stage.size())
                .finish(),
            None => f.write_str("StageHandle(<locked>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{FillLight, Identity};

    #[test]
    fn test_capabilities_supports() {
        assert!(!Capabilities::NONE.supports(ParameterSlot::First));
        assert!(Capabilities::ONE_PARAMETER.supports(ParameterSlot::First));
        assert!(!Capabilities::ONE_PARAMETER.supports(ParameterSlot::Second));
        assert!(Capabilities::TWO_PARAMETERS.supports(ParameterSlot::Second));
    }

    #[test]
    fn test_handle_identity() {
        let a = StageHandle::new(EffectStage::new(Identity)).into_dyn();
        let b = StageHandle::new(EffectStage::new(Identity)).into_dyn();
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_typed_handle_keeps_identity_after_erasure() {
        let typed = StageHandle::new(EffectStage::new(FillLight::default()));
        let erased = typed.clone().into_dyn();
        assert!(typed.ptr_eq(&erased));

        typed.lock().effect_mut().set_strength(0.8);
        assert_eq!(erased.lock().parameter(ParameterSlot::First), Some(0.8));
    }

    #[test]
    fn test_handle_knows_its_stage() {
        let handle = StageHandle::new(EffectStage::new(Identity));
        let other = EffectStage::new(Identity);
        let erased = handle.clone().into_dyn();

        let guard = handle.lock();
        assert!(handle.wraps(&*guard));
        assert!(erased.wraps(&*guard));
        assert!(!handle.wraps(&other));
    }

    #[test]
    fn test_try_lock_reports_contention() {
        let handle = StageHandle::new(EffectStage::new(Identity)).into_dyn();
        let guard = handle.lock();
        assert!(handle.try_lock().is_none());
        drop(guard);
        assert!(handle.try_lock().is_some());
    }
}
