use std::sync::atomic::{AtomicU32, Ordering};

use super::{FrameSlot, VRegId, VirtualReg};

/// Hands out fresh virtual register ids and frame slot ids.
///
/// Counters only ever go up. A `Context` may be shared between threads through an
/// `Arc`, in which case every function built from it still sees unique ids.
#[derive(Debug, Default)]
pub struct Context {
    vreg: AtomicU32,
    frame_slot: AtomicU32,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_vreg<C>(&self, class: C) -> VirtualReg<C> {
        VirtualReg {
            id: VRegId(self.vreg.fetch_add(1, Ordering::SeqCst)),
            class,
        }
    }

    /// Allocate a frame slot of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero. `RegisterClass::spill_size` never is.
    pub fn new_frame_slot(&self, size: u64) -> FrameSlot {
        assert!(size > 0, "frame slot must have a positive size");
        FrameSlot {
            id: self.frame_slot.fetch_add(1, Ordering::SeqCst),
            size,
        }
    }

    /// Number of virtual registers created so far.
    pub fn vreg_count(&self) -> u32 {
        self.vreg.load(Ordering::SeqCst)
    }
}
