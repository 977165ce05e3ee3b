//! Operations retained for API compatibility with hosts that expose
//! interrupt control, FPU exception masking, or heap introspection —
//! none of which a process running under a general-purpose POSIX
//! scheduler can honestly provide. Every call here returns
//! [`Status::NotImplemented`] rather than pretending to have done
//! something it didn't.

use crate::error::Status;

/// `IntLock`: disables interrupts on hardware that has them. A hosted
/// process has no interrupt mask to hold.
pub fn int_lock() -> Status {
    Status::NotImplemented
}

/// `IntUnlock`: restores the interrupt state `int_lock` would have
/// saved.
pub fn int_unlock(_int_level: i32) -> Status {
    Status::NotImplemented
}

/// `IntEnable`: enables interrupts through `level` on hardware that has
/// them.
pub fn int_enable(_level: i32) -> Status {
    Status::NotImplemented
}

/// `IntDisable`: disables interrupts through `level`.
pub fn int_disable(_level: i32) -> Status {
    Status::NotImplemented
}

/// `FPUExcSetMask`: sets the per-task FPU exception mask. The exception
/// environment this configures doesn't exist under a hosted process's
/// FPU handling, so unlike the original's quiet `Success`, this reports
/// the mask as never having been set.
pub fn fpu_exc_set_mask(_mask: u32) -> Status {
    Status::NotImplemented
}

/// `FPUExcGetMask`: reads back the mask `fpu_exc_set_mask` would have
/// set.
pub fn fpu_exc_get_mask() -> Result<u32, Status> {
    Err(Status::NotImplemented)
}

/// `HeapGetInfo` result: free/used bytes and block counts for the
/// host's heap allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapProp {
    pub free_bytes: u32,
    pub free_blocks: u32,
    pub used_bytes: u32,
    pub used_blocks: u32,
}

/// `HeapGetInfo`: a hosted process has no block-level view of its own
/// allocator, so there is no `HeapProp` to report.
pub fn heap_get_info() -> Result<HeapProp, Status> {
    Err(Status::NotImplemented)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compat_shims_report_not_implemented() {
        assert_eq!(int_lock(), Status::NotImplemented);
        assert_eq!(int_unlock(0), Status::NotImplemented);
        assert_eq!(int_enable(0), Status::NotImplemented);
        assert_eq!(int_disable(0), Status::NotImplemented);
        assert_eq!(fpu_exc_set_mask(0), Status::NotImplemented);
        assert_eq!(fpu_exc_get_mask(), Err(Status::NotImplemented));
        assert_eq!(heap_get_info(), Err(Status::NotImplemented));
    }
}
