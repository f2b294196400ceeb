//! Interrupt-state control for single-core critical sections.
//!
//! On the one core this kernel targets, disabling interrupts *is* mutual
//! exclusion; the [`IrqGuard`] snapshots the interrupt-enable flag, disables
//! interrupts, and restores the prior state on drop. Combined with a
//! [`SpinLock`](crate::SpinLock) via [`SpinLock::lock_irq`](crate::SpinLock::lock_irq),
//! it keeps interrupt handlers from re-entering code that holds the same
//! lock.
//!
//! This module is the embedder's seam, not a hosted code path: the kernel
//! entry points that wrap the allocator and scheduler crates take
//! `lock_irq` on the privileged target, while hosted tests and the core
//! crates use the plain [`SpinLock::lock`](crate::SpinLock::lock), which
//! never executes `cli`/`sti`.

use crate::{SpinLock, SpinLockGuard};

/// Disables hardware interrupts (`cli`).
///
/// # Platform
///
/// `x86/x86_64`.
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `cli` is permitted. Misuse can
/// hang the system.
#[inline]
pub fn cli_stop_interrupts() {
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enables hardware interrupts (`sti`).
///
/// # Platform
///
/// `x86/x86_64`.
///
/// # Safety & Privilege
///
/// Must only be called in contexts where `sti` is permitted. Typically used
/// to restore a previously disabled interrupt state.
#[inline]
pub fn sti_enable_interrupts() {
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Returns the current flags register (via `pushf/pop`).
///
/// Bit 9 (`IF`) indicates whether interrupts are enabled.
///
/// # Platform
///
/// `x86/x86_64`.
#[inline]
#[must_use]
pub fn flags() -> usize {
    let r: usize;
    unsafe {
        core::arch::asm!("pushf; pop {}", out(reg) r, options(nostack, preserves_flags));
    }
    r
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the `IF` bit. If interrupts were enabled, it
/// executes `cli`. On drop, it executes `sti` **only** if they were
/// previously enabled, preserving the original state.
///
/// # Platform / Privilege
///
/// Requires `x86/x86_64` and a privileged context permitting `cli/sti`.
pub struct IrqGuard {
    /// Whether interrupts were enabled (IF=1) when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    /// Disables interrupts if they are currently enabled and remembers the
    /// state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = (flags() & (1 << 9)) != 0;
        if enabled {
            cli_stop_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }
}

impl Drop for IrqGuard {
    /// Restores interrupts (`sti`) only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}

/// A spinlock guard that also holds interrupts disabled.
///
/// Dropping releases the lock first, then restores the interrupt state
/// (fields drop in declaration order; the guard must go before the
/// interrupt snapshot).
pub struct IrqSpinLockGuard<'a, T> {
    _g: SpinLockGuard<'a, T>,
    _irq: IrqGuard,
}

impl<T> core::ops::Deref for IrqSpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self._g
    }
}

impl<T> core::ops::DerefMut for IrqSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self._g
    }
}

impl<T> SpinLock<T> {
    /// Acquires the lock with interrupts disabled for the guard's lifetime.
    ///
    /// # Platform / Privilege
    ///
    /// Requires `x86/x86_64` and a privileged execution context where
    /// `cli/sti` are permitted.
    #[inline]
    pub fn lock_irq(&self) -> IrqSpinLockGuard<'_, T> {
        let irq = IrqGuard::new();
        let g = self.lock();
        IrqSpinLockGuard { _g: g, _irq: irq }
    }
}
