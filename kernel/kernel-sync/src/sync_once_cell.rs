use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    mem::MaybeUninit,
    sync::atomic::{AtomicU8, Ordering},
};

const UNINIT: u8 = 0;
const INITING: u8 = 1;
const READY: u8 = 2;

/// One-shot initialization cell for boot-order state.
///
/// The boot sequence builds each subsystem exactly once and every later
/// reader observes the finished value; this cell makes that hand-off
/// explicit instead of hiding it in a mutable static.
pub struct SyncOnceCell<T> {
    /// UNINIT -> INITING -> READY, never backwards.
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns `Some(&T)` if already initialized.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY is only stored after the value write completes.
            Some(unsafe { self.assume_ready() })
        } else {
            None
        }
    }

    /// Initialize at most once and return `&T`.
    ///
    /// Exactly one caller runs `init`; everyone else spins until the value
    /// is published and then reads it.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(v) = self.get() {
            return v;
        }

        if self
            .state
            .compare_exchange(UNINIT, INITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            unsafe {
                (*self.value.get()).write(init());
            }
            // Publish the write before flipping to READY.
            self.state.store(READY, Ordering::Release);
        } else {
            // Lost the race; the winner is mid-initialization.
            while self.state.load(Ordering::Acquire) != READY {
                spin_loop();
            }
        }
        // SAFETY: READY was observed (or stored by us) above.
        unsafe { self.assume_ready() }
    }

    /// # Safety
    /// The state must be READY.
    unsafe fn assume_ready(&self) -> &T {
        unsafe { (*self.value.get()).assume_init_ref() }
    }
}

// Safety: single-writer initialization, shared reads only after READY.
unsafe impl<T: Sync> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}
