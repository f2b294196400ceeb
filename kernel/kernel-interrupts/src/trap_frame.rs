//! The register snapshot delivered with every interrupt.

/// Registers and trap metadata as pushed by the low-level entry stubs.
///
/// Layout is fixed by the stub code: a `pusha`-order register block, the
/// vector number and error code pushed by the stub, then the frame the
/// CPU itself pushed. Must stay `#[repr(C)]` and field-for-field in sync
/// with the assembly.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrapFrame {
    // Pushed by the stub via `pusha` (reverse push order).
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// Stack pointer value at the time of `pusha`; ignored on restore.
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,

    // Pushed by the stub before the register block.
    pub vector: u32,
    /// Hardware error code, or `0` for vectors that do not push one.
    pub error_code: u32,

    // Pushed by the CPU on interrupt entry.
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl TrapFrame {
    /// The vector as a table index.
    #[inline]
    #[must_use]
    pub const fn vector_index(&self) -> usize {
        self.vector as usize
    }
}

// The stub-side assembly depends on this exact size.
const _: () = assert!(size_of::<TrapFrame>() == 13 * 4);
