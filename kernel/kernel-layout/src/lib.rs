//! # Kernel Configuration and Boot Interface
//!
//! The authoritative source for the kernel's memory-layout constants and the
//! bootloader-to-kernel handoff structure. Every subsystem derives its bounds
//! from the values defined here; nothing else in the workspace hard-codes an
//! address or a size.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
