//! End-to-end bring-up over simulated physical memory.
//!
//! A 16 MiB machine with the first 2 MiB reserved, exactly the shape the
//! boot stage reports; the buffer-backed mapper stands in for the kernel
//! logical window.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;

use kernel_addresses::VirtualAddress;
use kernel_alloc::SliceMapper;
use kernel_core::{Kernel, TIMER_VECTOR};
use kernel_interrupts::{DispatchOutcome, TrapFrame};
use kernel_layout::boot::BootInfo;
use kernel_layout::memory::{FRAME_SIZE, KERNEL_LOGICAL_BASE};
use kernel_task::{ProcessId, ThreadState};

const TOTAL_MEMORY: u32 = 16 * 1024 * 1024;
const FRAME_BASE: u32 = 2 * 1024 * 1024;
const RAM_LEN: usize = 4 * 1024 * 1024;

fn boot() -> BootInfo {
    BootInfo::new(TOTAL_MEMORY, 0x0010_0000, 0x0018_0000)
}

fn entry() -> VirtualAddress {
    VirtualAddress::new(KERNEL_LOGICAL_BASE + 0x0010_0000)
}

struct TestRam {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl TestRam {
    fn new() -> Self {
        let layout = Layout::from_size_align(RAM_LEN, FRAME_SIZE as usize).unwrap();
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) }).unwrap();
        Self { ptr, layout }
    }

    fn mapper(&self) -> SliceMapper {
        // SAFETY: the buffer outlives the kernel built over it.
        unsafe { SliceMapper::new(self.ptr, FRAME_BASE, self.layout.size()) }
    }
}

impl Drop for TestRam {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

#[test]
fn init_brings_every_layer_up() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let kernel = Kernel::init(&mapper, boot(), entry()).unwrap();

    // Slab region, arena backing and page tables all came from frames.
    assert!(kernel.frames().used_frames() > 64);
    assert!(kernel.heap().free_bytes() > 0);

    let processes = kernel.processes();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].pid, ProcessId::INIT);
    assert_eq!(processes[0].name, "init");
    assert_eq!(processes[0].live_threads, 1);
}

#[test]
fn boot_address_space_maps_the_kernel_image_logically() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let kernel = Kernel::init(&mapper, boot(), entry()).unwrap();

    let space = kernel.address_space();
    let va = VirtualAddress::new(KERNEL_LOGICAL_BASE + 0x0010_0000);
    assert_eq!(space.query(va).map(|pa| pa.as_u32()), Some(0x0010_0000));
    // The null page stays unmapped.
    assert_eq!(space.query(VirtualAddress::zero()), None);
}

#[test]
fn first_user_process_gets_pid_one() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();

    let shell = kernel.spawn_process("shell", entry(), 0).unwrap();
    assert_eq!(shell, ProcessId::new(1));
}

#[test]
fn heap_round_trips_through_the_kernel_handle() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let kernel = Kernel::init(&mapper, boot(), entry()).unwrap();

    let free_before = kernel.heap().free_bytes();
    let va = kernel.kmalloc(300).unwrap();
    assert!(va.is_kernel());
    assert!(kernel.heap().free_bytes() < free_before);

    kernel.kfree(va).unwrap();
    assert_eq!(kernel.heap().free_bytes(), free_before);
}

#[test]
fn scheduler_runs_init_first_and_round_robins() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();
    let shell = kernel.spawn_process("shell", entry(), 0).unwrap();

    let first = kernel.schedule().unwrap().unwrap();
    let init_main = kernel
        .process(ProcessId::INIT)
        .unwrap()
        .thread(0)
        .unwrap()
        .tid;
    assert_eq!(first, init_main);

    let second = kernel.schedule().unwrap().unwrap();
    let shell_main = kernel.process(shell).unwrap().thread(0).unwrap().tid;
    assert_eq!(second, shell_main);

    let third = kernel.schedule().unwrap().unwrap();
    assert_eq!(third, init_main);
}

#[test]
fn timer_ticks_charge_the_running_thread() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();
    kernel.schedule().unwrap().unwrap();

    let mut frame = TrapFrame {
        vector: TIMER_VECTOR,
        ..TrapFrame::default()
    };
    for _ in 0..3 {
        assert_eq!(kernel.on_interrupt(&mut frame), DispatchOutcome::Handled);
    }
    assert_eq!(kernel.processes()[0].threads[0].ticks, 3);
}

#[test]
fn unhandled_exceptions_are_fail_stop() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();

    let mut frame = TrapFrame {
        vector: 14, // page fault, nothing registered
        ..TrapFrame::default()
    };
    let outcome = kernel.on_interrupt(&mut frame);
    assert_eq!(outcome, DispatchOutcome::Unhandled);
    assert!(outcome.is_fatal(frame.vector));
}

#[test]
fn registered_vectors_are_dispatched() {
    fn noop(_frame: &mut TrapFrame) {}

    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();
    kernel.register_handler(0x21, noop).unwrap();

    let mut frame = TrapFrame {
        vector: 0x21,
        ..TrapFrame::default()
    };
    assert_eq!(kernel.on_interrupt(&mut frame), DispatchOutcome::Handled);
}

#[test]
fn stack_pointer_resolves_to_the_running_thread() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();
    let tid = kernel.schedule().unwrap().unwrap();

    let stack_top = kernel
        .process(ProcessId::INIT)
        .unwrap()
        .thread(0)
        .unwrap()
        .stack_top;
    let sp = VirtualAddress::new(stack_top.as_u32() - 128);
    assert_eq!(kernel.current_thread(sp), Some(tid));
}

#[test]
fn killing_a_process_through_the_kernel_removes_it() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();
    let shell = kernel.spawn_process("shell", entry(), 0).unwrap();
    let caller = kernel.schedule().unwrap().unwrap(); // init main

    let remaining = kernel.kill(shell, Some(caller)).unwrap();
    assert_eq!(remaining, 0);
    assert!(kernel.process(shell).is_none());
    assert_eq!(kernel.processes().len(), 1);
}

#[test]
fn wait_and_notify_flow_through_the_kernel_handle() {
    let ram = TestRam::new();
    let mapper = ram.mapper();
    let mut kernel = Kernel::init(&mapper, boot(), entry()).unwrap();
    let shell = kernel.spawn_process("shell", entry(), 0).unwrap();

    let init_main = kernel.schedule().unwrap().unwrap();
    kernel.wait(shell, init_main).unwrap();
    assert_eq!(
        kernel.processes()[0].threads[0].state,
        ThreadState::Blocked
    );

    let woken = kernel.notify(shell, false, 9).unwrap();
    assert_eq!(woken, 1);
    assert_eq!(kernel.process(shell).unwrap().wait_code(), 9);
}
