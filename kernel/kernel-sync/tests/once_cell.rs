use kernel_sync::SyncOnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn empty_cell_reads_none() {
    let cell: SyncOnceCell<u32> = SyncOnceCell::new();
    assert_eq!(cell.get(), None);
}

#[test]
fn get_or_init_runs_the_closure_once() {
    let cell = SyncOnceCell::new();
    let runs = AtomicUsize::new(0);

    let a = *cell.get_or_init(|| {
        runs.fetch_add(1, Ordering::SeqCst);
        7u32
    });
    // second call must return the stored value without re-running
    let b = *cell.get_or_init(|| {
        runs.fetch_add(1, Ordering::SeqCst);
        9u32
    });

    assert_eq!((a, b), (7, 7));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(cell.get(), Some(&7));
}

#[test]
fn racing_initializers_agree_on_one_value() {
    let threads = 8;
    let cell = Arc::new(SyncOnceCell::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for i in 0..threads {
        let cell = Arc::clone(&cell);
        let runs = Arc::clone(&runs);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            *cell.get_or_init(|| {
                runs.fetch_add(1, Ordering::SeqCst);
                i
            })
        }));
    }

    let mut seen = Vec::with_capacity(threads);
    for h in handles {
        seen.push(h.join().unwrap());
    }

    // exactly one closure ran, and every thread observed its value
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let first = seen[0];
    assert!(seen.iter().all(|&v| v == first));
    assert_eq!(cell.get(), Some(&first));
}
