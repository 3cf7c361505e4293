use coqueue::{Executor, Queue, QueueBuilder, Work, block_on, call_on, spawn_task, switch_to};
use std::cell::Cell;
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

thread_local! {
    static ON_THREAD_PER_WORK: Cell<bool> = const { Cell::new(false) };
}

/// Runs every work item on a fresh thread.
struct ThreadPerWork;

impl ThreadPerWork {
    fn spawn(delay: Option<Instant>, work: Work) {
        thread::spawn(move || {
            if let Some(deadline) = delay {
                thread::sleep(deadline.saturating_duration_since(Instant::now()));
            }
            ON_THREAD_PER_WORK.with(|flag| flag.set(true));
            work.run();
        });
    }
}

impl Executor for ThreadPerWork {
    fn submit(&self, work: Work) {
        Self::spawn(None, work);
    }

    fn submit_after(&self, deadline: Instant, work: Work) {
        Self::spawn(Some(deadline), work);
    }

    fn is_current(&self) -> bool {
        ON_THREAD_PER_WORK.with(Cell::get)
    }

    fn label(&self) -> &str {
        "thread-per-work"
    }
}

#[test]
fn test_queue_identity() {
    let a = QueueBuilder::new().label("a").build();
    let b = QueueBuilder::new().label("a").build();

    assert_eq!(a, a.clone());
    assert_ne!(a, b);

    let set: HashSet<Queue> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn test_queue_debug_shows_label() {
    let queue = QueueBuilder::new().label("network").build();

    assert_eq!(queue.label(), "network");
    assert!(format!("{queue:?}").contains("network"));
}

#[test]
fn test_block_on_runs_on_queue() {
    let queue = QueueBuilder::new().label("main").build();
    let probe = queue.clone();

    let on_queue = block_on(&queue, async move { probe.is_current() });

    assert!(on_queue);
}

#[test]
fn test_worker_thread_is_named_after_label() {
    let queue = QueueBuilder::new().label("named").build();

    let name = queue.block_on(async { thread::current().name().map(str::to_owned) });

    assert_eq!(name.as_deref(), Some("coqueue-named"));
}

#[test]
fn test_custom_executor_drives_tasks() {
    let custom = Queue::new(ThreadPerWork);
    let c = custom.clone();

    let (value, on_custom) = block_on(&custom, async move {
        let value = call_on(&c, || 6 * 7).resume_on(&c).await;
        (value, c.is_current())
    });

    assert_eq!(value, 42);
    assert!(on_custom);
}

#[test]
fn test_custom_executor_honours_deadlines() {
    let custom = Queue::new(ThreadPerWork);
    let main = QueueBuilder::new().label("main").build();
    let c = custom.clone();

    let late_enough = main.block_on(async move {
        let deadline = Instant::now() + Duration::from_millis(30);
        spawn_task(async { 1 }).resume_on_after(&c, deadline).await;
        Instant::now() >= deadline
    });

    assert!(late_enough);
}

#[test]
fn test_builder_stack_size() {
    let queue = QueueBuilder::new()
        .label("big-stack")
        .stack_size(4 * 1024 * 1024)
        .build();
    let q = queue.clone();

    assert!(queue.block_on(async move {
        switch_to(&q).await;
        q.is_current()
    }));
}

#[test]
#[should_panic(expected = "stack_size must be > 0")]
fn test_builder_rejects_zero_stack() {
    let _ = QueueBuilder::new().stack_size(0);
}
