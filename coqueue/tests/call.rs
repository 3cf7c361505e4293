use coqueue::{
    Abort, Call, Completion, Error, Executor, Queue, QueueBuilder, Work, call_on, call_on_with,
    call_with_callback,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

fn queue(label: &str) -> Queue {
    let _ = env_logger::builder().is_test(true).try_init();
    QueueBuilder::new().label(label).build()
}

fn divide(a: u32, b: u32) -> u32 {
    if b == 0 {
        panic!("division by zero");
    }
    a / b
}

#[test]
fn test_call_on_runs_on_target_queue() {
    let main = queue("main");
    let worker = queue("worker");
    let (m, w) = (main.clone(), worker.clone());

    let (value, ran_on_worker, back_on_main) = main.block_on(async move {
        let probe = w.clone();
        let (value, ran_on_worker) = call_on(&w, move || (21 * 2, probe.is_current()))
            .resume_on(&m)
            .await;

        (value, ran_on_worker, m.is_current())
    });

    assert_eq!(value, 42);
    assert!(ran_on_worker);
    assert!(back_on_main);
}

#[test]
fn test_call_on_panic_is_captured() {
    let main = queue("main");
    let worker = queue("worker");
    let w = worker.clone();

    let message = main.block_on(async move {
        let failure = call_on(&w, || divide(1, 0))
            .into_result()
            .await
            .unwrap_err();
        failure.message().map(str::to_owned)
    });

    assert_eq!(message.as_deref(), Some("division by zero"));
}

#[test]
fn test_callback_resolved_from_another_thread() {
    let main = queue("main");
    let m = main.clone();

    let (value, on_main) = main.block_on(async move {
        let value = call_with_callback(|done: Completion<u32>| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                done.success(9);
            });
        })
        .resume_on(&m)
        .await;

        (value, m.is_current())
    });

    assert_eq!(value, 9);
    assert!(on_main);
}

#[test]
fn test_callback_resolved_synchronously() {
    let main = queue("main");

    let value = main.block_on(async { call_with_callback(|done| done.success("now")).await });

    assert_eq!(value, "now");
}

#[test]
fn test_setup_panic_is_delivered_without_queue_hop() {
    let main = queue("main");
    let m = main.clone();

    let (message, on_main) = main.block_on(async move {
        let call: Call<u32> = call_with_callback(|_done: Completion<u32>| {
            panic!("setup failed");
        });
        let failure = call.into_result().await.unwrap_err();

        (failure.message().map(str::to_owned), m.is_current())
    });

    assert_eq!(message.as_deref(), Some("setup failed"));
    assert!(on_main);
}

#[test]
fn test_unresolved_completion_reports_error() {
    let main = queue("main");

    let unresolved = main.block_on(async {
        let failure = call_with_callback(|done: Completion<u32>| drop(done))
            .into_result()
            .await
            .unwrap_err();

        matches!(failure.downcast_ref::<Error>(), Some(Error::Unresolved))
    });

    assert!(unresolved);
}

#[test]
fn test_completion_failure_is_reraised() {
    let main = queue("main");

    let message = main.block_on(async {
        let failure = call_with_callback(|done: Completion<u32>| done.failure("refused"))
            .into_result()
            .await
            .unwrap_err();
        failure.to_string()
    });

    assert_eq!(message, "refused");
}

#[test]
fn test_dropped_call_releases_state_on_completion() {
    let (tx, rx) = mpsc::channel::<Completion<u32>>();

    let call = call_with_callback(move |done| tx.send(done).unwrap());
    drop(call);

    rx.recv().unwrap().success(1);
}

#[test]
fn test_completion_moved_elsewhere_survives_setup_panic() {
    let main = queue("main");

    let value = main.block_on(async {
        let (tx, rx) = mpsc::channel::<Completion<u32>>();
        let resolver = thread::spawn(move || {
            if let Ok(done) = rx.recv() {
                done.success(5);
            }
        });

        let call = call_with_callback(move |done: Completion<u32>| {
            tx.send(done).unwrap();
            panic!("late setup failure");
        });
        let value = call.await;
        resolver.join().unwrap();
        value
    });

    assert_eq!(value, 5);
}

#[test]
fn test_call_on_with_abort_policy_delivers_value() {
    let main = queue("main");
    let worker = queue("worker");
    let w = worker.clone();

    let value = main.block_on(async move { call_on_with::<Abort, _, _>(&w, || "ok").await });

    assert_eq!(value, "ok");
}

/// Runs every item on a fresh thread and never recognises its own threads.
struct Blind {
    submits: Arc<AtomicUsize>,
}

impl Executor for Blind {
    fn submit(&self, work: Work) {
        self.submits.fetch_add(1, Ordering::SeqCst);
        thread::spawn(move || work.run());
    }

    fn submit_after(&self, deadline: Instant, work: Work) {
        self.submits.fetch_add(1, Ordering::SeqCst);
        thread::spawn(move || {
            thread::sleep(deadline.saturating_duration_since(Instant::now()));
            work.run();
        });
    }

    fn is_current(&self) -> bool {
        false
    }
}

#[test]
fn test_completion_dropped_by_panicking_thread_is_unresolved() {
    let main = queue("main");

    let unresolved = main.block_on(async {
        let call = call_with_callback(|done: Completion<u32>| {
            let holder = thread::spawn(move || {
                let _held = done;
                panic!("callback thread died");
            });
            let _ = holder.join();
            panic!("setup failed afterwards");
        });
        let failure = call.into_result().await.unwrap_err();

        matches!(failure.downcast_ref::<Error>(), Some(Error::Unresolved))
    });

    assert!(unresolved);
}

#[test]
fn test_ready_call_result_still_hops_to_resume_queue() {
    let main = queue("main");
    let worker = queue("worker");
    let (m, w) = (main.clone(), worker.clone());

    let observed = main.block_on(async move {
        let call = call_with_callback(|done: Completion<u32>| done.success(9));
        let value = call.resume_on(&w).await;

        (value, w.is_current(), m.is_current())
    });

    assert_eq!(observed, (9, true, false));
}

#[test]
fn test_call_values_cross_queues_intact() {
    let main = queue("main");
    let worker = queue("worker");
    let (m, w) = (main.clone(), worker.clone());

    let mismatches = main.block_on(async move {
        let mut mismatches = 0;
        for i in 0..500u64 {
            let value = call_on(&w, move || format!("value-{i}")).resume_on(&m).await;

            if value != format!("value-{i}") || !m.is_current() {
                mismatches += 1;
            }
        }
        mismatches
    });

    assert_eq!(mismatches, 0);
}

#[test]
fn test_call_resume_queue_that_cannot_recognise_itself() {
    let main = queue("main");
    let worker = queue("worker");
    let submits = Arc::new(AtomicUsize::new(0));
    let blind = Queue::new(Blind {
        submits: submits.clone(),
    });
    let (w, b) = (worker.clone(), blind.clone());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let value = main.block_on(async move { call_on(&w, || 7).resume_on(&b).await });
        let _ = tx.send(value);
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));
    let hops = submits.load(Ordering::SeqCst);
    assert!((1..=2).contains(&hops), "unexpected hop count {hops}");
}
