use coqueue::{Queue, QueueBuilder, spawn_task, switch_to, switch_to_after};
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn queue(label: &str) -> Queue {
    let _ = env_logger::builder().is_test(true).try_init();
    QueueBuilder::new().label(label).build()
}

#[test]
fn test_switch_to_moves_execution() {
    let main = queue("main");
    let worker = queue("worker");
    let (m, w) = (main.clone(), worker.clone());

    let places = main.block_on(async move {
        let start = m.is_current();
        switch_to(&w).await;
        let moved = (w.is_current(), m.is_current());
        switch_to(&m).await;

        (start, moved, m.is_current())
    });

    assert_eq!(places, (true, (true, false), true));
}

#[test]
fn test_switch_to_current_queue_still_suspends() {
    let main = queue("main");
    let m = main.clone();

    let order = main.block_on(async move {
        let (tx, rx) = mpsc::channel();
        let queued = tx.clone();

        m.submit(move || queued.send("queued").unwrap());
        switch_to(&m).await;
        tx.send("switched").unwrap();
        drop(tx);

        rx.iter().collect::<Vec<_>>()
    });

    assert_eq!(order, vec!["queued", "switched"]);
}

#[test]
fn test_switch_to_after_waits_for_deadline() {
    let main = queue("main");
    let worker = queue("worker");
    let w = worker.clone();

    let (late_enough, on_worker) = main.block_on(async move {
        let deadline = Instant::now() + Duration::from_millis(40);
        switch_to_after(&w, deadline).await;

        (Instant::now() >= deadline, w.is_current())
    });

    assert!(late_enough);
    assert!(on_worker);
}

#[test]
fn test_switch_inside_spawned_task() {
    let worker = queue("worker");
    let w = worker.clone();
    let (tx, rx) = mpsc::channel();

    drop(spawn_task(async move {
        let before = w.is_current();
        switch_to(&w).await;
        tx.send((before, w.is_current())).unwrap();
    }));

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok((false, true)));
}
