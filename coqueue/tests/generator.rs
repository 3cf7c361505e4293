use coqueue::{Error, Queue, QueueBuilder, Yielder, spawn_generator, spawn_task, switch_to};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn queue(label: &str) -> Queue {
    let _ = env_logger::builder().is_test(true).try_init();
    QueueBuilder::new().label(label).build()
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn explode() {
    panic!("generator broke")
}

#[test]
fn test_generator_yields_in_order_on_resume_queue() {
    let main = queue("main");
    let worker = queue("worker");
    let (m, w) = (main.clone(), worker.clone());

    let (seen, always_on_main) = main.block_on(async move {
        let numbers = spawn_generator(|co| async move {
            for i in 1..=3 {
                co.yield_(i).await;
            }
        });

        let mut cursor = numbers.resume_on(&m).begin_on(&w).await;
        let mut seen = Vec::new();
        let mut always_on_main = true;

        while let Some(value) = cursor.take() {
            always_on_main &= m.is_current();
            seen.push(value);
            cursor.advance().await.unwrap();
        }

        assert!(cursor.is_finished());
        (seen, always_on_main)
    });

    assert_eq!(seen, vec![1, 2, 3]);
    assert!(always_on_main);
}

#[test]
fn test_generator_body_runs_on_begin_queue() {
    let main = queue("main");
    let worker = queue("worker");
    let (m, w) = (main.clone(), worker.clone());

    let flags = main.block_on(async move {
        let probe = w.clone();
        let places = spawn_generator(move |co| async move {
            co.yield_(probe.is_current()).await;
            co.yield_(probe.is_current()).await;
        });

        let mut cursor = places.resume_on(&m).begin_on(&w).await;
        let mut flags = Vec::new();
        while let Some(flag) = cursor.take() {
            flags.push(flag);
            cursor.advance().await.unwrap();
        }
        flags
    });

    assert_eq!(flags, vec![true, true]);
}

#[test]
fn test_generator_never_begun_never_runs() {
    let ran = Arc::new(AtomicBool::new(false));
    let drops = Arc::new(AtomicUsize::new(0));
    let flag = ran.clone();
    let guard = DropCounter(drops.clone());

    let numbers = spawn_generator(move |co: Yielder<u8>| async move {
        let _guard = guard;
        flag.store(true, Ordering::SeqCst);
        co.yield_(1).await;
    });
    drop(numbers);

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_abandon_between_yields_never_resumes_producer() {
    let main = queue("main");
    let resumed = Arc::new(AtomicBool::new(false));
    let drops = Arc::new(AtomicUsize::new(0));
    let flag = resumed.clone();
    let guard = DropCounter(drops.clone());

    let first = main.block_on(async move {
        let numbers = spawn_generator(move |co| async move {
            let _guard = guard;
            co.yield_(1).await;
            flag.store(true, Ordering::SeqCst);
            co.yield_(2).await;
        });

        let mut cursor = numbers.begin_sync().await;
        cursor.take()
    });

    assert_eq!(first, Some(1));
    assert!(!resumed.load(Ordering::SeqCst));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stale_and_consumed_tokens_are_rejected() {
    let main = queue("main");

    main.block_on(async {
        let numbers = spawn_generator(|co| async move {
            co.yield_(1).await;
            co.yield_(2).await;
        });

        let mut cursor = numbers.begin_sync().await;
        let first = cursor.token().unwrap();
        cursor.advance().await.unwrap();

        assert!(matches!(cursor.read(first), Err(Error::StaleToken)));

        let second = cursor.token().unwrap();
        assert_eq!(cursor.read(second).unwrap(), 2);
        assert!(matches!(cursor.read(second), Err(Error::TokenConsumed)));
    });
}

#[test]
fn test_empty_generator_is_finished_immediately() {
    let main = queue("main");

    main.block_on(async {
        let nothing = spawn_generator(|_co: Yielder<u32>| async move {});

        let mut cursor = nothing.begin_sync().await;

        assert!(cursor.is_finished());
        assert_eq!(cursor.token(), None);
        assert!(matches!(cursor.advance().await, Err(Error::Finished)));
    });
}

#[test]
fn test_advance_past_end_reports_finished() {
    let main = queue("main");
    let worker = queue("worker");
    let w = worker.clone();

    main.block_on(async move {
        let one = spawn_generator(|co| async move { co.yield_("only").await });

        let mut cursor = one.begin_on(&w).await;
        assert_eq!(cursor.take(), Some("only"));

        cursor.advance().await.unwrap();
        assert!(cursor.is_finished());
        assert!(matches!(cursor.advance().await, Err(Error::Finished)));
    });
}

#[test]
fn test_generator_panic_is_reraised_on_advance() {
    let main = queue("main");

    let message = main.block_on(async {
        let numbers = spawn_generator(|co| async move {
            co.yield_(1).await;
            explode();
        });

        let mut cursor = numbers.begin_sync().await;
        assert_eq!(cursor.take(), Some(1));

        let failure = spawn_task(async move { cursor.advance().await })
            .into_result()
            .await
            .unwrap_err();
        failure.message().map(str::to_owned)
    });

    assert_eq!(message.as_deref(), Some("generator broke"));
}

#[test]
fn test_inner_await_does_not_end_a_cycle() {
    let main = queue("main");
    let worker = queue("worker");
    let w = worker.clone();

    let value = main.block_on(async move {
        let probe = w.clone();
        let hopping = spawn_generator(move |co| async move {
            switch_to(&probe).await;
            co.yield_(probe.is_current()).await;
        });

        let mut cursor = hopping.begin_sync().await;
        cursor.take()
    });

    assert_eq!(value, Some(true));
}

#[test]
fn test_unread_values_are_discarded_on_advance() {
    let main = queue("main");

    let last = main.block_on(async {
        let numbers = spawn_generator(|co| async move {
            for i in 0..5 {
                co.yield_(i).await;
            }
        });

        let mut cursor = numbers.begin_sync().await;
        let mut last = None;
        while !cursor.is_finished() {
            last = cursor.token();
            cursor.advance().await.unwrap();
        }
        last.map(|_| ())
    });

    assert_eq!(last, Some(()));
}

#[test]
#[should_panic(expected = "yield awaited outside of its generator body")]
fn test_yield_from_nested_task_panics() {
    let main = queue("main");

    main.block_on(async {
        let numbers = spawn_generator(|co: Yielder<u32>| async move {
            spawn_task(async move { co.yield_(1).await }).await;
        });

        let _cursor = numbers.begin_sync().await;
    });
}
