// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 线程池行为测试
//!
//! 覆盖任务恰好执行一次、单线程下的先进先出顺序、`wait` 的排空语义、
//! 协作式缩容以及销毁时对排队任务的处理。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tinyserver::{Exception, ThreadPool};

/// 提交一个阻塞任务占住工作线程，返回放行用的发送端。函数返回时任务已开始执行。
fn occupy(pool: &ThreadPool) -> mpsc::Sender<()> {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    pool.add_task(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    });
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("阻塞任务没有开始执行");
    release_tx
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_every_task_runs_exactly_once() {
    let pool = ThreadPool::new(4).unwrap();
    let hits: Arc<Vec<AtomicUsize>> = Arc::new((0..200).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..200 {
        let hits = Arc::clone(&hits);
        pool.add_task(move || {
            hits[i].fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.wait();

    assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
    assert_eq!(pool.queued_tasks(), 0);
    assert_eq!(pool.working_workers(), 0);
}

#[test]
fn test_single_worker_runs_tasks_in_submission_order() {
    let pool = ThreadPool::new(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let release = occupy(&pool);
    for i in 0..20 {
        let order = Arc::clone(&order);
        pool.add_task(move || order.lock().unwrap().push(i));
    }
    assert_eq!(pool.queued_tasks(), 20);
    release.send(()).unwrap();
    pool.wait();

    assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
}

#[test]
fn test_wait_blocks_until_tasks_finish() {
    let pool = ThreadPool::new(2).unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..6 {
        let done = Arc::clone(&done);
        pool.add_task(move || {
            thread::sleep(Duration::from_millis(30));
            done.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.wait();

    assert_eq!(done.load(Ordering::SeqCst), 6);
}

#[test]
fn test_shrink_retires_idle_workers() {
    let pool = ThreadPool::new(4).unwrap();

    assert_eq!(pool.shrink(2), 2);
    assert!(wait_until(|| pool.active_workers() == 2));

    // 至少保留一个工作线程
    assert_eq!(pool.shrink(10), 1);
    assert!(wait_until(|| pool.active_workers() == 1));

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    pool.add_task(move || flag.store(true, Ordering::SeqCst));
    pool.wait();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_shrink_does_not_interrupt_running_task() {
    let pool = ThreadPool::new(2).unwrap();
    let finished = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&finished);
    let (started_tx, started_rx) = mpsc::channel();
    pool.add_task(move || {
        started_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
        flag.store(true, Ordering::SeqCst);
    });
    started_rx.recv().unwrap();

    assert_eq!(pool.shrink(1), 1);
    pool.wait();
    assert!(finished.load(Ordering::SeqCst));
    assert!(wait_until(|| pool.active_workers() == 1));
}

#[test]
fn test_grow_adds_workers() {
    let pool = ThreadPool::new(1).unwrap();
    assert_eq!(pool.grow(3), 3);
    assert_eq!(pool.active_workers(), 4);

    let release: Vec<_> = (0..4).map(|_| occupy(&pool)).collect();
    assert_eq!(pool.working_workers(), 4);
    for tx in release {
        tx.send(()).unwrap();
    }
    pool.wait();
}

#[test]
fn test_destroy_discards_queued_tasks() {
    let pool = ThreadPool::new(1).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    let release = occupy(&pool);
    for _ in 0..5 {
        let ran = Arc::clone(&ran);
        pool.add_task(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });
    }

    // 在停机标志写入之后才放行正在执行的任务
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        let _ = release.send(());
    });
    pool.destroy();
    releaser.join().unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_wait_then_destroy_runs_everything() {
    let pool = ThreadPool::new(2).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let ran = Arc::clone(&ran);
        pool.add_task(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.wait();
    pool.destroy();

    assert_eq!(ran.load(Ordering::SeqCst), 10);
}

#[test]
fn test_try_add_task_respects_limit() {
    let pool = ThreadPool::new(1).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    let refused_ran = Arc::new(AtomicBool::new(false));

    let release = occupy(&pool);
    for _ in 0..2 {
        let ran = Arc::clone(&ran);
        let accepted = pool.try_add_task(
            move || {
                ran.fetch_add(1, Ordering::SeqCst);
            },
            2,
        );
        assert_eq!(accepted, Ok(()));
    }

    let flag = Arc::clone(&refused_ran);
    let refused = pool.try_add_task(move || flag.store(true, Ordering::SeqCst), 2);
    assert_eq!(refused, Err(Exception::QueueFull));

    // limit 为 0 表示不限制
    let ran_unbounded = Arc::clone(&ran);
    assert_eq!(
        pool.try_add_task(
            move || {
                ran_unbounded.fetch_add(1, Ordering::SeqCst);
            },
            0
        ),
        Ok(())
    );

    release.send(()).unwrap();
    pool.wait();
    assert_eq!(ran.load(Ordering::SeqCst), 3);
    assert!(!refused_ran.load(Ordering::SeqCst));
}

#[test]
fn test_panicking_task_does_not_kill_worker() {
    let pool = ThreadPool::new(1).unwrap();
    pool.add_task(|| panic!("任务内部错误"));
    pool.wait();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    pool.add_task(move || flag.store(true, Ordering::SeqCst));
    pool.wait();

    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(pool.active_workers(), 1);
}
