// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 工作线程池
//!
//! 固定数量的长期工作线程，从同一个任务队列中取任务执行。
//!
//! 队列和所有计数器都放在同一把互斥锁之后，配合两个条件变量：
//! - `task_available`：有新任务、线程池停止或有线程需要退役时唤醒工作线程；
//! - `all_idle`：队列为空并且没有线程在执行任务时唤醒 `wait()` 的调用者。
//!
//! 不变式：`0 <= working <= active`，计数器只在持锁时修改。

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::exception::Exception;
use crate::param::DEFAULT_POOL_SIZE;
use crate::queue::TaskQueue;

/// 提交给线程池的任务。闭包拥有自己的参数，执行后或线程池销毁时被释放，且只释放一次。
pub type Task = Box<dyn FnOnce() + Send + 'static>;

type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// 创建工作线程的方式。第一个参数是线程序号。
type Spawner = dyn Fn(usize, WorkerBody) -> io::Result<JoinHandle<()>> + Send + Sync;

struct PoolState {
    queue: TaskQueue<Task>,
    /// 存活且参与取任务的线程数
    active: usize,
    /// 正在执行任务的线程数
    working: usize,
    /// 被标记为需要退役、但还没有退出的线程数
    retiring: usize,
    running: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    task_available: Condvar,
    all_idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // 任务在锁外执行且被 catch_unwind 包裹，锁被毒化时状态依然一致
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 计数门闩：每个新线程启动后到达一次，创建者等待到达数达到预期。
struct Latch {
    arrived: Mutex<usize>,
    cond: Condvar,
}

impl Latch {
    fn new() -> Self {
        Self {
            arrived: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    fn arrive(&self) {
        let mut arrived = self.arrived.lock().unwrap_or_else(PoisonError::into_inner);
        *arrived += 1;
        self.cond.notify_all();
    }

    fn wait_for(&self, expected: usize) {
        let mut arrived = self.arrived.lock().unwrap_or_else(PoisonError::into_inner);
        while *arrived < expected {
            arrived = self
                .cond
                .wait(arrived)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// 线程池。
///
/// `destroy()`（以及 `Drop`）不会等待队列排空：仍在排队的任务会被直接丢弃。
/// 需要所有任务都执行完毕时，应先调用 `wait()`。
pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_index: Mutex<usize>,
    spawner: Box<Spawner>,
}

impl ThreadPool {
    /// 创建含有 `size` 个工作线程的线程池，`size` 为 0 时使用 [`DEFAULT_POOL_SIZE`]。
    ///
    /// 任意一个线程创建失败时，已经创建的线程会被唤醒并回收，返回 `PoolCreationFailed`。
    /// 成功返回时所有线程都已经启动完毕。
    pub fn new(size: usize) -> Result<Self, Exception> {
        Self::with_spawner(
            size,
            Box::new(|index, body| {
                thread::Builder::new()
                    .name(format!("tinyserver-worker-{}", index))
                    .spawn(body)
            }),
        )
    }

    fn with_spawner(size: usize, spawner: Box<Spawner>) -> Result<Self, Exception> {
        let size = if size == 0 { DEFAULT_POOL_SIZE } else { size };
        let pool = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    queue: TaskQueue::new(),
                    active: 0,
                    working: 0,
                    retiring: 0,
                    running: true,
                }),
                task_available: Condvar::new(),
                all_idle: Condvar::new(),
            }),
            handles: Mutex::new(Vec::with_capacity(size)),
            next_index: Mutex::new(0),
            spawner,
        };

        let latch = Arc::new(Latch::new());
        for _ in 0..size {
            if let Err(e) = pool.spawn_worker(&latch) {
                error!("工作线程创建失败，正在回收已创建的线程：{}", e);
                // pool 在此处被丢弃，Drop 会停止并回收已经创建的线程
                return Err(Exception::PoolCreationFailed);
            }
        }
        latch.wait_for(size);
        info!("线程池已创建，共{}个工作线程", size);
        Ok(pool)
    }

    fn spawn_worker(&self, latch: &Arc<Latch>) -> io::Result<()> {
        let index = {
            let mut next = self.next_index.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        let shared = Arc::clone(&self.shared);
        let latch = Arc::clone(latch);
        let handle = (self.spawner)(index, Box::new(move || worker_loop(shared, latch, index)))?;
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    /// 提交一个任务。总是成功。
    pub fn add_task<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let task: Task = Box::new(f);
        let mut state = self.shared.lock();
        state.queue.enqueue(task);
        self.shared.task_available.notify_one();
    }

    /// 提交一个任务，但当 `limit > 0` 且队列中已有 `limit` 个任务时拒绝，
    /// 返回 `QueueFull`，被拒绝的任务不会被执行。
    pub fn try_add_task<F>(&self, f: F, limit: usize) -> Result<(), Exception>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();
        if limit > 0 && state.queue.len() >= limit {
            return Err(Exception::QueueFull);
        }
        state.queue.enqueue(Box::new(f));
        self.shared.task_available.notify_one();
        Ok(())
    }

    /// 阻塞直到队列为空且没有线程在执行任务。
    pub fn wait(&self) {
        let mut state = self.shared.lock();
        while !state.queue.is_empty() || state.working > 0 {
            state = self
                .shared
                .all_idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 增加 `n` 个工作线程，返回实际增加的数量。个别线程创建失败只记录日志。
    pub fn grow(&self, n: usize) -> usize {
        let latch = Arc::new(Latch::new());
        let mut added = 0;
        for _ in 0..n {
            match self.spawn_worker(&latch) {
                Ok(()) => added += 1,
                Err(e) => warn!("扩充线程池时创建工作线程失败：{}", e),
            }
        }
        latch.wait_for(added);
        self.reap_finished();
        info!("线程池扩充了{}个工作线程", added);
        added
    }

    /// 让最多 `n` 个工作线程退役，返回被标记的数量。
    ///
    /// 退役是协作式的：线程在下一次检查队列时退出，不会中断正在执行的任务。
    /// 线程池至少保留一个工作线程。
    pub fn shrink(&self, n: usize) -> usize {
        let mut state = self.shared.lock();
        let remaining = state.active.saturating_sub(state.retiring);
        let earmarked = n.min(remaining.saturating_sub(1));
        state.retiring += earmarked;
        self.shared.task_available.notify_all();
        drop(state);
        debug!("{}个工作线程被标记为退役", earmarked);
        earmarked
    }

    /// 停止线程池：唤醒并回收所有线程，丢弃仍在排队的任务。
    pub fn destroy(self) {
        drop(self);
    }

    pub fn active_workers(&self) -> usize {
        self.shared.lock().active
    }

    pub fn working_workers(&self) -> usize {
        self.shared.lock().working
    }

    pub fn queued_tasks(&self) -> usize {
        self.shared.lock().queue.len()
    }

    fn reap_finished(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.running = false;
            self.shared.task_available.notify_all();
        }

        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if handle.join().is_err() {
                error!("工作线程异常退出");
            }
        }

        let pending = std::mem::take(&mut self.shared.lock().queue);
        if !pending.is_empty() {
            warn!("线程池销毁时仍有{}个任务未执行，已被丢弃", pending.len());
        }
        drop(pending);
        debug!("线程池已销毁");
    }
}

fn worker_loop(shared: Arc<Shared>, latch: Arc<Latch>, index: usize) {
    shared.lock().active += 1;
    latch.arrive();
    debug!("工作线程{}已启动", index);

    loop {
        let task = {
            let mut state = shared.lock();
            while state.queue.is_empty() && state.running && state.retiring == 0 {
                state = shared
                    .task_available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if !state.running {
                state.active -= 1;
                break;
            }
            if state.retiring > 0 {
                state.retiring -= 1;
                state.active -= 1;
                debug!("工作线程{}退役", index);
                break;
            }
            match state.queue.dequeue() {
                Some(task) => {
                    state.working += 1;
                    task
                }
                None => continue,
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("工作线程{}执行的任务发生了panic", index);
        }

        let mut state = shared.lock();
        state.working -= 1;
        if state.queue.is_empty() && state.working == 0 {
            shared.all_idle.notify_all();
        }
    }
}
