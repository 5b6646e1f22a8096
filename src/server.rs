// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 接收器
//!
//! 持有监听 Socket，把每个被接受的连接包装成任务交给线程池；
//! 线程池被禁用时直接在接收线程上处理。

use std::io::{self, Read};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::connection::{Connection, ServerContext};
use crate::exception::Exception;
use crate::mime;
use crate::net;
use crate::param::{LISTEN_BACKLOG, READ_CHUNK_SIZE};
use crate::pool::ThreadPool;
use crate::response::Response;

// accept 失败（例如文件描述符耗尽）后的等待时间
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<ServerContext>,
    pool: Option<Arc<ThreadPool>>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

/// 从其它线程观察和停止服务器
#[derive(Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    pool: Option<Weak<ThreadPool>>,
}

/// 线程池的瞬时状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub active_workers: usize,
    pub working_workers: usize,
    pub queued_tasks: usize,
}

// 任务结束（包括 panic）时减少活跃连接数
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    pub fn new(config: Config) -> Result<Self, Exception> {
        let config = config.normalized();
        mime::init();

        let port = config.port();
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        info!("www root: {}", config.www_root());

        let pool = match config.enable_thread_pool() {
            true => Some(Arc::new(ThreadPool::new(config.worker_threads())?)),
            false => {
                info!("线程池已禁用，所有连接将在接收线程上依次处理");
                None
            }
        };
        let context = Arc::new(ServerContext::new(config));

        let socket = SocketAddr::V4(SocketAddrV4::new(address, port));
        let listener = match net::bind_listener(socket, LISTEN_BACKLOG) {
            Ok(listener) => listener,
            Err(e) => {
                error!("无法绑定端口：{}，错误：{}", port, e);
                return Err(Exception::BindFailed);
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("无法获取监听地址：{}", e);
                return Err(Exception::BindFailed);
            }
        };
        info!("服务端将在{}上监听Socket连接", local_addr);

        Ok(Self {
            listener,
            local_addr,
            context,
            pool,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            local_addr: self.local_addr,
            shutdown: Arc::clone(&self.shutdown),
            active: Arc::clone(&self.active),
            pool: self.pool.as_ref().map(Arc::downgrade),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 接收循环。收到停机信号后等待队列中的任务全部完成，再销毁线程池。
    pub fn run(self) {
        let mut id: u128 = 0;

        loop {
            let accepted = self.listener.accept();

            // 检查停机标志位
            if self.shutdown.load(Ordering::SeqCst) {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }

            let (stream, peer) = match accepted_or_backoff(accepted) {
                Some(pair) => pair,
                None => continue,
            };
            id += 1;
            debug!("[ID{}]新的连接：{}", id, peer);
            self.dispatch(stream, peer, id);
        }

        if let Some(pool) = self.pool {
            pool.wait();
            match Arc::try_unwrap(pool) {
                Ok(pool) => pool.destroy(),
                Err(_) => warn!("线程池仍被其它线程引用，将在最后一个引用释放时销毁"),
            }
        }
        info!("服务器已停止");
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr, id: u128) {
        let context = Arc::clone(&self.context);
        let active = Arc::clone(&self.active);

        let pool = match &self.pool {
            Some(pool) => pool,
            None => {
                let _guard = ActiveGuard::enter(&active);
                Connection::new(stream, peer, id, &context).serve();
                return;
            }
        };

        let limit = self.context.config().max_queue_size();
        if limit == 0 {
            pool.add_task(move || {
                let _guard = ActiveGuard::enter(&active);
                Connection::new(stream, peer, id, &context).serve();
            });
            return;
        }

        // 任务被拒绝时闭包连同 stream 一起被丢弃，需要保留一个副本来发送 503
        let reply = stream.try_clone();
        let submitted = pool.try_add_task(
            move || {
                let _guard = ActiveGuard::enter(&active);
                Connection::new(stream, peer, id, &context).serve();
            },
            limit,
        );
        if let Err(Exception::QueueFull) = submitted {
            warn!("[ID{}]任务队列已满（{}），返回503", id, limit);
            match reply {
                Ok(mut stream) => {
                    if let Err(e) = Response::response_503(id).write_to(&mut stream) {
                        error!("[ID{}]发送503响应失败：{}", id, e);
                    }
                    discard_pending(&mut stream);
                }
                Err(e) => error!("[ID{}]无法复制连接句柄：{}", id, e),
            }
        }
    }
}

// accept 出错时暂停一段时间再重试，避免接收线程空转并刷满日志
fn accepted_or_backoff(
    accepted: io::Result<(TcpStream, SocketAddr)>,
) -> Option<(TcpStream, SocketAddr)> {
    match accepted {
        Ok(pair) => Some(pair),
        Err(e) => {
            error!("接受连接时遇到错误：{}，{}ms后重试", e, ACCEPT_BACKOFF.as_millis());
            thread::sleep(ACCEPT_BACKOFF);
            None
        }
    }
}

// 不阻塞接收线程，只丢弃已经到达的请求数据，减少关闭时触发 RST 的机会
fn discard_pending(stream: &mut TcpStream) {
    let _ = stream.shutdown(Shutdown::Write);
    if stream.set_nonblocking(true).is_err() {
        return;
    }
    let mut sink = [0u8; READ_CHUNK_SIZE];
    while let Ok(n) = stream.read(&mut sink) {
        if n == 0 {
            break;
        }
    }
}

impl ServerHandle {
    /// 发出停机信号，并唤醒阻塞在 `accept` 上的接收线程
    pub fn stop(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut wake_addr = self.local_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(Ipv4Addr::LOCALHOST.into());
        }
        match TcpStream::connect_timeout(&wake_addr, Duration::from_secs(1)) {
            Ok(_) => debug!("已唤醒接收线程"),
            Err(e) => warn!("无法唤醒接收线程：{}", e),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 线程池被禁用或已经销毁时返回 `None`
    pub fn pool_status(&self) -> Option<PoolStatus> {
        let pool = self.pool.as_ref()?.upgrade()?;
        Some(PoolStatus {
            active_workers: pool.active_workers(),
            working_workers: pool.working_workers(),
            queued_tasks: pool.queued_tasks(),
        })
    }
}
