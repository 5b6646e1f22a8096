// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接状态机
//!
//! 每个被接受的 TCP 连接由一个 [`Connection`] 负责，状态流转如下：
//!
//! ```text
//! AWAIT_REQUEST -> PARSE -> ROUTE -> {SERVE_FILE | SERVE_DIR | SERVE_404 | HANDLE_POST}
//!               -> RESPOND -> (保持连接 ? AWAIT_REQUEST : CLOSED)
//! ```
//!
//! - 等待请求时使用配置的空闲超时，超时、出错或对端关闭都会结束连接；
//! - 请求头超过上限返回 `431`，请求体超过上限返回 `413`，之后关闭连接；
//! - 不支持的方法返回 `405`，无法解析的请求返回 `404` 页面；
//! - 只有配置允许且请求的 `Connection` 恰好为 `keep-alive` 时才保持连接。

use std::fs::{self, Metadata};
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, error, info, warn};

use crate::cache::PageCache;
use crate::config::Config;
use crate::exception::Exception;
use crate::files::{self, FsStore, Store};
use crate::mime;
use crate::net::{self, Readiness};
use crate::param::{HttpRequestMethod, MAX_DIR_PAGE_SIZE, READ_CHUNK_SIZE};
use crate::request::{find_header_end, Request};
use crate::response::Response;
use crate::util::HtmlBuilder;

const LINGER_TIMEOUT: Duration = Duration::from_millis(500);
const LINGER_MAX_BYTES: usize = 4 * 1024 * 1024;

/// 所有连接共享的只读上下文。目录页缓存是其中唯一需要加锁的部分。
pub struct ServerContext {
    config: Config,
    store: FsStore,
    cache: Option<Mutex<PageCache>>,
}

impl ServerContext {
    pub fn new(config: Config) -> Self {
        let store = FsStore::new(config.www_root());
        let cache = if config.enable_cache() {
            Some(Mutex::new(PageCache::from_capacity(config.cache_size())))
        } else {
            None
        };
        Self {
            config,
            store,
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &FsStore {
        &self.store
    }
}

/// 路由结果
#[derive(Debug)]
enum Route {
    File(PathBuf),
    Dir(PathBuf, Metadata),
    NotFound,
}

/// 一次读取请求头的结果
enum Incoming {
    /// 读到了完整的请求头（或对端在结束标记之前关闭了写端）
    Request(Vec<u8>),
    /// 对端没有发送任何数据就关闭了连接
    Closed,
    /// 在上限之内没有找到结束标记
    HeaderTooLarge,
}

/// 连接处理的结果：是否继续等待下一个请求
type Outcome = io::Result<bool>;

pub struct Connection<'a> {
    stream: TcpStream,
    peer: SocketAddr,
    id: u128,
    context: &'a ServerContext,
}

impl<'a> Connection<'a> {
    pub fn new(stream: TcpStream, peer: SocketAddr, id: u128, context: &'a ServerContext) -> Self {
        Self {
            stream,
            peer,
            id,
            context,
        }
    }

    /// 处理这个连接直到关闭。连接上的错误只影响它自己，记录日志后关闭。
    pub fn serve(mut self) {
        let id = self.id;
        debug!("[ID{}]TCP连接已建立：{}", id, self.peer);
        let idle_timeout = self.context.config.idle_timeout();

        loop {
            match net::wait_readable(&self.stream, idle_timeout) {
                Ok(Readiness::Ready) => {}
                Ok(Readiness::TimedOut) => {
                    debug!("[ID{}]等待请求超时，关闭连接", id);
                    break;
                }
                Ok(Readiness::Closed) => {
                    debug!("[ID{}]客户端关闭了连接", id);
                    break;
                }
                Err(e) => {
                    error!("[ID{}]等待请求时遇到错误：{}", id, e);
                    break;
                }
            }

            match self.handle_request() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    error!("[ID{}]处理请求时遇到错误，连接被中止：{}", id, e);
                    break;
                }
            }
        }
        debug!("[ID{}]TCP连接已关闭", id);
    }

    fn handle_request(&mut self) -> Outcome {
        let id = self.id;
        let context = self.context;
        let config = &context.config;

        let buffer = match self.read_head()? {
            Incoming::Request(buffer) => buffer,
            Incoming::Closed => return Ok(false),
            Incoming::HeaderTooLarge => {
                warn!("[ID{}]请求头超过{}字节，返回431", id, config.max_header_size());
                return self.reject(Response::response_431(id));
            }
        };
        let start_time = Instant::now();

        let mut request = match Request::try_from(&buffer, id) {
            Ok(req) => req,
            Err(Exception::UnSupportedRequestMethod) => {
                return self.reject(Response::response_405(id));
            }
            Err(e) => {
                warn!("[ID{}]无法解析HTTP请求（{}），返回404", id, e);
                return self.reject(Response::response_404(id));
            }
        };
        debug!("[ID{}]成功解析HTTP请求", id);

        if request.method() == HttpRequestMethod::Post {
            if let Err(Exception::BodyTooLarge) = self.read_body(&mut request)? {
                warn!("[ID{}]请求体超过{}字节，返回413", id, config.max_body_size());
                return self.reject(Response::response_413(id));
            }
        }

        let keep_alive = config.enable_keep_alive() && request.wants_keep_alive();

        let mut response = self.respond_to(&request)?;
        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );
        info!(
            "[ID{}] {}, {}, {}, {}, {}, {}",
            id,
            request.version(),
            request.path(),
            request.method(),
            response.status_code(),
            response.information(),
            request.host().unwrap_or("-"),
        );

        response.set_keep_alive(if keep_alive {
            Some(config.idle_timeout_secs())
        } else {
            None
        });
        response.write_to(&mut self.stream)?;
        Ok(keep_alive)
    }

    /// 发送一个错误响应，随后关闭连接
    fn reject(&mut self, response: Response) -> Outcome {
        info!(
            "[ID{}] {}, {}",
            self.id,
            response.status_code(),
            response.information()
        );
        response.write_to(&mut self.stream)?;
        self.linger();
        Ok(false)
    }

    // 关闭写端后丢弃客户端尚未发送完的数据，
    // 否则带着未读数据关闭 Socket 会触发 RST，客户端可能收不到错误响应
    fn linger(&mut self) {
        if self.stream.shutdown(Shutdown::Write).is_err() {
            return;
        }
        if self.stream.set_read_timeout(Some(LINGER_TIMEOUT)).is_err() {
            return;
        }
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut discarded = 0;
        while discarded < LINGER_MAX_BYTES {
            match self.stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n,
            }
        }
        debug!("[ID{}]关闭前丢弃了{}字节未读数据", self.id, discarded);
    }

    /// 读取直到第一个 `\r\n\r\n`，缓冲区不超过 `max_header_size`。
    fn read_head(&mut self) -> io::Result<Incoming> {
        let limit = self.context.config.max_header_size();
        let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE.min(limit));
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let want = READ_CHUNK_SIZE.min(limit - buffer.len().min(limit)).max(1);
            let n = match self.stream.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                return Ok(if buffer.is_empty() {
                    Incoming::Closed
                } else {
                    debug!("[ID{}]客户端在请求头结束之前关闭了写端", self.id);
                    Incoming::Request(buffer)
                });
            }
            // 结束标记可能跨越两次读取
            let search_from = buffer.len().saturating_sub(3);
            buffer.extend_from_slice(&chunk[..n]);
            if find_header_end(&buffer[search_from..]).is_some() {
                return Ok(Incoming::Request(buffer));
            }
            if buffer.len() >= limit {
                return Ok(Incoming::HeaderTooLarge);
            }
        }
    }

    /// 按 `Content-Length` 读完请求体。超过上限时不再读取，返回 `BodyTooLarge`。
    fn read_body(&mut self, request: &mut Request) -> io::Result<Result<(), Exception>> {
        let limit = self.context.config.max_body_size();
        let declared = request.content_length().unwrap_or(0);
        if declared > limit || request.body().len() > limit {
            return Ok(Err(Exception::BodyTooLarge));
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while request.remaining_body() > 0 {
            let want = request.remaining_body().min(READ_CHUNK_SIZE);
            match self.stream.read(&mut chunk[..want]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "请求体尚未接收完整，客户端已关闭连接",
                    ))
                }
                Ok(n) => request.extend_body(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        debug!("[ID{}]请求体接收完毕，共{}字节", self.id, request.body().len());
        Ok(Ok(()))
    }

    fn respond_to(&self, request: &Request) -> io::Result<Response> {
        let id = self.id;
        let store = &self.context.store;
        let path = request.resource_path();

        let segments = match files::path_segments(path) {
            Ok(segments) => segments,
            Err(e) => {
                warn!("[ID{}]请求的路径：{} 不合法（{}），返回404", id, path, e);
                return Ok(Response::response_404(id));
            }
        };
        let target = store.resolve_segments(&segments);
        let canonical = files::canonical_path(&segments);

        if request.method() == HttpRequestMethod::Post {
            match files::persist(store, &canonical, &target, request.body(), id) {
                Ok(()) => {}
                Err(Exception::StorageFailed) => return Ok(Response::response_500(id)),
                Err(_) => return Ok(Response::response_404(id)),
            }
        }

        match route(&target) {
            Route::File(file) => {
                debug!("[ID{}]请求的路径是文件", id);
                Response::from_file(&file, mime::content_type_of(&canonical), id).map_err(|e| {
                    error!("[ID{}]无法打开文件{}：{}", id, file.display(), e);
                    e
                })
            }
            Route::Dir(dir, metadata) => {
                debug!("[ID{}]请求的路径是目录", id);
                self.serve_dir(&segments, &dir, &metadata)
            }
            Route::NotFound => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path);
                Ok(Response::response_404(id))
            }
        }
    }

    fn serve_dir(&self, segments: &[String], dir: &Path, metadata: &Metadata) -> io::Result<Response> {
        let id = self.id;
        let modified = metadata.modified().ok();

        if let (Some(cache), Some(modified)) = (&self.context.cache, modified) {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(page) = cache.find(dir, modified) {
                debug!("[ID{}]目录页缓存命中", id);
                return Ok(Response::from_html(page));
            }
        }

        let mut entries = self.context.store.list_dir(dir).map_err(|e| {
            error!("[ID{}]无法读取目录{}：{}", id, dir.display(), e);
            e
        })?;
        let (builder, omitted) = HtmlBuilder::from_dir(segments, &mut entries, MAX_DIR_PAGE_SIZE);
        if omitted > 0 {
            warn!("[ID{}]目录{}条目过多，{}个条目未显示", id, dir.display(), omitted);
        }
        let page = Bytes::from(builder.build());

        if let (Some(cache), Some(modified)) = (&self.context.cache, modified) {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.push(dir, page.clone(), modified);
        }
        Ok(Response::from_html(page))
    }
}

fn route(target: &Path) -> Route {
    match fs::metadata(target) {
        Ok(metadata) if metadata.is_dir() => Route::Dir(target.to_path_buf(), metadata),
        Ok(metadata) if metadata.is_file() => Route::File(target.to_path_buf()),
        Ok(_) | Err(_) => Route::NotFound,
    }
}
