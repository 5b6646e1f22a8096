// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `tinyserver` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 服务器用到的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 扩展名到 MIME 类型的映射表。
//! - 线程池、监听队列与缓冲区的各项上限。
//! - HTTP 方法与版本的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "tinyserver";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 请求头与请求体之间的分隔符
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 线程池大小为 0 时使用的默认工作线程数
pub const DEFAULT_POOL_SIZE: usize = 32;

/// `listen` 的 backlog 长度
pub const LISTEN_BACKLOG: i32 = 1000;

/// 保持连接时等待下一个请求的默认秒数
pub const DEFAULT_IDLE_TIMEOUT: u64 = 10;

/// 请求头缓冲区的默认上限（字节）
pub const MAX_HEADER_SIZE: usize = 100_000;

/// POST 请求体的默认上限（字节）
pub const MAX_BODY_SIZE: usize = 1_000_000;

/// 目录列表页面的上限（字节），超出的条目不再渲染
pub const MAX_DIR_PAGE_SIZE: usize = 256 * 1024;

/// 每次从 Socket 读取的块大小
pub const READ_CHUNK_SIZE: usize = 8192;

/// 无法识别扩展名时使用的兜底类型
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// JSON 资源的 MIME 类型。POST 到该类型的资源时执行数组追加而非覆盖。
pub const JSON_MIME_TYPE: &str = "application/json";

lazy_static! {
    /// 服务器允许处理的 HTTP 方法列表，用于 405 响应的 `Allow` 字段。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> =
        vec![HttpRequestMethod::Get, HttpRequestMethod::Post];
}

lazy_static! {
    /// 服务器会发出的状态码与其原因短语。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = [
        (200, "OK"),
        (400, "Bad Request"),
        (404, "Not Found"),
        (405, "Method Not Allowed"),
        (413, "Content Too Large"),
        (431, "Request Header Fields Too Large"),
        (500, "Internal Server Error"),
        (503, "Service Unavailable"),
    ]
    .into_iter()
    .collect();
}

lazy_static! {
    /// 文件后缀名（小写）到 MIME 类型的映射表。
    ///
    /// 进程内只构建一次，之后只读，查询时无需加锁。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = [
        ("html", "text/html"),
        ("htm", "text/html"),
        ("css", "text/css"),
        ("js", "application/javascript"),
        ("mjs", "application/javascript"),
        ("json", JSON_MIME_TYPE),
        ("txt", "text/plain"),
        ("md", "text/markdown"),
        ("csv", "text/csv"),
        ("xml", "text/xml"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("ico", "image/x-icon"),
        ("svg", "image/svg+xml"),
        ("webp", "image/webp"),
        ("pdf", "application/pdf"),
        ("wasm", "application/wasm"),
        ("woff", "font/woff"),
        ("woff2", "font/woff2"),
        ("mp3", "audio/mpeg"),
        ("mp4", "video/mp4"),
        ("zip", "application/zip"),
    ]
    .into_iter()
    .collect();
}

/// 响应使用的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// 服务器识别的 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 提交数据，覆盖文本资源或追加到 JSON 数组
    Post,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}
