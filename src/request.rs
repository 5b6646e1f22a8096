// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 该模块负责把从 Socket 读到的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的切分（方法、路径、版本）。
//! 2. `Host`、`Connection`、`Content-Length` 三个标头的宽松提取。
//! 3. 头部结束标记之后已经到达的请求体。
//!
//! 这里只做切分，不做任何 I/O；读取和长度上限由连接状态机负责。

use crate::{exception::Exception, param::*};
use log::{error, warn};

/// 在缓冲区中查找第一个 `\r\n\r\n`，返回紧随其后的下标（即请求体的起点）。
pub fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// 一个已经切分好的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（仅 GET 与 POST）
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// 请求行中的协议版本字段，原样保留
    version: String,
    host: Option<String>,
    connection: Option<String>,
    content_length: Option<usize>,
    /// 原始请求头，包括结束标记
    header: Vec<u8>,
    /// 目前已经收到的请求体
    body: Vec<u8>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// 缓冲区中第一个 `\r\n\r\n` 之前的部分是请求头，之后的部分作为请求体的开头。
    /// 没有找到结束标记时，整个缓冲区都被当作请求头，请求体为空。
    ///
    /// # 错误处理
    /// - 请求头不是合法的 UTF-8：`RequestIsNotUtf8`
    /// - 请求行不是 `METHOD SP PATH SP HTTP…`：`MalformedRequestLine`
    /// - 方法既不是 GET 也不是 POST：`UnSupportedRequestMethod`
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (header, body) = match find_header_end(buffer) {
            Some(end) => buffer.split_at(end),
            None => (buffer, &[][..]),
        };

        let header_string = match std::str::from_utf8(header) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]请求头不是合法的UTF-8", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = header_string.split(CRLF);
        let request_line = lines.next().unwrap_or("");

        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequestLine);
        }

        let version = parts[parts.len() - 1];
        if !version.starts_with("HTTP/") {
            error!("[ID{}]HTTP请求行中缺少协议版本：{}", id, request_line);
            return Err(Exception::MalformedRequestLine);
        }

        // 路径中可能混入了空格，虽然不规范，但仍通过 join 尝试恢复
        let path = parts[1..parts.len() - 1].join(" ");
        if !path.starts_with('/') {
            error!("[ID{}]HTTP请求路径不合法：{}", id, path);
            return Err(Exception::MalformedRequestLine);
        }

        let method = match parts[0] {
            "GET" => HttpRequestMethod::Get,
            "POST" => HttpRequestMethod::Post,
            other => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, other);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let mut host = None;
        let mut connection = None;
        let mut content_length = None;
        for line in lines {
            let (name, value) = match line.split_once(':') {
                Some(pair) => pair,
                None => continue,
            };
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("host") {
                host = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("connection") {
                connection = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-length") {
                match value.parse::<usize>() {
                    Ok(len) => content_length = Some(len),
                    Err(_) => warn!("[ID{}]无法解析Content-Length：{}", id, value),
                }
            }
        }

        Ok(Self {
            method,
            path,
            version: version.to_string(),
            host,
            connection,
            content_length,
            header: header.to_vec(),
            body: body.to_vec(),
        })
    }

    /// 追加后续读到的请求体
    pub fn extend_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// 按 `Content-Length` 计算还需要读取多少字节。没有该标头时为 0。
    pub fn remaining_body(&self) -> usize {
        match self.content_length {
            Some(len) => len.saturating_sub(self.body.len()),
            None => 0,
        }
    }

    /// 客户端是否要求保持连接：`Connection` 的值恰好是 `keep-alive`（忽略 ASCII 大小写）。
    pub fn wants_keep_alive(&self) -> bool {
        match &self.connection {
            Some(v) => v.eq_ignore_ascii_case("keep-alive"),
            None => false,
        }
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取去掉查询字符串和片段之后的资源路径
    pub fn resource_path(&self) -> &str {
        match self.path.find(|c| c == '?' || c == '#') {
            Some(pos) => &self.path[..pos],
            None => &self.path,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
