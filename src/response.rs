// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{net, param::*, util::HtmlBuilder};

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, error};

use std::{
    fs::File,
    io::{self, Write},
    net::TcpStream,
    path::Path,
};

const HTML_MIME_TYPE: &str = "text/html";

/// 响应体：空、内存中的页面，或者在响应头之后发送的已打开文件。
#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Bytes),
    File(File),
}

#[derive(Debug)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    server_name: String,
    /// 保持连接时的空闲超时秒数，`None` 表示发送完即关闭
    keep_alive: Option<u64>,
    allow: Option<Vec<HttpRequestMethod>>,
    extra_headers: Vec<(String, String)>,
    body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            keep_alive: None,
            allow: None,
            extra_headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// 打开文件作为响应体，`Content-Length` 取文件大小。
    pub fn from_file(path: &Path, mime: &str, id: u128) -> io::Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        debug!(
            "[ID{}]文件{}，大小: {} bytes，MIME类型: {}",
            id,
            path.display(),
            file_size,
            mime
        );
        let mut response = Self::new();
        response.content_type = Some(mime.to_string());
        response.content_length = file_size;
        response.body = Body::File(file);
        Ok(response)
    }

    /// 以一段已经生成好的 HTML 作为响应体
    pub fn from_html(page: Bytes) -> Self {
        let mut response = Self::new();
        response.content_type = Some(HTML_MIME_TYPE.to_string());
        response.content_length = page.len() as u64;
        response.body = Body::Bytes(page);
        response
    }

    fn from_status_code(code: u16, id: u128) -> Self {
        let content = match code {
            404 => HtmlBuilder::from_status_code(404, Some(
                r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"
            )),
            405 => HtmlBuilder::from_status_code(405, Some(
                r"<h2>噢！</h2><p>本服务器目前仅支持GET与POST方法。</p>"
            )),
            413 => HtmlBuilder::from_status_code(413, Some(
                r"<h2>噢！</h2><p>请求体超过了服务器允许的大小。</p>"
            )),
            431 => HtmlBuilder::from_status_code(431, Some(
                r"<h2>噢！</h2><p>请求头超过了服务器允许的大小。</p>"
            )),
            500 => HtmlBuilder::from_status_code(500, Some(
                r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"
            )),
            503 => HtmlBuilder::from_status_code(503, Some(
                r"<h2>噢！</h2><p>服务器当前过于繁忙，请稍后再试。</p>"
            )),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        debug!("[ID{}]生成{}页面", id, code);
        let mut response = Self::from_html(Bytes::from(content));
        response.set_code(code);
        response
    }

    pub fn response_404(id: u128) -> Self {
        Self::from_status_code(404, id)
    }

    /// 不支持的请求方法，附带 `Allow` 字段
    pub fn response_405(id: u128) -> Self {
        let mut response = Self::from_status_code(405, id);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    pub fn response_413(id: u128) -> Self {
        Self::from_status_code(413, id)
    }

    pub fn response_431(id: u128) -> Self {
        Self::from_status_code(431, id)
    }

    pub fn response_500(id: u128) -> Self {
        Self::from_status_code(500, id)
    }

    pub fn response_503(id: u128) -> Self {
        Self::from_status_code(503, id)
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    /// `Some(timeout)` 表示保持连接并在响应头中声明空闲超时，`None` 表示发送后关闭。
    pub fn set_keep_alive(&mut self, timeout: Option<u64>) -> &mut Self {
        self.keep_alive = timeout;
        self
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.extra_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 状态行与全部响应头，以空行结尾
    pub fn head_bytes(&self) -> Vec<u8> {
        let version: &str = &self.version.to_string();
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let server: &str = &self.server_name;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);

        let mut header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            "Content-Length: ",
            content_length,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            match self.keep_alive {
                Some(timeout) => format!(
                    "Connection: keep-alive{}Keep-Alive: timeout={}{}",
                    CRLF, timeout, CRLF
                ),
                None => ["Connection: close", CRLF].concat(),
            }
            .as_str(),
            "Server: ",
            server,
            CRLF,
            "Date: ",
            date,
            CRLF,
            match &self.allow {
                Some(a) => {
                    let methods: Vec<String> = a.iter().map(|m| m.to_string()).collect();
                    ["Allow: ", &methods.join(", "), CRLF].concat()
                }
                None => "".to_string(),
            }
            .as_str(),
        ]
        .concat();
        for (name, value) in &self.extra_headers {
            header.push_str(&[name.as_str(), ": ", value, CRLF].concat());
        }
        header.push_str(CRLF);
        header.into_bytes()
    }

    /// 响应头加上内存中的响应体。文件响应体不包含在内。
    pub fn as_bytes(&self) -> Vec<u8> {
        let head = self.head_bytes();
        match &self.body {
            Body::Bytes(b) => [head.as_slice(), b].concat(),
            Body::Empty | Body::File(_) => head,
        }
    }

    /// 发送整个响应。文件响应体通过 [`net::send_file`] 发送。
    pub fn write_to(self, stream: &mut TcpStream) -> io::Result<()> {
        let head = self.head_bytes();
        match self.body {
            Body::Empty => stream.write_all(&head),
            Body::Bytes(b) => stream.write_all(&[head.as_slice(), &b].concat()),
            Body::File(mut file) => {
                stream.write_all(&head)?;
                let sent = net::send_file(stream, &mut file, self.content_length)?;
                if sent < self.content_length {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("文件只发送了{}/{}字节", sent, self.content_length),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn keeps_alive(&self) -> bool {
        self.keep_alive.is_some()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

// IMF-fixdate，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
