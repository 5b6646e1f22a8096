// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! MIME 类型查询。映射表见 [`crate::param::MIME_TYPES`]。

use std::path::Path;

use log::debug;

use crate::param::{DEFAULT_MIME_TYPE, JSON_MIME_TYPE, MIME_TYPES};

/// 在开始接受连接之前构建映射表，此后所有查询都是只读的。
pub fn init() {
    lazy_static::initialize(&MIME_TYPES);
    debug!("MIME映射表已载入，共{}项", MIME_TYPES.len());
}

/// 根据扩展名（不含 `.`，大小写不敏感）返回 MIME 类型，未知扩展名返回兜底类型。
pub fn content_type(extension: &str) -> &'static str {
    let extension = extension.to_ascii_lowercase();
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => DEFAULT_MIME_TYPE,
    }
}

/// 根据请求路径的最后一个 `.` 之后的部分确定 MIME 类型。
pub fn content_type_of(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some(ext) => content_type(ext),
        None => DEFAULT_MIME_TYPE,
    }
}

/// 该路径是否应当按 JSON 数组处理
pub fn is_json(path: &str) -> bool {
    content_type_of(path) == JSON_MIME_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_html() {
        assert_eq!(content_type("html"), "text/html");
        assert_eq!(content_type("htm"), "text/html");
    }

    #[test]
    fn test_content_type_case_insensitive() {
        assert_eq!(content_type("HTML"), "text/html");
        assert_eq!(content_type("Json"), "application/json");
        assert_eq!(content_type("PNG"), "image/png");
    }

    #[test]
    fn test_content_type_unknown() {
        assert_eq!(content_type("unknown_extension"), "application/octet-stream");
        assert_eq!(content_type(""), "application/octet-stream");
    }

    #[test]
    fn test_content_type_of_path() {
        assert_eq!(content_type_of("/index.html"), "text/html");
        assert_eq!(content_type_of("/apps/chat/app.js"), "application/javascript");
        assert_eq!(content_type_of("/archive.tar.zip"), "application/zip");
        assert_eq!(content_type_of("/Makefile"), "application/octet-stream");
        assert_eq!(content_type_of("/dir.d/README"), "application/octet-stream");
    }

    #[test]
    fn test_is_json() {
        assert!(is_json("/data.json"));
        assert!(is_json("/DATA.JSON"));
        assert!(!is_json("/notes.txt"));
        assert!(!is_json("/"));
    }
}
