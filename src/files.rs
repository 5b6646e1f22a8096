// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 文件存储
//!
//! 连接状态机通过 [`Store`] 访问资源根目录：判断是否存在、覆盖写入、
//! 向 JSON 数组追加元素、枚举目录。[`FsStore`] 是基于本地文件系统的实现。

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use log::{debug, error, warn};
use serde_json::Value;

use crate::exception::Exception;
use crate::mime;

/// 目录中的一项，不包含 `.` 与 `..`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[cfg_attr(test, mockall::automock)]
pub trait Store: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// 以 `bytes` 覆盖文件内容，文件不存在时创建
    fn overwrite(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// 把文件读作 JSON 数组，追加 `value` 后整体重写。
    /// 文件不存在、为空或内容不是数组时，从一个新数组开始。
    fn append_json_array(&self, path: &Path, value: Value) -> io::Result<()>;

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
}

/// 以 `root` 为资源根目录的文件系统存储
pub struct FsStore {
    root: PathBuf,
    // 串行化写操作，避免两个 POST 同时改写同一个 JSON 文件时丢失元素
    write_lock: Mutex<()>,
}

impl FsStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 把请求路径映射为根目录下的本地路径。
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf, Exception> {
        Ok(self.resolve_segments(&path_segments(request_path)?))
    }

    /// 把 [`path_segments`] 的结果拼接到根目录下
    pub fn resolve_segments(&self, segments: &[String]) -> PathBuf {
        let mut path = self.root.clone();
        for segment in segments {
            path.push(segment);
        }
        path
    }
}

/// 把请求路径拆分为解码后的路径片段。
///
/// 每个片段先做百分号解码，再做字面上的检查：`..`、反斜杠、NUL 以及解码出的 `/`
/// 都会被拒绝，空片段和 `.` 被忽略。
pub fn path_segments(request_path: &str) -> Result<Vec<String>, Exception> {
    let mut segments = Vec::new();
    for raw in request_path.split('/') {
        let segment = match urlencoding::decode(raw) {
            Ok(s) => s.into_owned(),
            Err(_) => return Err(Exception::InvalidPath),
        };
        match segment.as_str() {
            "" | "." => continue,
            ".." => return Err(Exception::InvalidPath),
            s if s.contains(['/', '\\', '\0']) => return Err(Exception::InvalidPath),
            s => {
                // Path::push 遇到绝对路径会替换整个前缀
                let mut components = Path::new(s).components();
                let single = matches!(
                    (components.next(), components.next()),
                    (Some(Component::Normal(_)), None)
                );
                if !single {
                    return Err(Exception::InvalidPath);
                }
            }
        }
        segments.push(segment);
    }
    Ok(segments)
}

/// 由路径片段重新拼出规范的请求路径，例如 `/docs/a.txt`；没有片段时为 `/`
pub fn canonical_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

impl Store for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn overwrite(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::write(path, bytes)
    }

    fn append_json_array(&self, path: &Path, value: Value) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut array = match fs::read(path) {
            Ok(content) if content.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(content) => match serde_json::from_slice::<Value>(&content) {
                Ok(Value::Array(array)) => array,
                Ok(_) | Err(_) => {
                    warn!("{}中的内容不是JSON数组，将以新数组覆盖", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        array.push(value);
        let pretty = serde_json::to_string_pretty(&Value::Array(array))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, pretty)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("读取目录{}中的条目失败：{}", path.display(), e);
                    continue;
                }
            };
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("无法获取{}的元数据：{}", entry.path().display(), e);
                    continue;
                }
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        Ok(entries)
    }
}

/// 处理一次 POST：JSON 资源追加到数组，其它资源用请求体覆盖。
///
/// 请求体无法解析为 JSON 时，以 JSON 字符串的形式存入数组。
/// 根路径不能被写入，返回 `FileNotFound`。
pub fn persist(
    store: &dyn Store,
    request_path: &str,
    target: &Path,
    body: &[u8],
    id: u128,
) -> Result<(), Exception> {
    if request_path.trim_matches('/').is_empty() {
        warn!("[ID{}]拒绝对根路径的POST请求", id);
        return Err(Exception::FileNotFound);
    }

    let existed = store.exists(target);
    let result = if mime::is_json(request_path) {
        let value = match serde_json::from_slice::<Value>(body) {
            Ok(v) => v,
            Err(_) => {
                debug!("[ID{}]请求体不是合法的JSON，按字符串存储", id);
                Value::String(String::from_utf8_lossy(body).into_owned())
            }
        };
        store.append_json_array(target, value)
    } else {
        store.overwrite(target, body)
    };

    match result {
        Ok(()) => {
            debug!(
                "[ID{}]{}已{}，请求体{}字节",
                id,
                target.display(),
                if existed { "更新" } else { "创建" },
                body.len()
            );
            Ok(())
        }
        Err(e) => {
            error!("[ID{}]写入{}失败：{}", id, target.display(), e);
            Err(Exception::StorageFailed)
        }
    }
}
