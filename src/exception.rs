// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器从启动、线程池管理到单个连接处理过程中可能出现的各类异常。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、文件系统错误、线程池错误以及启动阶段的错误。
//! - **语义映射**：上层模块据此把异常转化为对应的 HTTP 状态码，或者直接关闭连接。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::fmt;

/// 服务器运行过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示失败的具体原因。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行不符合 `METHOD SP PATH SP HTTP...` 的格式。
    MalformedRequestLine,
    /// 客户端使用了服务器不支持的 HTTP 方法（仅支持 GET 与 POST）。
    UnSupportedRequestMethod,
    /// 请求体超过了配置的上限。对应 `413`。
    BodyTooLarge,
    /// 在资源根目录下未找到所请求的文件。对应 `404 Not Found`。
    FileNotFound,
    /// 请求的路径包含越权片段（如 `..`）或无法映射为本地路径。
    InvalidPath,
    /// 写入文件或追加 JSON 数组失败。
    StorageFailed,
    /// 线程池创建失败，已创建的部分已全部回收。
    PoolCreationFailed,
    /// 任务队列已满，任务未被接收。
    QueueFull,
    /// 无法读取配置文件。
    ConfigUnreadable,
    /// 无法绑定监听端口。
    BindFailed,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            BodyTooLarge => write!(f, "Request body too large (413)"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path"),
            StorageFailed => write!(f, "Couldn't persist request body"),
            PoolCreationFailed => write!(f, "Couldn't create worker pool"),
            QueueFull => write!(f, "Task queue is full"),
            ConfigUnreadable => write!(f, "Couldn't read config file"),
            BindFailed => write!(f, "Couldn't bind listening socket"),
        }
    }
}

impl std::error::Error for Exception {}
