// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::{error, info, warn};
use serde_derive::{Deserialize, Serialize};

use std::fs;
use std::time::Duration;

use crate::exception::Exception;
use crate::param::{DEFAULT_IDLE_TIMEOUT, MAX_BODY_SIZE, MAX_HEADER_SIZE};

/// 服务器配置。载入后只读，通过 `Arc` 在线程间共享。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    port: u16,
    #[serde(default = "default_true")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_true")]
    enable_thread_pool: bool,
    #[serde(default = "default_true")]
    enable_keep_alive: bool,
    #[serde(default = "default_idle_timeout")]
    idle_timeout: u64,
    #[serde(default)]
    max_queue_size: usize,
    #[serde(default = "default_max_header_size")]
    max_header_size: usize,
    #[serde(default = "default_max_body_size")]
    max_body_size: usize,
    #[serde(default = "default_true")]
    enable_cache: bool,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT
}

fn default_max_header_size() -> usize {
    MAX_HEADER_SIZE
}

fn default_max_body_size() -> usize {
    MAX_BODY_SIZE
}

fn default_cache_size() -> usize {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: "public".to_string(),
            port: 7078,
            local: true,
            worker_threads: 0,
            enable_thread_pool: true,
            enable_keep_alive: true,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_queue_size: 0,
            max_header_size: MAX_HEADER_SIZE,
            max_body_size: MAX_BODY_SIZE,
            enable_cache: true,
            cache_size: default_cache_size(),
        }
    }

    /// 从 TOML 文件载入配置。
    ///
    /// 文件无法读取时返回错误；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let str_val = match fs::read_to_string(filename) {
            Ok(s) => s,
            Err(e) => {
                error!("无法读取配置文件{}：{}", filename, e);
                return Err(Exception::ConfigUnreadable);
            }
        };
        let raw_config = match toml::from_str::<Config>(&str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        Ok(raw_config.normalized())
    }

    /// 把 0 之类的"自动"取值替换为实际值。
    pub fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
            info!("worker_threads未设置，使用CPU核心数{}", self.worker_threads);
        }
        if self.idle_timeout == 0 {
            warn!("idle_timeout被设置为0，这会让每个连接立即超时，因此该值将被改为{}", DEFAULT_IDLE_TIMEOUT);
            self.idle_timeout = DEFAULT_IDLE_TIMEOUT;
        }
        if self.enable_cache && self.cache_size == 0 {
            warn!("cache_size被设置为0，目录页缓存将被禁用");
            self.enable_cache = false;
        }
        self
    }
}

// 链式设置方法，主要供嵌入方和测试使用
impl Config {
    pub fn with_www_root(mut self, root: &str) -> Self {
        self.www_root = root.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    pub fn with_thread_pool(mut self, enabled: bool) -> Self {
        self.enable_thread_pool = enabled;
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.enable_keep_alive = enabled;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout = secs;
        self
    }

    pub fn with_max_queue_size(mut self, n: usize) -> Self {
        self.max_queue_size = n;
        self
    }

    pub fn with_max_header_size(mut self, n: usize) -> Self {
        self.max_header_size = n;
        self
    }

    pub fn with_max_body_size(mut self, n: usize) -> Self {
        self.max_body_size = n;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn enable_thread_pool(&self) -> bool {
        self.enable_thread_pool
    }

    pub fn enable_keep_alive(&self) -> bool {
        self.enable_keep_alive
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        self.idle_timeout
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn max_header_size(&self) -> usize {
        self.max_header_size
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn enable_cache(&self) -> bool {
        self.enable_cache
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.port(), 7078);
        assert!(config.enable_thread_pool());
        assert!(config.enable_keep_alive());
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_header_size(), MAX_HEADER_SIZE);
        assert_eq!(config.max_queue_size(), 0);
    }

    #[test]
    fn test_from_toml_minimal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "www_root = \"/srv/www\"\nport = 8080").unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.www_root(), "/srv/www");
        assert_eq!(config.port(), 8080);
        assert!(config.local());
        assert!(config.worker_threads() > 0);
        assert!(config.enable_keep_alive());
    }

    #[test]
    fn test_from_toml_full() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
www_root = "public"
port = 9000
local = false
worker_threads = 4
enable_thread_pool = false
enable_keep_alive = false
idle_timeout = 3
max_queue_size = 128
max_header_size = 4096
max_body_size = 2048
enable_cache = false
cache_size = 8
"#
        )
        .unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();

        assert!(!config.local());
        assert_eq!(config.worker_threads(), 4);
        assert!(!config.enable_thread_pool());
        assert!(!config.enable_keep_alive());
        assert_eq!(config.idle_timeout_secs(), 3);
        assert_eq!(config.max_queue_size(), 128);
        assert_eq!(config.max_header_size(), 4096);
        assert_eq!(config.max_body_size(), 2048);
        assert!(!config.enable_cache());
    }

    #[test]
    fn test_from_toml_invalid_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port(), 7078);
    }

    #[test]
    fn test_from_toml_missing_file() {
        let result = Config::from_toml("/definitely/not/here.toml");
        assert_eq!(result.unwrap_err(), Exception::ConfigUnreadable);
    }

    #[test]
    fn test_normalized_zero_values() {
        let config = Config::new().with_idle_timeout(0).normalized();
        assert_eq!(config.idle_timeout_secs(), DEFAULT_IDLE_TIMEOUT);
        assert!(config.worker_threads() > 0);
    }
}
