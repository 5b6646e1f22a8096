// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 已生成的目录列表页面的 LRU 缓存。
///
/// 以目录的本地路径为键，目录的修改时间变化（增删条目）后旧页面自动失效。
pub struct PageCache {
    cache: LruCache<PathBuf, CacheEntry>,
}

impl PageCache {
    // 根据容量构造，0 按 1 处理
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    // 放入
    pub fn push(&mut self, dir: &Path, page: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content: page,
            modified_time,
        };
        self.cache.put(dir.to_path_buf(), entry);
    }

    // 查询有效缓存
    pub fn find(&mut self, dir: &Path, current_modified_time: SystemTime) -> Option<Bytes> {
        let hit = self
            .cache
            .get(dir)
            .map(|entry| (entry.modified_time == current_modified_time, entry.content.clone()));
        match hit {
            Some((true, content)) => Some(content),
            Some((false, _)) => {
                self.cache.pop(dir);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
