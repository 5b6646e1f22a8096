// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 任务队列
//!
//! 一个不带同步的先进先出队列。线程池把它放在自己的互斥锁里使用，
//! 因此这里的所有操作都不需要考虑并发。

use std::collections::VecDeque;

/// 先进先出队列。`len()` 恒等于已入队但尚未出队的元素个数。
///
/// 队列被丢弃时，其中剩余的元素也随之被丢弃（对于任务来说即"未执行即释放"）。
#[derive(Debug)]
pub struct TaskQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// 追加到队尾，O(1)
    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// 从队头取出一个元素，O(1)。队列为空时返回 `None`。
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_new_queue_is_empty() {
        let mut queue: TaskQueue<u32> = TaskQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_interleaved_enqueue_dequeue() {
        let mut queue = TaskQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        assert_eq!(queue.dequeue(), Some("a"));
        queue.enqueue("c");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue(), Some("b"));
        assert_eq!(queue.dequeue(), Some("c"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        let marker = Rc::new(());
        let mut queue = TaskQueue::new();
        for _ in 0..5 {
            queue.enqueue(Rc::clone(&marker));
        }
        assert_eq!(Rc::strong_count(&marker), 6);
        drop(queue.dequeue());
        assert_eq!(Rc::strong_count(&marker), 5);
        drop(queue);
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
