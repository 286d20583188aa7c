//! 重排序缓冲区.
//!
//! 帧按 (全局毫秒时间, 到达序号) 组成最小堆. 每次入队都会抬高"高水位",
//! 即目前入队过的最大全局时间. 堆顶满足 `堆顶时间 + 窗口 <= 高水位` 时即可写出.
//!
//! 窗口为 0 时每一帧入队后立刻满足条件, 输出顺序等于入队顺序.
//! 时间相同的帧按到达序号排序, 保持调用方的提交顺序.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use bytes::Bytes;

/// 缓冲区中的一帧
#[derive(Debug, Clone)]
pub struct ReorderEntry {
    pub stream_id: u32,
    /// 以流时间基为单位的 pts
    pub pts: i64,
    /// 全局时间 (毫秒)
    pub global_ms: i64,
    /// 到达序号
    pub seq: u64,
    /// 已转换的线上字节
    pub data: Bytes,
}

impl PartialEq for ReorderEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReorderEntry {}

impl PartialOrd for ReorderEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReorderEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.global_ms, self.seq).cmp(&(other.global_ms, other.seq))
    }
}

/// 帧重排序缓冲区
#[derive(Debug)]
pub struct FrameOrderingBuffer {
    window_ms: i64,
    heap: BinaryHeap<Reverse<ReorderEntry>>,
    next_seq: u64,
    high_water: Option<i64>,
}

impl FrameOrderingBuffer {
    /// 创建窗口为 `window_ms` 毫秒的缓冲区
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            heap: BinaryHeap::new(),
            next_seq: 0,
            high_water: None,
        }
    }

    /// 入队一帧, 返回分配的到达序号
    pub fn push(&mut self, stream_id: u32, pts: i64, global_ms: i64, data: Bytes) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.high_water = Some(self.high_water.map_or(global_ms, |hw| hw.max(global_ms)));
        self.heap.push(Reverse(ReorderEntry {
            stream_id,
            pts,
            global_ms,
            seq,
            data,
        }));
        seq
    }

    /// 取出一帧已超出窗口的帧
    pub fn pop_ready(&mut self) -> Option<ReorderEntry> {
        let high_water = self.high_water?;
        let head = &self.heap.peek()?.0;
        if head.global_ms.saturating_add(self.window_ms) <= high_water {
            self.heap.pop().map(|Reverse(entry)| entry)
        } else {
            None
        }
    }

    /// 不论窗口, 取出最早的一帧
    pub fn pop_oldest(&mut self) -> Option<ReorderEntry> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    /// 缓冲的帧数
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// 窗口 (毫秒)
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// 目前入队过的最大全局时间
    pub fn high_water(&self) -> Option<i64> {
        self.high_water
    }

    /// 缓冲数据的总字节数
    pub fn buffered_bytes(&self) -> usize {
        self.heap.iter().map(|e| e.0.data.len()).sum()
    }
}
