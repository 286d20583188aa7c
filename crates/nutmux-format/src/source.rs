//! 帧源.
//!
//! 封装会话通过 [`FrameSource`] 拉取输入: 先取一次流描述, 再逐帧拉取直到返回 `None`.
//!
//! [`frame_channel`] 把生产者线程和封装线程连接起来: 生产者通过 [`FrameSender`]
//! 推送帧, 封装器从 [`ChannelFrameSource`] 拉取. 帧在两线程之间按值移交,
//! 有界队列满时生产者阻塞.

use std::sync::mpsc::{self, Receiver, SyncSender};

use nutmux_core::{MuxError, MuxResult};

use crate::frame::Frame;
use crate::stream::StreamDescriptor;

/// 帧源 trait
pub trait FrameSource {
    /// 流描述, 在拉取任何帧之前调用一次
    fn streams(&mut self) -> MuxResult<Vec<StreamDescriptor>>;

    /// 拉取下一帧, `None` 表示输入结束
    fn next_frame(&mut self) -> MuxResult<Option<Frame>>;
}

/// 基于迭代器的帧源
pub struct IterFrameSource<I> {
    streams: Vec<StreamDescriptor>,
    frames: I,
}

impl<I> IterFrameSource<I>
where
    I: Iterator<Item = Frame>,
{
    pub fn new(streams: Vec<StreamDescriptor>, frames: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            streams,
            frames: frames.into_iter(),
        }
    }
}

impl<I> FrameSource for IterFrameSource<I>
where
    I: Iterator<Item = Frame>,
{
    fn streams(&mut self) -> MuxResult<Vec<StreamDescriptor>> {
        Ok(self.streams.clone())
    }

    fn next_frame(&mut self) -> MuxResult<Option<Frame>> {
        Ok(self.frames.next())
    }
}

/// 通道的发送端
///
/// 丢弃发送端即表示输入结束.
#[derive(Debug)]
pub struct FrameSender {
    tx: SyncSender<Frame>,
}

impl FrameSender {
    /// 发送一帧, 队列满时阻塞
    pub fn send(&self, frame: Frame) -> MuxResult<()> {
        self.tx
            .send(frame)
            .map_err(|_| MuxError::InvalidState {
                operation: "send",
                state: "disconnected",
            })
    }
}

/// 通道的接收端, 作为帧源交给封装器
#[derive(Debug)]
pub struct ChannelFrameSource {
    streams: Option<Vec<StreamDescriptor>>,
    rx: Receiver<Frame>,
}

impl FrameSource for ChannelFrameSource {
    fn streams(&mut self) -> MuxResult<Vec<StreamDescriptor>> {
        self.streams.take().ok_or(MuxError::InvalidState {
            operation: "streams",
            state: "consumed",
        })
    }

    fn next_frame(&mut self) -> MuxResult<Option<Frame>> {
        // 所有发送端都已丢弃时 recv 返回错误, 即输入结束
        Ok(self.rx.recv().ok())
    }
}

/// 创建容量为 `bound` 的单生产者帧通道
pub fn frame_channel(
    streams: Vec<StreamDescriptor>,
    bound: usize,
) -> (FrameSender, ChannelFrameSource) {
    let (tx, rx) = mpsc::sync_channel(bound);
    (
        FrameSender { tx },
        ChannelFrameSource {
            streams: Some(streams),
            rx,
        },
    )
}
