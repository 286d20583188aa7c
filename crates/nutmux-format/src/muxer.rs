//! 封装器 (Muxer) 与 NUT 封装会话.
//!
//! 使用流程:
//! 1. 调用 `write_header()` 校验流描述并写入容器头部
//! 2. 循环调用 `write_frame()` 写入帧, 帧先经转换再进入重排序缓冲区
//! 3. 调用 `close()` 写出缓冲区中剩余的帧和索引
//!
//! 会话状态: `Created -> Open -> Closing -> Closed`.
//! 任何操作出错后进入 `Failed`, 之后的调用都返回 `InvalidState`.
//! 出错前已写出的字节不会回退, 调用方应丢弃整个输出.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, warn};
use nutmux_core::{MuxError, MuxResult, Timestamp};

use crate::convert::FrameConverter;
use crate::frame::Frame;
use crate::header::HeaderBuilder;
use crate::image_format::ImageFormat;
use crate::io::IoContext;
use crate::nut::coded_timestamp;
use crate::options::MuxerOptions;
use crate::reorder::{FrameOrderingBuffer, ReorderEntry};
use crate::source::FrameSource;
use crate::stream::StreamDescriptor;
use crate::writer::NutWriter;

/// 封装器 trait
///
/// 将帧写入容器格式.
pub trait Muxer: Send {
    /// 获取格式名称
    fn name(&self) -> &str;

    /// 写入容器头部
    ///
    /// # 参数
    /// - `streams`: 输出流描述, ID 必须为 0..N-1
    fn write_header(&mut self, io: &mut IoContext, streams: &[StreamDescriptor]) -> MuxResult<()>;

    /// 写入一帧
    fn write_frame(&mut self, io: &mut IoContext, frame: &Frame) -> MuxResult<()>;

    /// 写入容器尾部, 完成封装
    fn close(&mut self, io: &mut IoContext) -> MuxResult<MuxSummary>;
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    /// 尚未写入头部
    Created,
    /// 接受帧
    Open,
    /// 正在写出剩余帧和索引
    Closing,
    /// 已完成
    Closed,
    /// 出错, 会话不可继续
    Failed,
}

impl MuxState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

/// 封装结果统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxSummary {
    /// 写出的总帧数
    pub frames_written: u64,
    /// 每条流写出的帧数
    pub frames_per_stream: Vec<u64>,
    /// 同步点数量
    pub syncpoints: usize,
    /// 输出总字节数
    pub bytes_written: u64,
    /// 是否写入了索引
    pub index_written: bool,
    /// 晚于已写出时间而被按原样写出的帧数
    pub late_frames: u64,
}

/// NUT 封装器
pub struct NutMuxer {
    image_format: Arc<dyn ImageFormat>,
    options: MuxerOptions,
    converter: FrameConverter,
    buffer: FrameOrderingBuffer,
    writer: Option<NutWriter>,
    state: MuxState,
    /// 已写出帧的最大全局时间 (毫秒)
    last_flushed_ms: Option<i64>,
    late_frames: u64,
}

impl NutMuxer {
    /// 创建封装器
    pub fn new(image_format: Arc<dyn ImageFormat>, options: MuxerOptions) -> MuxResult<Self> {
        options.validate()?;
        let converter = FrameConverter::new(Arc::clone(&image_format), options.generate_images);
        let buffer = FrameOrderingBuffer::new(options.frame_ordering_buffer_millis);
        Ok(Self {
            image_format,
            options,
            converter,
            buffer,
            writer: None,
            state: MuxState::Created,
            last_flushed_ms: None,
            late_frames: 0,
        })
    }

    /// 当前状态
    pub fn state(&self) -> MuxState {
        self.state
    }

    /// 选项
    pub fn options(&self) -> &MuxerOptions {
        &self.options
    }

    /// 缓冲区中等待写出的帧数
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    /// 从帧源拉取全部帧完成一次封装
    pub fn mux<S: FrameSource + ?Sized>(
        &mut self,
        io: &mut IoContext,
        source: &mut S,
    ) -> MuxResult<MuxSummary> {
        let streams = source.streams()?;
        self.write_header(io, &streams)?;
        while let Some(frame) = source.next_frame()? {
            self.write_frame(io, &frame)?;
        }
        self.close(io)
    }

    /// 提交已转换的帧字节
    ///
    /// `pts` 以所属流的时间基为单位, 必须非负.
    pub fn admit(
        &mut self,
        io: &mut IoContext,
        stream_id: u32,
        pts: i64,
        data: Bytes,
    ) -> MuxResult<()> {
        self.expect_state(MuxState::Open, "admit")?;
        let result = self.admit_inner(io, stream_id, pts, data);
        self.fail_on_error(result)
    }

    fn admit_inner(
        &mut self,
        io: &mut IoContext,
        stream_id: u32,
        pts: i64,
        data: Bytes,
    ) -> MuxResult<()> {
        let writer = self.writer.as_ref().ok_or(MuxError::InvalidState {
            operation: "admit",
            state: self.state.name(),
        })?;
        let stream = writer
            .headers()
            .stream(stream_id)
            .ok_or(MuxError::UnknownStream { stream_id })?;
        let time_base_count = writer.headers().main.time_base_count();
        let coded = u64::try_from(pts)
            .ok()
            .and_then(|pts| coded_timestamp(pts, stream_id, time_base_count));
        if coded.is_none() {
            return Err(MuxError::InvalidTimestamp { stream_id, pts });
        }
        let global_ms = Timestamp::new(pts, stream.time_base)
            .to_millis()
            .ok_or(MuxError::InvalidTimestamp { stream_id, pts })?;

        self.buffer.push(stream_id, pts, global_ms, data);
        self.tick(io)
    }

    /// 写出所有已超出重排序窗口的帧
    fn tick(&mut self, io: &mut IoContext) -> MuxResult<()> {
        while let Some(entry) = self.buffer.pop_ready() {
            self.emit(io, entry)?;
        }
        Ok(())
    }

    fn emit(&mut self, io: &mut IoContext, entry: ReorderEntry) -> MuxResult<()> {
        let writer = self.writer.as_mut().ok_or(MuxError::InvalidState {
            operation: "emit",
            state: self.state.name(),
        })?;
        if let Some(last) = self.last_flushed_ms {
            if entry.global_ms < last {
                self.late_frames += 1;
                warn!(
                    "流 {} pts={} ({}ms) 晚于已写出的 {}ms, 超出重排序窗口 {}ms, 按原样写出",
                    entry.stream_id,
                    entry.pts,
                    entry.global_ms,
                    last,
                    self.buffer.window_ms()
                );
            }
        }
        // admit 已拒绝负数和编码溢出的 pts
        let pts = u64::try_from(entry.pts).map_err(|_| MuxError::InvalidTimestamp {
            stream_id: entry.stream_id,
            pts: entry.pts,
        })?;
        writer.write_frame(io, entry.stream_id, pts, &entry.data)?;
        self.last_flushed_ms = Some(
            self.last_flushed_ms
                .map_or(entry.global_ms, |last| last.max(entry.global_ms)),
        );
        Ok(())
    }

    fn close_inner(&mut self, io: &mut IoContext) -> MuxResult<MuxSummary> {
        let pending = self.buffer.len();
        while let Some(entry) = self.buffer.pop_oldest() {
            self.emit(io, entry)?;
        }

        let writer = self.writer.as_mut().ok_or(MuxError::InvalidState {
            operation: "close",
            state: MuxState::Closing.name(),
        })?;
        let index_written = if self.options.write_index {
            writer.write_index(io)?
        } else {
            false
        };
        io.flush()?;

        debug!("NUT: 关闭时写出 {pending} 个缓冲帧");
        Ok(MuxSummary {
            frames_written: writer.frames_written(),
            frames_per_stream: writer.frames_per_stream().to_vec(),
            syncpoints: writer.syncpoint_count(),
            bytes_written: io.position(),
            index_written,
            late_frames: self.late_frames,
        })
    }

    fn expect_state(&mut self, expected: MuxState, operation: &'static str) -> MuxResult<()> {
        if self.state == expected {
            return Ok(());
        }
        let err = MuxError::InvalidState {
            operation,
            state: self.state.name(),
        };
        if self.state != MuxState::Closed {
            self.state = MuxState::Failed;
        }
        Err(err)
    }

    fn fail_on_error<T>(&mut self, result: MuxResult<T>) -> MuxResult<T> {
        if result.is_err() {
            self.state = MuxState::Failed;
        }
        result
    }
}

impl Muxer for NutMuxer {
    fn name(&self) -> &str {
        "nut"
    }

    fn write_header(&mut self, io: &mut IoContext, streams: &[StreamDescriptor]) -> MuxResult<()> {
        self.expect_state(MuxState::Created, "write_header")?;
        let result = HeaderBuilder::new(self.image_format.fourcc())
            .max_distance(self.options.max_distance)
            .max_pts_distance(self.options.max_pts_distance)
            .build(streams)
            .and_then(|headers| {
                let mut writer = NutWriter::new(headers);
                writer.write_header(io)?;
                Ok(writer)
            });
        let writer = self.fail_on_error(result)?;
        self.writer = Some(writer);
        self.state = MuxState::Open;
        Ok(())
    }

    fn write_frame(&mut self, io: &mut IoContext, frame: &Frame) -> MuxResult<()> {
        self.expect_state(MuxState::Open, "write_frame")?;
        let converted = match &self.writer {
            Some(writer) => match writer.headers().stream(frame.stream_id) {
                Some(header) => self.converter.convert(frame, header),
                None => Err(MuxError::UnknownStream {
                    stream_id: frame.stream_id,
                }),
            },
            None => Err(MuxError::InvalidState {
                operation: "write_frame",
                state: self.state.name(),
            }),
        };
        let data = self.fail_on_error(converted)?;
        self.admit(io, frame.stream_id, frame.pts, data)
    }

    fn close(&mut self, io: &mut IoContext) -> MuxResult<MuxSummary> {
        self.expect_state(MuxState::Open, "close")?;
        self.state = MuxState::Closing;
        let result = self.close_inner(io);
        let summary = self.fail_on_error(result)?;
        self.state = MuxState::Closed;
        info!(
            "NUT: 封装完成, {} 帧, {} 个同步点, {} 字节",
            summary.frames_written, summary.syncpoints, summary.bytes_written
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_format::PackedImageFormat;
    use crate::io::IoBackend;
    use nutmux_core::ErrorKind;
    use std::io;
    use std::sync::Mutex;

    fn muxer(window: u64) -> NutMuxer {
        let options = MuxerOptions {
            frame_ordering_buffer_millis: window,
            generate_images: false,
            ..Default::default()
        };
        NutMuxer::new(Arc::new(PackedImageFormat::default()), options).unwrap()
    }

    fn streams() -> Vec<StreamDescriptor> {
        vec![
            StreamDescriptor::video(0, 1000, 1, 1),
            StreamDescriptor::audio(1, 1000, 8000, 1),
        ]
    }

    #[test]
    fn test_状态流转() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        assert_eq!(m.state(), MuxState::Created);
        m.write_header(&mut io, &streams()).unwrap();
        assert_eq!(m.state(), MuxState::Open);
        let summary = m.close(&mut io).unwrap();
        assert_eq!(m.state(), MuxState::Closed);
        assert_eq!(summary.frames_written, 0);
        assert!(!summary.index_written);
    }

    #[test]
    fn test_重复关闭() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        m.write_header(&mut io, &streams()).unwrap();
        m.close(&mut io).unwrap();
        let err = m.close(&mut io).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let frame = Frame::video_buffer(0, 0, vec![0u8; 3]).unwrap();
        assert!(matches!(
            m.write_frame(&mut io, &frame),
            Err(MuxError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_头部之前写帧() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        let frame = Frame::video_buffer(0, 0, vec![0u8; 3]).unwrap();
        let err = m.write_frame(&mut io, &frame).unwrap_err();
        assert!(matches!(
            err,
            MuxError::InvalidState {
                operation: "write_frame",
                state: "created"
            }
        ));
        assert_eq!(io.position(), 0);
    }

    #[test]
    fn test_校验失败后会话不可用() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        let err = m.write_header(&mut io, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(io.position(), 0);
        assert_eq!(m.state(), MuxState::Failed);
        assert!(m.write_header(&mut io, &streams()).is_err());
    }

    #[test]
    fn test_负数时间戳() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        m.write_header(&mut io, &streams()).unwrap();
        let frame = Frame::audio_samples(1, -1, vec![0]).unwrap();
        let err = m.write_frame(&mut io, &frame).unwrap_err();
        assert!(matches!(
            err,
            MuxError::InvalidTimestamp {
                stream_id: 1,
                pts: -1
            }
        ));
        assert_eq!(m.state(), MuxState::Failed);
    }

    #[test]
    fn test_时间戳编码溢出() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        let streams: Vec<_> = (0..3)
            .map(|id| StreamDescriptor::audio(id, 1000, 8000, 1))
            .collect();
        m.write_header(&mut io, &streams).unwrap();
        let header_len = io.position();

        // 毫秒换算不溢出, 但 pts * 3 超出 u64
        let frame = Frame::audio_samples(0, i64::MAX - 10, vec![1]).unwrap();
        let err = m.write_frame(&mut io, &frame).unwrap_err();
        assert!(matches!(
            err,
            MuxError::InvalidTimestamp { stream_id: 0, .. }
        ));
        assert_eq!(m.state(), MuxState::Failed);
        assert_eq!(m.buffered_frames(), 0);
        assert_eq!(io.position(), header_len);
    }

    /// 写满 `limit` 字节后拒绝写入的后端, 已写入的字节可从共享缓冲区读出
    struct LimitedBackend {
        data: Arc<Mutex<Vec<u8>>>,
        limit: usize,
    }

    impl IoBackend for LimitedBackend {
        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            let mut data = self.data.lock().unwrap();
            if data.len() + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "sink full"));
            }
            data.extend_from_slice(buf);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_写入失败后会话不可用且保留已写字节() {
        let mut header_io = IoContext::memory();
        muxer(0).write_header(&mut header_io, &streams()).unwrap();
        let header = header_io.data().unwrap().to_vec();

        let sink = Arc::new(Mutex::new(Vec::new()));
        let mut io = IoContext::new(Box::new(LimitedBackend {
            data: Arc::clone(&sink),
            limit: header.len() + 16,
        }));
        let mut m = muxer(0);
        m.write_header(&mut io, &streams()).unwrap();

        let frame = Frame::audio_samples(1, 0, vec![7; 32]).unwrap();
        let err = m.write_frame(&mut io, &frame).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(m.state(), MuxState::Failed);

        let err = m.write_frame(&mut io, &frame).unwrap_err();
        assert!(matches!(
            err,
            MuxError::InvalidState {
                operation: "write_frame",
                state: "failed"
            }
        ));
        assert!(matches!(
            m.close(&mut io),
            Err(MuxError::InvalidState { state: "failed", .. })
        ));

        // 失败前写出的头部和同步点仍在输出中
        let written = sink.lock().unwrap();
        assert!(written.starts_with(&header));
        assert!(written.len() > header.len());
        assert_eq!(written.len() as u64, io.position());
    }

    #[test]
    fn test_未知流() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        m.write_header(&mut io, &streams()).unwrap();
        let err = m.admit(&mut io, 5, 0, Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, MuxError::UnknownStream { stream_id: 5 }));
    }

    #[test]
    fn test_窗口缓冲与关闭时写出() {
        let mut m = muxer(100);
        let mut io = IoContext::memory();
        m.write_header(&mut io, &streams()).unwrap();
        let header_len = io.position();

        m.admit(&mut io, 1, 50, Bytes::from_static(b"a")).unwrap();
        m.admit(&mut io, 0, 0, Bytes::from_static(b"v")).unwrap();
        assert_eq!(m.buffered_frames(), 2);
        assert_eq!(io.position(), header_len);

        // 高水位 120: pts 0 满足 0 + 100 <= 120
        m.admit(&mut io, 1, 120, Bytes::from_static(b"b")).unwrap();
        assert_eq!(m.buffered_frames(), 2);

        let summary = m.close(&mut io).unwrap();
        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.frames_per_stream, vec![1, 2]);
        assert_eq!(summary.late_frames, 0);
        assert!(summary.index_written);
    }

    #[test]
    fn test_超出窗口的帧照常写出() {
        let mut m = muxer(0);
        let mut io = IoContext::memory();
        m.write_header(&mut io, &streams()).unwrap();
        m.admit(&mut io, 0, 500, Bytes::from_static(b"v")).unwrap();
        m.admit(&mut io, 1, 100, Bytes::from_static(b"a")).unwrap();
        let summary = m.close(&mut io).unwrap();
        assert_eq!(summary.frames_written, 2);
        assert_eq!(summary.late_frames, 1);
    }

    #[test]
    fn test_无效选项() {
        let options = MuxerOptions {
            max_distance: 0,
            ..Default::default()
        };
        assert!(NutMuxer::new(Arc::new(PackedImageFormat::default()), options).is_err());
    }
}
