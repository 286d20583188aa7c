//! 头部构建器 (Header Builder).
//!
//! 校验调用方给出的流描述, 并派生出二进制就绪的主头和流头:
//! - 流 ID 必须等于其在列表中的位置 (0..N-1)
//! - 每种媒体类型的必需字段必须存在且为正数
//! - 每条流贡献一个时间基 1/timebase, 时间基 ID 即流 ID
//! - 帧码表固定为只含一个通用帧码的 256 项表
//!
//! 构建是纯函数, 不做任何 I/O.

use bytes::Bytes;
use nutmux_core::{MediaType, MuxError, MuxResult, Rational};

use crate::nut::{FrameCodeTable, NUT_VERSION, NutBuf};
use crate::options::MAX_DISTANCE_LIMIT;
use crate::stream::StreamDescriptor;

/// PCM S32BE 的 NUT FourCC
pub const PCM_S32BE_FOURCC: [u8; 4] = [32, b'D', b'S', b'P'];

/// 默认同步点最大间距 (字节)
pub const DEFAULT_MAX_DISTANCE: u32 = 32767;

/// 默认每流最大 pts 距离
pub const DEFAULT_MAX_PTS_DISTANCE: u32 = 60000;

/// 未知色彩空间
const COLOURSPACE_UNKNOWN: u32 = 0;

/// 时间基分母上限 (不含)
const MAX_TIMEBASE: u32 = 1 << 31;

/// 流类别, 数值即写入流头的 stream_class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamClass {
    Video,
    Audio,
}

impl StreamClass {
    /// 流头中的编码值
    pub const fn value(&self) -> u64 {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
        }
    }

    /// 对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::Video => MediaType::Video,
            Self::Audio => MediaType::Audio,
        }
    }
}

/// 流头中与媒体类型相关的部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamParams {
    /// 视频参数
    Video {
        width: u32,
        height: u32,
        /// 像素宽高比分子
        sample_width: u32,
        /// 像素宽高比分母
        sample_height: u32,
        /// 色彩空间, 0 表示未知
        colourspace_type: u32,
    },
    /// 音频参数
    Audio {
        /// 采样率, 以有理数表示 (rate/1)
        sample_rate: Rational,
        channels: u32,
    },
}

/// 主头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainHeader {
    /// 格式版本
    pub version: u64,
    /// 流数量
    pub stream_count: u32,
    /// 同步点最大间距 (字节)
    pub max_distance: u32,
    /// 时间基表, 按流 ID 排列
    pub time_bases: Vec<Rational>,
    /// 帧码表
    pub frame_codes: FrameCodeTable,
}

impl MainHeader {
    /// 时间基数量
    pub fn time_base_count(&self) -> u32 {
        self.time_bases.len() as u32
    }

    /// 编码为主头包负载
    pub fn encode(&self) -> Bytes {
        let mut buf = NutBuf::new();
        buf.put_v(self.version);
        buf.put_v(u64::from(self.stream_count));
        buf.put_v(u64::from(self.max_distance));
        buf.put_v(self.time_bases.len() as u64);
        for tb in &self.time_bases {
            buf.put_v(u64::from(tb.num));
            buf.put_v(u64::from(tb.den));
        }
        self.frame_codes.encode(&mut buf);
        // header_count_minus1: 不使用 elision header
        buf.put_v(0);
        buf.freeze()
    }
}

/// 流头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub stream_id: u32,
    pub class: StreamClass,
    pub fourcc: [u8; 4],
    /// 时间基 (1/timebase)
    pub time_base: Rational,
    /// 在主头时间基表中的索引
    pub time_base_id: u32,
    pub msb_pts_shift: u32,
    pub max_pts_distance: u32,
    pub decode_delay: u32,
    pub flags: u32,
    pub codec_specific_data: Bytes,
    pub params: StreamParams,
}

impl StreamHeader {
    /// 媒体类型
    pub fn media_type(&self) -> MediaType {
        self.class.media_type()
    }

    /// 视频尺寸, 音频流返回 `None`
    pub fn video_size(&self) -> Option<(u32, u32)> {
        match self.params {
            StreamParams::Video { width, height, .. } => Some((width, height)),
            StreamParams::Audio { .. } => None,
        }
    }

    /// 编码为流头包负载
    pub fn encode(&self) -> Bytes {
        let mut buf = NutBuf::new();
        buf.put_v(u64::from(self.stream_id));
        buf.put_v(self.class.value());
        buf.put_vb(&self.fourcc);
        buf.put_v(u64::from(self.time_base_id));
        buf.put_v(u64::from(self.msb_pts_shift));
        buf.put_v(u64::from(self.max_pts_distance));
        buf.put_v(u64::from(self.decode_delay));
        buf.put_v(u64::from(self.flags));
        buf.put_vb(&self.codec_specific_data);
        match &self.params {
            StreamParams::Video {
                width,
                height,
                sample_width,
                sample_height,
                colourspace_type,
            } => {
                buf.put_v(u64::from(*width));
                buf.put_v(u64::from(*height));
                buf.put_v(u64::from(*sample_width));
                buf.put_v(u64::from(*sample_height));
                buf.put_v(u64::from(*colourspace_type));
            }
            StreamParams::Audio {
                sample_rate,
                channels,
            } => {
                buf.put_v(u64::from(sample_rate.num));
                buf.put_v(u64::from(sample_rate.den));
                buf.put_v(u64::from(*channels));
            }
        }
        buf.freeze()
    }
}

/// 构建结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxHeaders {
    pub main: MainHeader,
    /// 流头, 下标即流 ID
    pub streams: Vec<StreamHeader>,
}

impl MuxHeaders {
    /// 按流 ID 查找流头
    pub fn stream(&self, stream_id: u32) -> Option<&StreamHeader> {
        self.streams.get(stream_id as usize)
    }
}

/// 头部构建器
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    video_fourcc: [u8; 4],
    max_distance: u32,
    max_pts_distance: u32,
}

impl HeaderBuilder {
    /// 创建构建器, `video_fourcc` 来自图像格式
    pub fn new(video_fourcc: [u8; 4]) -> Self {
        Self {
            video_fourcc,
            max_distance: DEFAULT_MAX_DISTANCE,
            max_pts_distance: DEFAULT_MAX_PTS_DISTANCE,
        }
    }

    /// 设置同步点最大间距
    pub fn max_distance(mut self, max_distance: u32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// 设置每流最大 pts 距离
    pub fn max_pts_distance(mut self, max_pts_distance: u32) -> Self {
        self.max_pts_distance = max_pts_distance;
        self
    }

    /// 校验流描述并构建主头和流头
    pub fn build(&self, descriptors: &[StreamDescriptor]) -> MuxResult<MuxHeaders> {
        if descriptors.is_empty() {
            return Err(MuxError::NoStreams);
        }
        if self.max_distance == 0 || self.max_distance > MAX_DISTANCE_LIMIT {
            return Err(MuxError::InvalidArgument(format!(
                "max_distance 必须在 1..={MAX_DISTANCE_LIMIT} 范围内, 实际为 {}",
                self.max_distance
            )));
        }

        // 先整体检查 ID, 保证报告的是第一个出错的位置
        for (index, desc) in descriptors.iter().enumerate() {
            if desc.id as usize != index {
                return Err(MuxError::StreamId {
                    index,
                    found: desc.id,
                });
            }
        }

        let streams = descriptors
            .iter()
            .map(|desc| self.build_stream(desc))
            .collect::<MuxResult<Vec<_>>>()?;

        let main = MainHeader {
            version: NUT_VERSION,
            stream_count: streams.len() as u32,
            max_distance: self.max_distance,
            time_bases: streams.iter().map(|s| s.time_base).collect(),
            frame_codes: FrameCodeTable::generic(),
        };

        Ok(MuxHeaders { main, streams })
    }

    fn build_stream(&self, desc: &StreamDescriptor) -> MuxResult<StreamHeader> {
        let (class, fourcc, params) = match desc.media_type {
            MediaType::Video => {
                let width = required(desc.id, "width", desc.width)?;
                let height = required(desc.id, "height", desc.height)?;
                let params = StreamParams::Video {
                    width,
                    height,
                    sample_width: 1,
                    sample_height: 1,
                    colourspace_type: COLOURSPACE_UNKNOWN,
                };
                (StreamClass::Video, self.video_fourcc, params)
            }
            MediaType::Audio => {
                let sample_rate = required(desc.id, "sample_rate", desc.sample_rate)?;
                let channels = required(desc.id, "channels", desc.channels)?;
                let params = StreamParams::Audio {
                    sample_rate: Rational::new(sample_rate, 1),
                    channels,
                };
                (StreamClass::Audio, PCM_S32BE_FOURCC, params)
            }
            other => {
                return Err(MuxError::UnknownStreamType {
                    stream_id: desc.id,
                    media_type: other,
                });
            }
        };

        let timebase = required(desc.id, "timebase", desc.timebase)?;
        if timebase >= MAX_TIMEBASE {
            return Err(MuxError::InvalidField {
                stream_id: desc.id,
                field: "timebase",
                reason: format!("{timebase} 超出上限 {MAX_TIMEBASE}"),
            });
        }

        Ok(StreamHeader {
            stream_id: desc.id,
            class,
            fourcc,
            time_base: Rational::per_second(timebase),
            time_base_id: desc.id,
            msb_pts_shift: 0,
            max_pts_distance: self.max_pts_distance,
            decode_delay: 0,
            flags: 0,
            codec_specific_data: Bytes::new(),
            params,
        })
    }
}

/// 取出必需字段, 缺失报 MissingField, 为 0 报 InvalidField
fn required(stream_id: u32, field: &'static str, value: Option<u32>) -> MuxResult<u32> {
    match value {
        None => Err(MuxError::MissingField { stream_id, field }),
        Some(0) => Err(MuxError::InvalidField {
            stream_id,
            field,
            reason: "必须为正数".into(),
        }),
        Some(v) => Ok(v),
    }
}
