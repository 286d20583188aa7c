//! 流描述定义.
//!
//! 调用方在封装开始前为每条流提供一个 [`StreamDescriptor`].
//! 描述本身不做校验: ID 连续性和必需字段在构建流头时统一检查.

use nutmux_core::MediaType;

/// 流描述
///
/// 媒体类型相关的字段以 `Option` 表示, 缺失的字段由头部构建器报告.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// 流 ID, 必须等于其在列表中的位置
    pub id: u32,
    /// 媒体类型
    pub media_type: MediaType,
    /// 时间基: 每秒的刻度数, 帧时间戳以此为单位
    pub timebase: Option<u32>,
    /// 视频宽度 (像素)
    pub width: Option<u32>,
    /// 视频高度 (像素)
    pub height: Option<u32>,
    /// 音频采样率 (Hz)
    pub sample_rate: Option<u32>,
    /// 音频声道数
    pub channels: Option<u32>,
}

impl StreamDescriptor {
    /// 创建只有 ID 和媒体类型的描述, 其余字段通过 `with_*` 补充
    pub fn new(id: u32, media_type: MediaType) -> Self {
        Self {
            id,
            media_type,
            timebase: None,
            width: None,
            height: None,
            sample_rate: None,
            channels: None,
        }
    }

    /// 创建完整的视频流描述
    pub fn video(id: u32, timebase: u32, width: u32, height: u32) -> Self {
        Self::new(id, MediaType::Video)
            .with_timebase(timebase)
            .with_size(width, height)
    }

    /// 创建完整的音频流描述
    pub fn audio(id: u32, timebase: u32, sample_rate: u32, channels: u32) -> Self {
        Self::new(id, MediaType::Audio)
            .with_timebase(timebase)
            .with_sample_rate(sample_rate)
            .with_channels(channels)
    }

    /// 设置时间基
    pub fn with_timebase(mut self, timebase: u32) -> Self {
        self.timebase = Some(timebase);
        self
    }

    /// 设置视频尺寸
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// 设置采样率
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// 设置声道数
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }
}
