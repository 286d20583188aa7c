//! 统一错误类型定义.
//!
//! 所有 nutmux crate 共用的错误类型. 错误分为四类 (见 [`ErrorKind`]):
//! 校验错误在会话开始时出现, 转换错误按帧出现, I/O 错误和状态错误均为致命错误.

use thiserror::Error;

use crate::media_type::MediaType;

/// nutmux 统一错误类型
#[derive(Debug, Error)]
pub enum MuxError {
    /// 没有任何流描述
    #[error("流列表为空, 至少需要一条流")]
    NoStreams,

    /// 流 ID 不连续或重复
    #[error("流 ID 必须从 0 开始连续递增: 索引 {index} 处的流 ID 为 {found}")]
    StreamId { index: usize, found: u32 },

    /// 缺少该媒体类型的必需字段
    #[error("流 {stream_id} 缺少必需字段: {field}")]
    MissingField {
        stream_id: u32,
        field: &'static str,
    },

    /// 字段存在但取值非法
    #[error("流 {stream_id} 的字段 {field} 无效: {reason}")]
    InvalidField {
        stream_id: u32,
        field: &'static str,
        reason: String,
    },

    /// 不支持的媒体类型
    #[error("流 {stream_id} 的媒体类型不受支持: {media_type}")]
    UnknownStreamType {
        stream_id: u32,
        media_type: MediaType,
    },

    /// 帧负载为空
    #[error("流 {stream_id} 的帧负载为空")]
    EmptyPayload { stream_id: u32 },

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 帧引用了未声明的流
    #[error("帧引用了不存在的流: {stream_id}")]
    UnknownStream { stream_id: u32 },

    /// 负载类型与流的媒体类型不匹配
    #[error("流 {stream_id} 的负载类型不匹配: 期望 {expected}, 实际 {actual}")]
    PayloadMismatch {
        stream_id: u32,
        expected: &'static str,
        actual: &'static str,
    },

    /// 图像尺寸与流头声明不一致
    #[error(
        "流 {stream_id} 的图像尺寸不匹配: 期望 {expected_width}x{expected_height}, 实际 {width}x{height}"
    )]
    ImageSize {
        stream_id: u32,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// 像素格式编码失败
    #[error("图像编码失败: {0}")]
    ImageEncode(String),

    /// 时间戳无法写入容器
    #[error("流 {stream_id} 的时间戳无效: {pts}")]
    InvalidTimestamp { stream_id: u32, pts: i64 },

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 在错误的状态下调用
    #[error("非法状态: 不允许在 {state} 状态下调用 {operation}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 流描述或参数校验失败, 在写入任何字节之前出现
    Validation,
    /// 帧转换失败, 该帧不会写入任何字节
    Conversion,
    /// 输出写入失败, 已写入的数据不会回退
    Io,
    /// 调用方违反了会话状态约定
    InvalidState,
}

impl MuxError {
    /// 获取错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoStreams
            | Self::StreamId { .. }
            | Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::UnknownStreamType { .. }
            | Self::EmptyPayload { .. }
            | Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::UnknownStream { .. }
            | Self::PayloadMismatch { .. }
            | Self::ImageSize { .. }
            | Self::ImageEncode(_)
            | Self::InvalidTimestamp { .. } => ErrorKind::Conversion,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }
}

/// nutmux 统一 Result 类型
pub type MuxResult<T> = Result<T, MuxError>;
