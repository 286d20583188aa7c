//! # nutmux-format
//!
//! NUT 容器封装库.
//!
//! 调用方提供流描述和帧, 本 crate 负责:
//! - 校验流描述并派生主头、流头 ([`header`])
//! - 把帧负载转换为线上字节 ([`convert`])
//! - 在时间窗口内按全局时间重排帧 ([`reorder`])
//! - 写出 NUT 包、同步点、帧记录和索引 ([`writer`], [`nut`])

pub mod convert;
pub mod frame;
pub mod header;
pub mod image_format;
pub mod io;
pub mod muxer;
pub mod nut;
pub mod options;
pub mod reorder;
pub mod source;
pub mod stream;
pub mod writer;

// 重导出常用类型
pub use convert::FrameConverter;
pub use frame::{Frame, FramePayload, Image, PayloadKind};
pub use header::{HeaderBuilder, MainHeader, MuxHeaders, StreamHeader, StreamParams};
pub use image_format::{ImageFormat, PackedImageFormat};
pub use io::{IoBackend, IoContext, MemoryBackend};
pub use muxer::{MuxState, MuxSummary, Muxer, NutMuxer};
pub use options::MuxerOptions;
pub use reorder::FrameOrderingBuffer;
pub use source::{ChannelFrameSource, FrameSender, FrameSource, IterFrameSource, frame_channel};
pub use stream::StreamDescriptor;
pub use writer::NutWriter;
