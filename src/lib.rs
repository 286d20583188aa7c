//! # nutmux
//!
//! 纯 Rust 实现的 NUT 容器流式封装器.
//!
//! 调用方声明一组音视频流, 然后逐帧提交 (可以不按时间顺序),
//! 封装器在时间窗口内重排后写出格式正确的 NUT 文件.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nutmux::format::{Frame, IoContext, Muxer, MuxerOptions, NutMuxer, StreamDescriptor};
//!
//! # fn main() -> nutmux::core::MuxResult<()> {
//! let mut io = IoContext::open_write("out.nut")?;
//! let mut muxer = NutMuxer::new(Arc::new(nutmux::default_image_format()), MuxerOptions::default())?;
//! muxer.write_header(&mut io, &[StreamDescriptor::audio(0, 48000, 48000, 2)])?;
//! muxer.write_frame(&mut io, &Frame::audio_samples(0, 0, vec![0i32; 2048])?)?;
//! let summary = muxer.close(&mut io)?;
//! println!("写出 {} 帧", summary.frames_written);
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `nutmux-core` | 错误类型、时间基、时间戳、像素格式、CRC |
//! | `nutmux-format` | 头部构建、帧转换、重排序与 NUT 写出 |

/// 核心类型与工具
pub use nutmux_core as core;

/// NUT 封装
pub use nutmux_format as format;

pub mod logging;

/// 获取 nutmux 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 默认图像格式: 打包 BGR24
pub fn default_image_format() -> nutmux_format::PackedImageFormat {
    nutmux_format::PackedImageFormat::new(nutmux_core::PixelFormat::Bgr24)
}
