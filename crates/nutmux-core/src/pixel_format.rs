//! 像素格式定义.
//!
//! 仅包含 NUT 原始视频 (rawvideo) 可直接承载的打包格式.

use std::fmt;

/// 打包像素格式
///
/// 每个像素的所有分量连续存放, 每行 `width * bytes_per_pixel()` 字节.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGB 各 8 位, 打包
    Rgb24,
    /// BGR 各 8 位, 打包
    Bgr24,
    /// RGBA 各 8 位, 打包
    Rgba,
    /// BGRA 各 8 位, 打包
    Bgra,
    /// ARGB 各 8 位, 打包
    Argb,
    /// ABGR 各 8 位, 打包
    Abgr,
    /// 灰度 8 位
    Gray8,
}

impl PixelFormat {
    /// 每个像素占用的字节数
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr => 4,
        }
    }

    /// 是否带 alpha 通道
    pub const fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr)
    }

    /// NUT 原始视频使用的 FourCC
    ///
    /// 24 位格式的最后一个字节是位深 (24), 与 FFmpeg 的 NUT 标签表一致.
    pub const fn nut_fourcc(&self) -> [u8; 4] {
        match self {
            Self::Rgb24 => [b'R', b'G', b'B', 24],
            Self::Bgr24 => [b'B', b'G', b'R', 24],
            Self::Rgba => *b"RGBA",
            Self::Bgra => *b"BGRA",
            Self::Argb => *b"ARGB",
            Self::Abgr => *b"ABGR",
            Self::Gray8 => [b'Y', b'1', 0, 8],
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Argb => "argb",
            Self::Abgr => "abgr",
            Self::Gray8 => "gray8",
        };
        write!(f, "{name}")
    }
}
