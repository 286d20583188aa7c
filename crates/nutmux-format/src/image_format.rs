//! 图像格式 (ImageFormat).
//!
//! 把解码后的 [`Image`] 编码为线上像素字节. 封装器在构建流头时查询一次 FourCC,
//! 之后对每个视频帧调用 `encode`.
//!
//! 内置的 [`PackedImageFormat`] 支持所有打包 RGB 格式之间的互转:
//! 每个像素先分解为 (R, G, B, A), 再按目标格式重组.
//!
//! 灰度使用 BT.601 定点亮度:
//! Y = (77 * R + 150 * G + 29 * B + 128) >> 8

use bytes::Bytes;
use nutmux_core::{MuxError, MuxResult, PixelFormat};

use crate::frame::Image;

/// 图像格式能力
///
/// 同一个实例会被所有视频帧重复使用, 实现必须无内部可变状态或自行同步.
pub trait ImageFormat: Send + Sync {
    /// 写入流头的 FourCC
    fn fourcc(&self) -> [u8; 4];

    /// 线上像素格式
    fn pixel_format(&self) -> PixelFormat;

    /// 把图像编码为紧密排列的线上字节
    fn encode(&self, image: &Image) -> MuxResult<Bytes>;
}

/// BT.601 亮度系数 (x256)
const Y_R: u32 = 77;
const Y_G: u32 = 150;
const Y_B: u32 = 29;

/// 打包像素格式编码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedImageFormat {
    target: PixelFormat,
}

impl PackedImageFormat {
    /// 创建输出指定像素格式的编码器
    pub const fn new(target: PixelFormat) -> Self {
        Self { target }
    }
}

impl Default for PackedImageFormat {
    fn default() -> Self {
        Self::new(PixelFormat::Bgr24)
    }
}

impl ImageFormat for PackedImageFormat {
    fn fourcc(&self) -> [u8; 4] {
        self.target.nut_fourcc()
    }

    fn pixel_format(&self) -> PixelFormat {
        self.target
    }

    fn encode(&self, image: &Image) -> MuxResult<Bytes> {
        let src = image.pixel_format();
        let src_bpp = src.bytes_per_pixel();
        let row_len = image.width() as usize * self.target.bytes_per_pixel();
        let mut out = Vec::with_capacity(row_len * image.height() as usize);

        for y in 0..image.height() {
            let row = image.row(y).ok_or_else(|| {
                MuxError::ImageEncode(format!(
                    "第 {y} 行超出图像数据范围 ({} 字节, stride {})",
                    image.data().len(),
                    image.stride()
                ))
            })?;
            if src == self.target {
                out.extend_from_slice(row);
                continue;
            }
            for px in row.chunks_exact(src_bpp) {
                compose(self.target, decompose(src, px), &mut out);
            }
        }

        Ok(Bytes::from(out))
    }
}

/// 分解为 (R, G, B, A)
fn decompose(format: PixelFormat, px: &[u8]) -> [u8; 4] {
    match format {
        PixelFormat::Rgb24 => [px[0], px[1], px[2], 255],
        PixelFormat::Bgr24 => [px[2], px[1], px[0], 255],
        PixelFormat::Rgba => [px[0], px[1], px[2], px[3]],
        PixelFormat::Bgra => [px[2], px[1], px[0], px[3]],
        PixelFormat::Argb => [px[1], px[2], px[3], px[0]],
        PixelFormat::Abgr => [px[3], px[2], px[1], px[0]],
        PixelFormat::Gray8 => [px[0], px[0], px[0], 255],
    }
}

/// 按目标格式重组一个像素
fn compose(format: PixelFormat, [r, g, b, a]: [u8; 4], out: &mut Vec<u8>) {
    match format {
        PixelFormat::Rgb24 => out.extend_from_slice(&[r, g, b]),
        PixelFormat::Bgr24 => out.extend_from_slice(&[b, g, r]),
        PixelFormat::Rgba => out.extend_from_slice(&[r, g, b, a]),
        PixelFormat::Bgra => out.extend_from_slice(&[b, g, r, a]),
        PixelFormat::Argb => out.extend_from_slice(&[a, r, g, b]),
        PixelFormat::Abgr => out.extend_from_slice(&[a, b, g, r]),
        PixelFormat::Gray8 => {
            let y = (Y_R * u32::from(r) + Y_G * u32::from(g) + Y_B * u32::from(b) + 128) >> 8;
            out.push(y.min(255) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_image() -> Image {
        // 2x1: 红, 绿
        Image::new(2, 1, PixelFormat::Rgb24, vec![255, 0, 0, 0, 255, 0]).unwrap()
    }

    #[test]
    fn test_rgb24_to_bgr24() {
        let fmt = PackedImageFormat::default();
        assert_eq!(fmt.fourcc(), [b'B', b'G', b'R', 24]);
        let out = fmt.encode(&rgb_image()).unwrap();
        assert_eq!(&out[..], &[0, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn test_rgb24_to_argb_不透明() {
        let fmt = PackedImageFormat::new(PixelFormat::Argb);
        let out = fmt.encode(&rgb_image()).unwrap();
        assert_eq!(&out[..], &[255, 255, 0, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn test_gray8_亮度() {
        let fmt = PackedImageFormat::new(PixelFormat::Gray8);
        let img = Image::new(1, 1, PixelFormat::Rgb24, vec![255, 255, 255]).unwrap();
        assert_eq!(&fmt.encode(&img).unwrap()[..], &[255]);
        let out = fmt.encode(&rgb_image()).unwrap();
        // 纯红: (77*255+128)>>8 = 77, 纯绿: (150*255+128)>>8 = 149
        assert_eq!(&out[..], &[77, 149]);
    }

    #[test]
    fn test_stride_填充被丢弃() {
        let fmt = PackedImageFormat::new(PixelFormat::Gray8);
        let img =
            Image::with_stride(2, 2, PixelFormat::Gray8, 4, vec![1, 2, 99, 99, 3, 4]).unwrap();
        assert_eq!(&fmt.encode(&img).unwrap()[..], &[1, 2, 3, 4]);
    }
}
