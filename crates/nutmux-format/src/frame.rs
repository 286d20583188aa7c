//! 待封装的帧 (Frame).
//!
//! 一帧携带且只携带一种负载: 解码后的图像、已是线上格式的原始字节, 或 PCM 采样.
//! 负载均为不可变的共享缓冲区, 帧交给封装器后调用方无法再修改其内容,
//! 因此重排序缓冲区中暂存的数据不会被意外改写.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use nutmux_core::{MuxError, MuxResult, PixelFormat};

/// 解码后的图像
///
/// 打包像素格式, 行间距 `stride` 可以大于 `width * bytes_per_pixel`.
/// 字段只能经由构造函数设置, 因此尺寸非零且数据覆盖所有行.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    /// 每行字节数
    stride: usize,
    data: Bytes,
}

impl Image {
    /// 创建紧密排列的图像 (stride = width * bytes_per_pixel)
    pub fn new(
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> MuxResult<Self> {
        let stride = width as usize * pixel_format.bytes_per_pixel();
        Self::with_stride(width, height, pixel_format, stride, data)
    }

    /// 创建指定行间距的图像
    pub fn with_stride(
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        stride: usize,
        data: impl Into<Bytes>,
    ) -> MuxResult<Self> {
        let data = data.into();
        if width == 0 || height == 0 {
            return Err(MuxError::InvalidArgument(format!(
                "图像尺寸无效: {width}x{height}"
            )));
        }
        let row_bytes = width as usize * pixel_format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(MuxError::InvalidArgument(format!(
                "行间距 {stride} 小于一行像素字节数 {row_bytes}"
            )));
        }
        let required = stride * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return Err(MuxError::InvalidArgument(format!(
                "图像数据不足: 需要 {required} 字节, 实际 {} 字节",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixel_format,
            stride,
            data,
        })
    }

    /// 宽度 (像素)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 高度 (像素)
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 像素格式
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// 每行字节数
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 像素数据 (含行尾填充)
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// 获取第 `y` 行的像素字节 (不含行尾填充), 越界返回 `None`
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let start = (y as usize).checked_mul(self.stride)?;
        let len = self.width as usize * self.pixel_format.bytes_per_pixel();
        self.data.get(start..start.checked_add(len)?)
    }
}

/// 负载类型, 用于错误信息和日志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// 解码后的图像
    Image,
    /// 原始字节
    Buffer,
    /// PCM 采样
    Samples,
}

impl PayloadKind {
    /// 名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Buffer => "buffer",
            Self::Samples => "samples",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 帧负载
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// 视频: 解码后的图像, 由图像格式编码为线上字节
    Image(Image),
    /// 视频: 已是线上像素格式的原始字节, 原样写出
    Buffer(Bytes),
    /// 音频: 32 位有符号 PCM 采样 (多声道交错)
    Samples(Arc<[i32]>),
}

impl FramePayload {
    /// 负载类型
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Image(_) => PayloadKind::Image,
            Self::Buffer(_) => PayloadKind::Buffer,
            Self::Samples(_) => PayloadKind::Samples,
        }
    }
}

/// 待封装的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 所属流的 ID
    pub stream_id: u32,
    /// 显示时间戳, 以所属流的时间基为单位, 不要求单调
    pub pts: i64,
    /// 负载
    pub payload: FramePayload,
}

impl Frame {
    /// 创建携带图像的视频帧
    pub fn video_image(stream_id: u32, pts: i64, image: Image) -> MuxResult<Self> {
        // Image 的构造函数已保证尺寸非零且数据充足
        Ok(Self {
            stream_id,
            pts,
            payload: FramePayload::Image(image),
        })
    }

    /// 创建携带原始字节的视频帧
    pub fn video_buffer(stream_id: u32, pts: i64, data: impl Into<Bytes>) -> MuxResult<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(MuxError::EmptyPayload { stream_id });
        }
        Ok(Self {
            stream_id,
            pts,
            payload: FramePayload::Buffer(data),
        })
    }

    /// 创建携带 PCM 采样的音频帧
    pub fn audio_samples(
        stream_id: u32,
        pts: i64,
        samples: impl Into<Arc<[i32]>>,
    ) -> MuxResult<Self> {
        let samples = samples.into();
        if samples.is_empty() {
            return Err(MuxError::EmptyPayload { stream_id });
        }
        Ok(Self {
            stream_id,
            pts,
            payload: FramePayload::Samples(samples),
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame{{stream={}, pts={}, payload={}}}",
            self.stream_id,
            self.pts,
            self.payload.kind()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_数据不足() {
        let err = Image::new(4, 4, PixelFormat::Bgr24, vec![0u8; 47]).unwrap_err();
        assert!(matches!(err, MuxError::InvalidArgument(_)));
        assert!(Image::new(4, 4, PixelFormat::Bgr24, vec![0u8; 48]).is_ok());
    }

    #[test]
    fn test_image_stride_最后一行无需填充() {
        // 2 行, stride 8, 每行 6 字节: 8 + 6 = 14
        let img = Image::with_stride(2, 2, PixelFormat::Bgr24, 8, vec![1u8; 14]).unwrap();
        assert_eq!(img.row(1).map(<[u8]>::len), Some(6));
        assert!(img.row(2).is_none());
        assert!(Image::with_stride(2, 2, PixelFormat::Bgr24, 5, vec![1u8; 14]).is_err());
    }

    #[test]
    fn test_image_零尺寸() {
        assert!(Image::new(0, 2, PixelFormat::Gray8, Vec::<u8>::new()).is_err());
    }

    #[test]
    fn test_image_访问器() {
        let img = Image::with_stride(2, 1, PixelFormat::Rgb24, 8, vec![3u8; 8]).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.pixel_format(), PixelFormat::Rgb24);
        assert_eq!(img.stride(), 8);
        assert_eq!(img.data().len(), 8);
        assert_eq!(img.row(0), Some(&[3u8; 6][..]));
    }

    #[test]
    fn test_image_数据不足时编码报错而非越界() {
        use crate::convert::FrameConverter;
        use crate::header::HeaderBuilder;
        use crate::image_format::{ImageFormat, PackedImageFormat};
        use crate::stream::StreamDescriptor;

        // 绕过构造函数的校验: 2 行各需 6 字节, 实际只有 3 字节
        let image = Image {
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Bgr24,
            stride: 6,
            data: Bytes::from(vec![0u8; 3]),
        };
        assert!(image.row(0).is_none());

        let fmt = Arc::new(PackedImageFormat::default());
        assert!(matches!(fmt.encode(&image), Err(MuxError::ImageEncode(_))));

        let headers = HeaderBuilder::new(fmt.fourcc())
            .build(&[StreamDescriptor::video(0, 25, 2, 2)])
            .unwrap();
        let frame = Frame::video_image(0, 0, image).unwrap();
        let err = FrameConverter::new(fmt, true)
            .convert(&frame, &headers.streams[0])
            .unwrap_err();
        assert!(matches!(err, MuxError::ImageEncode(_)));
    }

    #[test]
    fn test_frame_空负载() {
        let err = Frame::audio_samples(1, 0, Vec::<i32>::new()).unwrap_err();
        assert!(matches!(err, MuxError::EmptyPayload { stream_id: 1 }));
        let err = Frame::video_buffer(0, 0, Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, MuxError::EmptyPayload { stream_id: 0 }));
    }

    #[test]
    fn test_frame_负载类型() {
        let frame = Frame::audio_samples(1, 10, vec![1, 2, 3]).unwrap();
        assert_eq!(frame.payload.kind(), PayloadKind::Samples);
        assert_eq!(frame.to_string(), "Frame{stream=1, pts=10, payload=samples}");

        let image = Image::new(1, 1, PixelFormat::Gray8, vec![7u8]).unwrap();
        let frame = Frame::video_image(0, 0, image).unwrap();
        assert_eq!(frame.payload.kind(), PayloadKind::Image);
    }
}
