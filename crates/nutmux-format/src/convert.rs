//! 帧转换器 (Frame Converter).
//!
//! 把帧负载转换为其所属流要求的线上字节:
//! - 视频 + 图像: 交给图像格式编码
//! - 视频 + 原始字节: 原样返回
//! - 音频 + PCM 采样: 每个采样 4 字节大端
//!
//! 负载类型与流的媒体类型不匹配时报 `PayloadMismatch`, 不产生任何字节.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use log::warn;
use nutmux_core::{MediaType, MuxError, MuxResult};

use crate::frame::{Frame, FramePayload, Image, PayloadKind};
use crate::header::{StreamHeader, StreamParams};
use crate::image_format::ImageFormat;

/// 每个 PCM 采样的字节数
const SAMPLE_BYTES: usize = 4;

/// 帧转换器
#[derive(Clone)]
pub struct FrameConverter {
    image_format: Arc<dyn ImageFormat>,
    generate_images: bool,
}

impl FrameConverter {
    /// 创建转换器
    ///
    /// `generate_images` 为 false 时, 视频帧必须携带原始线上字节.
    pub fn new(image_format: Arc<dyn ImageFormat>, generate_images: bool) -> Self {
        Self {
            image_format,
            generate_images,
        }
    }

    /// 视频帧期望的负载类型
    pub fn expected_video_payload(&self) -> PayloadKind {
        if self.generate_images {
            PayloadKind::Image
        } else {
            PayloadKind::Buffer
        }
    }

    /// 转换一帧
    pub fn convert(&self, frame: &Frame, header: &StreamHeader) -> MuxResult<Bytes> {
        match header.media_type() {
            MediaType::Video => self.convert_video(frame, header),
            MediaType::Audio => convert_audio(frame, header),
            other => Err(MuxError::UnknownStreamType {
                stream_id: header.stream_id,
                media_type: other,
            }),
        }
    }

    fn convert_video(&self, frame: &Frame, header: &StreamHeader) -> MuxResult<Bytes> {
        let expected = self.expected_video_payload();
        let actual = frame.payload.kind();
        if actual != expected {
            return Err(mismatch(header.stream_id, expected, actual));
        }

        let (width, height) = header.video_size().unwrap_or((0, 0));
        let bpp = self.image_format.pixel_format().bytes_per_pixel();
        let frame_size = width as usize * height as usize * bpp;

        match &frame.payload {
            FramePayload::Image(image) => {
                check_image_size(header.stream_id, image, width, height)?;
                let data = self.image_format.encode(image)?;
                if data.len() != frame_size {
                    return Err(MuxError::ImageEncode(format!(
                        "流 {} 编码后长度 {} 与期望的 {} 字节不符",
                        header.stream_id,
                        data.len(),
                        frame_size
                    )));
                }
                Ok(data)
            }
            FramePayload::Buffer(data) => {
                if data.len() != frame_size {
                    warn!(
                        "流 {} 的原始视频帧长度 {} 与 {}x{} 的帧大小 {} 不符, 按原样写入",
                        header.stream_id,
                        data.len(),
                        width,
                        height,
                        frame_size
                    );
                }
                Ok(data.clone())
            }
            FramePayload::Samples(_) => Err(mismatch(header.stream_id, expected, actual)),
        }
    }
}

impl std::fmt::Debug for FrameConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameConverter")
            .field("pixel_format", &self.image_format.pixel_format())
            .field("generate_images", &self.generate_images)
            .finish()
    }
}

/// PCM 采样转为大端字节
fn convert_audio(frame: &Frame, header: &StreamHeader) -> MuxResult<Bytes> {
    let FramePayload::Samples(samples) = &frame.payload else {
        return Err(mismatch(
            header.stream_id,
            PayloadKind::Samples,
            frame.payload.kind(),
        ));
    };

    if let StreamParams::Audio { channels, .. } = header.params {
        if samples.len() % channels as usize != 0 {
            warn!(
                "流 {} 的采样数 {} 不是声道数 {} 的整数倍",
                header.stream_id,
                samples.len(),
                channels
            );
        }
    }

    let mut out = vec![0u8; samples.len() * SAMPLE_BYTES];
    BigEndian::write_i32_into(&samples[..], &mut out);
    Ok(Bytes::from(out))
}

fn check_image_size(stream_id: u32, image: &Image, width: u32, height: u32) -> MuxResult<()> {
    if image.width() != width || image.height() != height {
        return Err(MuxError::ImageSize {
            stream_id,
            expected_width: width,
            expected_height: height,
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

fn mismatch(stream_id: u32, expected: PayloadKind, actual: PayloadKind) -> MuxError {
    MuxError::PayloadMismatch {
        stream_id,
        expected: expected.name(),
        actual: actual.name(),
    }
}
