//! # nutmux-core
//!
//! nutmux 核心库, 提供基础类型定义、错误处理和校验工具.
//!
//! 封装层 (`nutmux-format`) 的所有模块都建立在这里的类型之上:
//! 统一错误类型、时间基有理数、时间戳归一化、像素格式与 NUT CRC.

pub mod crc;
pub mod error;
pub mod media_type;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{ErrorKind, MuxError, MuxResult};
pub use media_type::MediaType;
pub use pixel_format::PixelFormat;
pub use rational::Rational;
pub use timestamp::Timestamp;
