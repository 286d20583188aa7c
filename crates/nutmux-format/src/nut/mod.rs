//! NUT 序列化原语.
//!
//! # 包结构
//! ```text
//! startcode        u64 (大端)
//! forward_ptr      v   (负载长度 + 4)
//! header_checksum  u32 (仅当 forward_ptr > 4096)
//! payload          ...
//! checksum         u32 (负载的 CRC-32)
//! ```
//!
//! # 变长整数
//! - `v`: 每字节 7 位, 高位组在前, 除最后一个字节外置 0x80 继续位
//! - `s`: 有符号, x > 0 编码为 2x-1, 否则编码为 -2x
//! - `vb`: 长度 (v) + 字节
//! - `t`: pts * time_base_count + time_base_id

mod frame_code;

pub use frame_code::{FrameCode, FrameCodeTable};

use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};
use nutmux_core::MuxResult;
use nutmux_core::crc::crc32;

use crate::io::IoContext;

/// 文件标识, 包含结尾的 0 字节
pub const FILE_ID: &[u8] = b"nut/multimedia container\0";

/// 主头起始码
pub const MAIN_STARTCODE: u64 = 0x4E4D_7A56_1F5F_04AD;
/// 流头起始码
pub const STREAM_STARTCODE: u64 = 0x4E53_1140_5BF2_F9DB;
/// 同步点起始码
pub const SYNCPOINT_STARTCODE: u64 = 0x4E4B_E4AD_EECA_4569;
/// 索引起始码
pub const INDEX_STARTCODE: u64 = 0x4E58_DD67_2F23_E64E;

/// 主头版本
pub const NUT_VERSION: u64 = 3;

/// forward_ptr 超过该值时包头需要附加校验和
pub const HEADER_CHECKSUM_THRESHOLD: u64 = 4096;

bitflags! {
    /// 帧标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u64 {
        /// 关键帧
        const KEY        = 1 << 0;
        /// 流结束
        const EOR        = 1 << 1;
        /// 帧头中显式编码 pts
        const CODED_PTS  = 1 << 3;
        /// 帧头中显式编码流 ID
        const STREAM_ID  = 1 << 4;
        /// 帧头中编码 data_size_msb
        const SIZE_MSB   = 1 << 5;
        /// 帧头带 CRC-32
        const CHECKSUM   = 1 << 6;
        /// 帧头带保留字段
        const RESERVED   = 1 << 7;
        /// 负载带边带数据/元数据
        const SM_DATA    = 1 << 8;
        /// 帧头显式指定 elision header 索引
        const HEADER_IDX = 1 << 10;
        /// 帧头带 match_time_delta
        const MATCH_TIME = 1 << 11;
        /// 帧头显式编码 coded_flags
        const CODED      = 1 << 12;
        /// 该帧码不可用
        const INVALID    = 1 << 13;
    }
}

/// 变长整数 `v` 的编码长度 (字节)
pub fn v_len(value: u64) -> usize {
    let mut len = 1;
    let mut rest = value >> 7;
    while rest != 0 {
        len += 1;
        rest >>= 7;
    }
    len
}

/// NUT 字段缓冲区
#[derive(Debug, Default)]
pub struct NutBuf {
    buf: BytesMut,
}

impl NutBuf {
    /// 创建空缓冲区
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的字节数
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 已写入的字节
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// 取出内容
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// 写入无符号变长整数
    pub fn put_v(&mut self, value: u64) {
        let len = v_len(value);
        for i in (1..len).rev() {
            self.buf.put_u8(0x80 | ((value >> (7 * i)) & 0x7F) as u8);
        }
        self.buf.put_u8((value & 0x7F) as u8);
    }

    /// 写入有符号变长整数
    pub fn put_s(&mut self, value: i64) {
        let mapped = if value > 0 {
            value.unsigned_abs() * 2 - 1
        } else {
            value.unsigned_abs() * 2
        };
        self.put_v(mapped);
    }

    /// 写入带长度前缀的字节串
    pub fn put_vb(&mut self, data: &[u8]) {
        self.put_v(data.len() as u64);
        self.buf.put_slice(data);
    }

    /// 写入带时间基 ID 的时间戳
    ///
    /// 调用方需先用 [`coded_timestamp`] 确认不溢出.
    pub fn put_t(&mut self, pts: u64, time_base_id: u32, time_base_count: u32) {
        self.put_v(
            pts.wrapping_mul(u64::from(time_base_count))
                .wrapping_add(u64::from(time_base_id)),
        );
    }
}

/// `t` 编码值 `pts * time_base_count + time_base_id`, 超出 u64 时返回 `None`
pub fn coded_timestamp(pts: u64, time_base_id: u32, time_base_count: u32) -> Option<u64> {
    pts.checked_mul(u64::from(time_base_count))?
        .checked_add(u64::from(time_base_id))
}

/// 完整的包在输出中占用的字节数
pub fn packet_size(payload_len: usize) -> u64 {
    let forward_ptr = payload_len as u64 + 4;
    let header_checksum = if forward_ptr > HEADER_CHECKSUM_THRESHOLD {
        4
    } else {
        0
    };
    8 + v_len(forward_ptr) as u64 + header_checksum + forward_ptr
}

/// 写入一个 NUT 包, 返回写入的字节数
pub fn write_packet(io: &mut IoContext, startcode: u64, payload: &[u8]) -> MuxResult<u64> {
    let forward_ptr = payload.len() as u64 + 4;

    let mut header = NutBuf::new();
    header.put_u64(startcode);
    header.put_v(forward_ptr);
    if forward_ptr > HEADER_CHECKSUM_THRESHOLD {
        let checksum = crc32(header.as_slice());
        header.put_u32(checksum);
    }

    io.write_all(header.as_slice())?;
    io.write_all(payload)?;
    io.write_u32_be(crc32(payload))?;

    Ok(header.len() as u64 + forward_ptr)
}
