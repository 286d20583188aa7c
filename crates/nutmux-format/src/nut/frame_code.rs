//! 帧码表.
//!
//! 每个帧记录以 1 字节帧码开头, 帧码索引主头中的 256 项表.
//! 表中只有一项可用: 帧码 1, 标志为 `CODED`, 真正的帧标志逐帧写在帧头里.
//! 其余各项均为 `INVALID`. 帧码 'N' (0x4E) 与起始码首字节冲突, 永远不可用.
//!
//! 主头中按"游程"写表: 相邻且内容相同的项合并为一条记录,
//! 记录中的 count 不计入被跳过的 'N'.

use super::{FrameFlags, NutBuf};

/// 帧码表项数
pub const FRAME_CODE_COUNT: usize = 256;

/// 与起始码首字节冲突的帧码
pub const RESERVED_CODE: u8 = b'N';

/// 游程记录中的字段数: pts, mul, stream, size, res, count
const RUN_FIELDS: u64 = 6;

/// 帧码表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCode {
    pub flags: FrameFlags,
    pub stream_id: u64,
    pub size_mul: u64,
    pub size_lsb: u64,
    pub pts_delta: i64,
    pub reserved_count: u64,
}

impl FrameCode {
    /// 不可用的帧码
    pub const INVALID: Self = Self::with_flags(FrameFlags::INVALID);

    /// 通用帧码: 所有帧属性都在帧头中显式编码
    pub const GENERIC: Self = Self::with_flags(FrameFlags::CODED);

    const fn with_flags(flags: FrameFlags) -> Self {
        Self {
            flags,
            stream_id: 0,
            size_mul: 1,
            size_lsb: 0,
            pts_delta: 0,
            reserved_count: 0,
        }
    }

    /// 是否可用
    pub fn is_valid(&self) -> bool {
        !self.flags.contains(FrameFlags::INVALID)
    }
}

/// 帧码表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCodeTable {
    codes: [FrameCode; FRAME_CODE_COUNT],
}

impl FrameCodeTable {
    /// 封装器使用的通用帧码
    pub const GENERIC_CODE: u8 = 1;

    /// 构建标准表: 仅帧码 1 可用
    pub fn generic() -> Self {
        let mut codes = [FrameCode::INVALID; FRAME_CODE_COUNT];
        codes[Self::GENERIC_CODE as usize] = FrameCode::GENERIC;
        Self { codes }
    }

    /// 查询帧码
    pub fn get(&self, code: u8) -> &FrameCode {
        &self.codes[code as usize]
    }

    /// 可用帧码数量
    pub fn valid_count(&self) -> usize {
        self.codes.iter().filter(|c| c.is_valid()).count()
    }

    /// 按游程写入主头
    pub fn encode(&self, buf: &mut NutBuf) {
        for (code, count) in self.runs() {
            buf.put_v(code.flags.bits());
            buf.put_v(RUN_FIELDS);
            buf.put_s(code.pts_delta);
            buf.put_v(code.size_mul);
            buf.put_v(code.stream_id);
            buf.put_v(code.size_lsb);
            buf.put_v(code.reserved_count);
            buf.put_v(count);
        }
    }

    /// 游程划分, 返回 (表项, 不含 'N' 的项数)
    pub fn runs(&self) -> Vec<(FrameCode, u64)> {
        let mut runs = Vec::new();
        let mut i = 0;
        while i < FRAME_CODE_COUNT {
            if i == RESERVED_CODE as usize {
                i += 1;
                continue;
            }
            let code = self.codes[i];
            let mut count = 1;
            let mut j = i + 1;
            while j < FRAME_CODE_COUNT {
                if j == RESERVED_CODE as usize {
                    j += 1;
                    continue;
                }
                if self.codes[j] != code {
                    break;
                }
                count += 1;
                j += 1;
            }
            runs.push((code, count));
            i = j;
        }
        runs
    }
}

impl Default for FrameCodeTable {
    fn default() -> Self {
        Self::generic()
    }
}
