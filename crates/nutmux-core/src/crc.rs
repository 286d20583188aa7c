//! CRC 校验和计算.
//!
//! NUT 的包头、包尾和帧头校验均使用 CRC-32:
//! 多项式 0x04C11DB7, 高位在前, 初始值 0, 无最终异或, 以大端写出.

/// CRC-32 查找表 (多项式 0x04C11DB7, MSB first)
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// 计算 CRC-32
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finish()
}

/// 增量 CRC-32 计算器
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    /// 以初始值 0 开始
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// 追加数据
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.value;
        for &byte in data {
            let idx = ((crc >> 24) ^ u32::from(byte)) & 0xFF;
            crc = (crc << 8) ^ CRC32_TABLE[idx as usize];
        }
        self.value = crc;
    }

    /// 当前校验值
    pub const fn finish(&self) -> u32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty_data() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_known_value() {
        // 与 CRC-32/POSIX 相同但无最终异或: 0x765E7680 ^ 0xFFFFFFFF
        assert_eq!(crc32(b"123456789"), 0x89A1_897F);
    }

    #[test]
    fn test_crc32_追加校验值后余数为零() {
        let data = b"nut/multimedia container";
        let mut buf = data.to_vec();
        buf.extend_from_slice(&crc32(data).to_be_bytes());
        assert_eq!(crc32(&buf), 0);
    }

    #[test]
    fn test_crc32_增量与一次性一致() {
        let mut crc = Crc32::new();
        crc.update(b"nut/");
        crc.update(b"multimedia");
        assert_eq!(crc.finish(), crc32(b"nut/multimedia"));
    }
}
