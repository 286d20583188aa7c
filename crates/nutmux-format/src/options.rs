//! 封装选项.

use nutmux_core::{MuxError, MuxResult};
use serde::{Deserialize, Serialize};

/// NUT 允许的最大同步点间距 (字节)
pub const MAX_DISTANCE_LIMIT: u32 = 65536;

/// 封装器选项
///
/// 所有字段都有默认值, 可以从 JSON 等格式部分反序列化.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MuxerOptions {
    /// 重排序窗口 (毫秒), 0 表示帧一到达就写出
    pub frame_ordering_buffer_millis: u64,
    /// 视频帧是否携带解码后的图像; 为 false 时视频帧必须携带原始线上字节
    pub generate_images: bool,
    /// 两个同步点之间的最大字节距离
    pub max_distance: u32,
    /// 每条流的最大 pts 距离
    pub max_pts_distance: u32,
    /// 关闭时是否写入索引
    pub write_index: bool,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            frame_ordering_buffer_millis: 200,
            generate_images: true,
            max_distance: 32767,
            max_pts_distance: 60000,
            write_index: true,
        }
    }
}

impl MuxerOptions {
    /// 检查选项取值
    pub fn validate(&self) -> MuxResult<()> {
        if self.max_distance == 0 || self.max_distance > MAX_DISTANCE_LIMIT {
            return Err(MuxError::InvalidArgument(format!(
                "max_distance 必须在 1..={MAX_DISTANCE_LIMIT} 范围内, 实际为 {}",
                self.max_distance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_默认值() {
        let opts = MuxerOptions::default();
        assert_eq!(opts.frame_ordering_buffer_millis, 200);
        assert!(opts.generate_images);
        assert_eq!(opts.max_distance, 32767);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_部分反序列化() {
        let opts: MuxerOptions =
            serde_json::from_str(r#"{"frame_ordering_buffer_millis": 0, "write_index": false}"#)
                .unwrap();
        assert_eq!(opts.frame_ordering_buffer_millis, 0);
        assert!(!opts.write_index);
        assert_eq!(opts.max_pts_distance, 60000);
    }

    #[test]
    fn test_max_distance_越界() {
        let mut opts = MuxerOptions {
            max_distance: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
        opts.max_distance = MAX_DISTANCE_LIMIT + 1;
        assert!(opts.validate().is_err());
        opts.max_distance = MAX_DISTANCE_LIMIT;
        assert!(opts.validate().is_ok());
    }
}
