//! 时间戳类型与全局时间归一化.
//!
//! 每条流的时间戳以各自的时间基计数. 重排序缓冲区需要在所有流之间比较先后,
//! 因此统一换算为毫秒: `ms = floor(pts * 1000 / timebase)`.

use crate::rational::Rational;
use std::fmt;

/// 时间戳
///
/// 包含一个整数值和对应的时间基 (time_base).
/// 实际时间 (秒) = pts * time_base.num / time_base.den.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// 时间戳值
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
}

impl Timestamp {
    /// 创建新的时间戳
    pub const fn new(pts: i64, time_base: Rational) -> Self {
        Self { pts, time_base }
    }

    /// 判断时间基是否有效
    pub const fn is_valid(&self) -> bool {
        self.time_base.is_valid()
    }

    /// 转换为秒 (f64)
    ///
    /// 无效时间戳返回 `f64::NAN`.
    pub fn to_seconds(&self) -> f64 {
        if !self.is_valid() {
            return f64::NAN;
        }
        self.pts as f64 * self.time_base.to_f64()
    }

    /// 将时间戳重缩放到新的时间基, 向负无穷取整
    ///
    /// 通过 i128 交叉乘法避免溢出和浮点误差:
    /// new_pts = floor(pts * old_tb.num * new_tb.den / (old_tb.den * new_tb.num))
    ///
    /// 任一时间基无效时返回 `None`.
    pub fn rescale(&self, new_time_base: Rational) -> Option<Self> {
        if !self.is_valid() || !new_time_base.is_valid() || new_time_base.num == 0 {
            return None;
        }
        let num =
            i128::from(self.pts) * i128::from(self.time_base.num) * i128::from(new_time_base.den);
        let den = i128::from(self.time_base.den) * i128::from(new_time_base.num);
        let pts = i64::try_from(num.div_euclid(den)).ok()?;
        Some(Self {
            pts,
            time_base: new_time_base,
        })
    }

    /// 换算为毫秒, 用作跨流排序的全局时间
    pub fn to_millis(&self) -> Option<i64> {
        self.rescale(Rational::MILLI).map(|ts| ts.pts)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            write!(f, "NOPTS")
        } else {
            write!(f, "{:.6}s", self.to_seconds())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_转换为秒() {
        let ts = Timestamp::new(44100, Rational::per_second(44100));
        assert!((ts.to_seconds() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_timestamp_换算毫秒() {
        // 44100 时间基下的 10 个刻度不足 1ms
        assert_eq!(
            Timestamp::new(10, Rational::per_second(44100)).to_millis(),
            Some(0)
        );
        assert_eq!(
            Timestamp::new(60000, Rational::per_second(60000)).to_millis(),
            Some(1000)
        );
        assert_eq!(
            Timestamp::new(1001, Rational::per_second(30000)).to_millis(),
            Some(33)
        );
    }

    #[test]
    fn test_timestamp_负值向下取整() {
        let ts = Timestamp::new(-1, Rational::per_second(44100));
        assert_eq!(ts.to_millis(), Some(-1));
    }

    #[test]
    fn test_timestamp_重缩放() {
        let ts = Timestamp::new(90000, Rational::per_second(90000));
        let rescaled = ts.rescale(Rational::MILLI);
        assert_eq!(rescaled.map(|t| t.pts), Some(1000));
    }

    #[test]
    fn test_timestamp_无效值() {
        let ts = Timestamp::new(5, Rational::new(1, 0));
        assert!(!ts.is_valid());
        assert!(ts.to_seconds().is_nan());
        assert_eq!(ts.to_millis(), None);
    }
}
