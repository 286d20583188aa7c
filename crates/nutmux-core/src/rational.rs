//! 时间基与采样率使用的无符号有理数.
//!
//! NUT 把有理数写成两个无符号变长整数, 因此这里只有 u32 分子和分母.

use std::fmt;

/// 有理数 `num/den`
///
/// 流时间基写作 `1/ticks`, 音频采样率写作 `rate/1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// 毫秒时间基, 跨流排序的公共单位
    pub const MILLI: Self = Self::new(1, 1_000);

    /// 每秒 `ticks` 个刻度的时间基, 即 `1/ticks`
    pub const fn per_second(ticks: u32) -> Self {
        Self::new(1, ticks)
    }

    /// 分母非零
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 浮点值, 分母为 0 时为 NaN
    pub fn to_f64(self) -> f64 {
        match self.den {
            0 => f64::NAN,
            den => f64::from(self.num) / f64::from(den),
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
