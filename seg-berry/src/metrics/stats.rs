//! 分位数与描述统计.

use ordered_float::OrderedFloat;
use serde::Serialize;

/// 升序排序. `NaN` 排在最后.
#[inline]
pub fn sort_values(values: &mut [f64]) {
    values.sort_unstable_by_key(|v| OrderedFloat(*v));
}

/// 已升序排列数据的第 `q` 百分位数 (`0 <= q <= 100`),
/// 在相邻顺序统计量间线性插值, 与 `numpy.percentile` 默认方法一致.
///
/// 空数据返回 `NaN`.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return f64::NAN;
    };
    let rank = q.clamp(0.0, 100.0) / 100.0 * last as f64;
    let (lo, hi) = (rank.floor() as usize, rank.ceil() as usize);
    if lo == hi {
        return sorted[lo];
    }
    let (a, b) = (sorted[lo], sorted[hi]);
    a + (b - a) * (rank - lo as f64)
}

/// 算术平均. 空数据返回 `NaN`.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 一组数值的描述统计. 非有限值不参与计算, 只计数.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// 参与统计的有限值个数.
    pub n: usize,
    /// 被排除的非有限值个数.
    pub non_finite: usize,
    /// 均值.
    pub mean: f64,
    /// 样本标准差 (自由度 `n - 1`).
    pub std: f64,
    /// 最小值.
    pub min: f64,
    /// 最大值.
    pub max: f64,
    /// 中位数.
    pub median: f64,
    /// 2.5% 分位数.
    pub q025: f64,
    /// 5% 分位数.
    pub q05: f64,
    /// 95% 分位数.
    pub q95: f64,
    /// 97.5% 分位数.
    pub q975: f64,
}

impl Summary {
    /// 计算描述统计. 没有有限值时, 除计数外全部为 `NaN`.
    pub fn of<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (mut finite, rest): (Vec<f64>, Vec<f64>) =
            values.into_iter().partition(|v| v.is_finite());
        sort_values(&mut finite);

        let n = finite.len();
        let mean = mean(&finite);
        let std = if n > 1 {
            let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Self {
            n,
            non_finite: rest.len(),
            mean,
            std,
            min: finite.first().copied().unwrap_or(f64::NAN),
            max: finite.last().copied().unwrap_or(f64::NAN),
            median: percentile(&finite, 50.0),
            q025: percentile(&finite, 2.5),
            q05: percentile(&finite, 5.0),
            q95: percentile(&finite, 95.0),
            q975: percentile(&finite, 97.5),
        }
    }
}
