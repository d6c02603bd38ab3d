//! 二值掩膜评分: Dice, IoU, HD95, ASSD.
//!
//! # 退化情形
//!
//! | 预测 | 参考 | dice | iou | hd95 | assd |
//! |------|------|------|-----|------|------|
//! | 空   | 空   | 1    | 1   | 0    | 0    |
//! | 空   | 非空 | 0    | 0   | inf  | inf  |
//! | 非空 | 空   | 0    | 0   | inf  | inf  |
//!
//! 其余情形在体素集合上正常计算. 距离单位均为毫米.

use std::fmt;
use std::str::FromStr;

use crate::consts::keys;
use crate::volume::check_spacing;
use crate::{BinaryMask, ScoreError, ScoreResult, Spacing3d, VolumeGeometry};

mod distance;
mod overlap;
pub mod stats;

pub use distance::{squared_distance_map, surface_scores};
pub use overlap::OverlapCounts;

/// 四种分割指标.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    /// Dice 系数.
    Dice,
    /// 交并比.
    Iou,
    /// 95% Hausdorff 距离.
    Hd95,
    /// 平均对称表面距离.
    Assd,
}

impl MetricKind {
    /// 全部指标, 按评分文件中的字段顺序排列.
    pub const ALL: [MetricKind; 4] = [Self::Dice, Self::Iou, Self::Hd95, Self::Assd];

    /// 评分文件中的字段名.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Dice => keys::DICE,
            Self::Iou => keys::IOU,
            Self::Hd95 => keys::HD95,
            Self::Assd => keys::ASSD,
        }
    }

    /// 是否越大越好? 重叠类指标越大越好, 距离类指标越小越好.
    #[inline]
    pub fn higher_is_better(self) -> bool {
        matches!(self, Self::Dice | Self::Iou)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ScoreError::UnknownMetric(s.to_string()))
    }
}

/// 一对掩膜的评分结果.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegScores {
    /// Dice 系数, 位于 `[0, 1]`.
    pub dice: f64,
    /// 交并比, 位于 `[0, 1]`.
    pub iou: f64,
    /// 95% Hausdorff 距离 (毫米), 非负或正无穷.
    pub hd95: f64,
    /// 平均对称表面距离 (毫米), 非负或正无穷.
    pub assd: f64,
}

impl SegScores {
    /// 预测与参考均为空.
    pub const BOTH_EMPTY: Self = Self {
        dice: 1.0,
        iou: 1.0,
        hd95: 0.0,
        assd: 0.0,
    };

    /// 预测与参考恰有一个为空.
    pub const ONE_EMPTY: Self = Self {
        dice: 0.0,
        iou: 0.0,
        hd95: f64::INFINITY,
        assd: f64::INFINITY,
    };

    /// 按指标取值.
    #[inline]
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Dice => self.dice,
            MetricKind::Iou => self.iou,
            MetricKind::Hd95 => self.hd95,
            MetricKind::Assd => self.assd,
        }
    }
}

/// 计算预测 `pred` 相对参考 `reference` 的四项指标. `spacing` 按 `(z, h, w)` 排列.
///
/// 形状不一致或分辨率不是有限正数时返回 `Err`. 结果关于两个掩膜对称.
pub fn score(pred: &BinaryMask, reference: &BinaryMask, spacing: Spacing3d) -> ScoreResult<SegScores> {
    if pred.shape() != reference.shape() {
        return Err(ScoreError::ShapeMismatch(pred.shape(), reference.shape()));
    }
    let spacing = check_spacing(spacing)?;

    let counts = OverlapCounts::of(pred, reference);
    match (counts.pred, counts.reference) {
        (0, 0) => return Ok(SegScores::BOTH_EMPTY),
        (0, _) | (_, 0) => return Ok(SegScores::ONE_EMPTY),
        _ => (),
    }

    let (hd95, assd) = surface_scores(&pred.surface(), &reference.surface(), spacing);
    Ok(SegScores {
        dice: counts.dice(),
        iou: counts.iou(),
        hd95,
        assd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Idx3d;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn block(shape: Idx3d, z: (usize, usize), h: (usize, usize), w: (usize, usize)) -> BinaryMask {
        let it = (z.0..z.1).flat_map(|i| {
            (h.0..h.1).flat_map(move |j| (w.0..w.1).map(move |k| (i, j, k)))
        });
        BinaryMask::from_positions(shape, it)
    }

    fn assert_scores_eq(a: SegScores, b: SegScores) {
        for k in MetricKind::ALL {
            assert!(float_eq(a.get(k), b.get(k)), "{k}: {} vs {}", a.get(k), b.get(k));
        }
    }

    #[test]
    fn test_degenerate_policy() {
        let empty = BinaryMask::empty((3, 3, 3));
        let one = BinaryMask::from_positions((3, 3, 3), [(1, 1, 1)]);

        assert_eq!(score(&empty, &empty, [1.0; 3]).unwrap(), SegScores::BOTH_EMPTY);
        assert_eq!(score(&empty, &one, [1.0; 3]).unwrap(), SegScores::ONE_EMPTY);
        assert_eq!(score(&one, &empty, [1.0; 3]).unwrap(), SegScores::ONE_EMPTY);
    }

    #[test]
    fn test_self_score() {
        let a = block((6, 6, 6), (1, 4), (2, 5), (0, 3));
        let s = score(&a, &a, [3.0, 0.8, 0.8]).unwrap();
        assert_eq!(s, SegScores { dice: 1.0, iou: 1.0, hd95: 0.0, assd: 0.0 });
    }

    #[test]
    fn test_symmetry() {
        let a = block((6, 7, 8), (1, 4), (1, 4), (1, 4));
        let b = block((6, 7, 8), (2, 5), (1, 6), (2, 7));
        let spacing = [2.0, 0.5, 0.75];
        let ab = score(&a, &b, spacing).unwrap();
        let ba = score(&b, &a, spacing).unwrap();
        assert_scores_eq(ab, ba);
        assert!(ab.dice > 0.0 && ab.dice < 1.0);
        assert!(ab.hd95 > 0.0 && ab.assd > 0.0);
    }

    #[test]
    fn test_shifted_cube_overlap() {
        let a = block((5, 5, 6), (1, 4), (1, 4), (1, 4));
        let b = block((5, 5, 6), (1, 4), (1, 4), (2, 5));
        let s = score(&a, &b, [1.0; 3]).unwrap();
        assert!(float_eq(s.dice, 2.0 / 3.0));
        assert!(float_eq(s.iou, 0.5));
    }

    #[test]
    fn test_known_distances() {
        let pred = block((1, 1, 10), (0, 1), (0, 1), (0, 4));
        let reference = block((1, 1, 10), (0, 1), (0, 1), (0, 6));
        let s = score(&pred, &reference, [1.0; 3]).unwrap();
        assert!(float_eq(s.dice, 0.8));
        assert!(float_eq(s.iou, 4.0 / 6.0));
        assert!(float_eq(s.hd95, 1.75));
        assert!(float_eq(s.assd, 0.3));
    }

    #[test]
    fn test_anisotropic_spacing() {
        let a = BinaryMask::from_positions((5, 1, 1), [(0, 0, 0)]);
        let b = BinaryMask::from_positions((5, 1, 1), [(3, 0, 0)]);
        let s = score(&a, &b, [2.5, 1.0, 1.0]).unwrap();
        assert_eq!(s.dice, 0.0);
        assert!(float_eq(s.hd95, 7.5));
        assert!(float_eq(s.assd, 7.5));

        // 同样的位移放在 w 轴上, 距离随之改变.
        let a = BinaryMask::from_positions((1, 1, 5), [(0, 0, 0)]);
        let b = BinaryMask::from_positions((1, 1, 5), [(0, 0, 3)]);
        let s = score(&a, &b, [2.5, 1.0, 0.5]).unwrap();
        assert!(float_eq(s.hd95, 1.5));
    }

    #[test]
    fn test_invalid_input() {
        let a = BinaryMask::empty((2, 2, 2));
        let b = BinaryMask::empty((2, 2, 3));
        assert!(matches!(
            score(&a, &b, [1.0; 3]),
            Err(ScoreError::ShapeMismatch((2, 2, 2), (2, 2, 3)))
        ));
        assert!(matches!(
            score(&a, &a, [1.0, -1.0, 1.0]),
            Err(ScoreError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn test_metric_kind() {
        assert_eq!("HD95".parse::<MetricKind>().unwrap(), MetricKind::Hd95);
        assert_eq!(MetricKind::Assd.to_string(), "assd");
        assert!("time".parse::<MetricKind>().is_err());
        assert!(MetricKind::Dice.higher_is_better());
        assert!(!MetricKind::Hd95.higher_is_better());
    }
}
