//! 体素重叠计数, Dice 与 IoU.

use crate::BinaryMask;

/// 预测与参考掩膜的前景计数.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlapCounts {
    /// 预测前景体素数 `|A|`.
    pub pred: usize,

    /// 参考前景体素数 `|B|`.
    pub reference: usize,

    /// 交集体素数 `|A∩B|`.
    pub intersection: usize,
}

impl OverlapCounts {
    /// 统计两掩膜的前景计数. 两者形状必须一致.
    #[inline]
    pub fn of(pred: &BinaryMask, reference: &BinaryMask) -> Self {
        Self {
            pred: pred.count(),
            reference: reference.count(),
            intersection: pred.intersection_count(reference),
        }
    }

    /// 并集体素数 `|A∪B|`.
    #[inline]
    pub fn union(&self) -> usize {
        self.pred + self.reference - self.intersection
    }

    /// `2|A∩B| / (|A|+|B|)`. 两者均为空时为 1.
    #[inline]
    pub fn dice(&self) -> f64 {
        match self.pred + self.reference {
            0 => 1.0,
            total => 2.0 * self.intersection as f64 / total as f64,
        }
    }

    /// `|A∩B| / |A∪B|`. 两者均为空时为 1.
    #[inline]
    pub fn iou(&self) -> f64 {
        match self.union() {
            0 => 1.0,
            union => self.intersection as f64 / union as f64,
        }
    }
}
