//! 表面距离: 精确可分离欧氏距离变换 (Felzenszwalb & Huttenlocher), HD95 与 ASSD.
//!
//! 距离变换在两组表面体素的联合包围盒内进行. 包围盒内含全部特征点,
//! 因此盒内的结果与整幅图像上的结果完全一致.

use ndarray::{Array3, ArrayView3, ArrayViewMut1, Axis};

use super::stats::{percentile, sort_values};
use crate::consts::HD_PERCENTILE;
use crate::volume::bounding_box;
use crate::{Idx3d, Spacing3d};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 并行执行两个闭包.
        #[inline]
        fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
        where
            A: FnOnce() -> RA + Send,
            B: FnOnce() -> RB + Send,
            RA: Send,
            RB: Send,
        {
            rayon::join(a, b)
        }
    } else {
        /// 依次执行两个闭包.
        #[inline]
        fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
        where
            A: FnOnce() -> RA,
            B: FnOnce() -> RB,
        {
            (a(), b())
        }
    }
}

/// 一维下包络的工作区, 在同一轴的所有行之间复用.
struct Envelope {
    /// 构成下包络的抛物线顶点位置.
    v: Vec<usize>,
    /// 第 `k` 条抛物线在下包络上的左边界.
    z: Vec<f64>,
    out: Vec<f64>,
}

impl Envelope {
    fn new(n: usize) -> Self {
        Self {
            v: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            out: vec![0.0; n],
        }
    }

    /// 对一行平方距离 `f` 原地做一维变换, 体素间距为 `step` 毫米.
    /// 非有限值视作无特征点, 全行无特征点时保持不变.
    fn transform(&mut self, mut f: ArrayViewMut1<f64>, step: f64) {
        let n = f.len();
        self.v.clear();
        self.z.clear();

        for q in 0..n {
            let fq = f[q];
            if !fq.is_finite() {
                continue;
            }
            let xq = q as f64 * step;
            while let Some(&p) = self.v.last() {
                let xp = p as f64 * step;
                let s = ((fq + xq * xq) - (f[p] + xp * xp)) / (2.0 * (xq - xp));
                if self.z.last().is_some_and(|z| s <= *z) {
                    self.v.pop();
                    self.z.pop();
                } else {
                    self.v.push(q);
                    self.z.push(s);
                    break;
                }
            }
            if self.v.is_empty() {
                self.v.push(q);
                self.z.push(f64::NEG_INFINITY);
            }
        }

        if self.v.is_empty() {
            return;
        }

        let mut k = 0;
        for q in 0..n {
            let x = q as f64 * step;
            while k + 1 < self.v.len() && self.z[k + 1] < x {
                k += 1;
            }
            let p = self.v[k];
            let d = x - p as f64 * step;
            self.out[q] = d * d + f[p];
        }
        for (dst, src) in f.iter_mut().zip(self.out.iter()) {
            *dst = *src;
        }
    }
}

/// 计算每个体素到最近特征体素 (`features` 中为 `true`) 的平方物理距离.
///
/// 没有任何特征体素时, 结果全部为正无穷.
pub fn squared_distance_map(features: ArrayView3<bool>, spacing: Spacing3d) -> Array3<f64> {
    let mut dist = features.map(|f| if *f { 0.0 } else { f64::INFINITY });
    for (axis, step) in spacing.into_iter().enumerate() {
        let mut env = Envelope::new(dist.len_of(Axis(axis)));
        for lane in dist.lanes_mut(Axis(axis)) {
            env.transform(lane, step);
        }
    }
    dist
}

/// `from` 中每个表面体素到 `to` 最近表面体素的距离 (毫米).
/// 所有坐标都已减去包围盒起点 `lo`, `dim` 为包围盒形状.
fn directed_distances(
    from: &[Idx3d],
    to: &[Idx3d],
    lo: Idx3d,
    dim: Idx3d,
    spacing: Spacing3d,
) -> Vec<f64> {
    let shift = |(z, h, w): Idx3d| (z - lo.0, h - lo.1, w - lo.2);

    let mut features = Array3::from_elem(dim, false);
    for &p in to {
        features[shift(p)] = true;
    }
    let dist = squared_distance_map(features.view(), spacing);
    from.iter().map(|&p| dist[shift(p)].sqrt()).collect()
}

/// 由两组表面计算 `(hd95, assd)`.
///
/// 两组均为空时返回 `(0, 0)`, 仅一组为空时返回 `(inf, inf)`.
pub fn surface_scores(pred: &[Idx3d], reference: &[Idx3d], spacing: Spacing3d) -> (f64, f64) {
    let Some((lo, hi)) = bounding_box(pred.iter().chain(reference.iter())) else {
        return (0.0, 0.0);
    };
    if pred.is_empty() || reference.is_empty() {
        return (f64::INFINITY, f64::INFINITY);
    }
    let dim = (hi.0 - lo.0, hi.1 - lo.1, hi.2 - lo.2);

    let (mut d_pred, mut d_ref) = join(
        || directed_distances(pred, reference, lo, dim, spacing),
        || directed_distances(reference, pred, lo, dim, spacing),
    );
    tracing::trace!(pred = d_pred.len(), reference = d_ref.len(), "surface distances");

    let total: f64 = d_pred.iter().chain(d_ref.iter()).sum();
    let assd = total / (d_pred.len() + d_ref.len()) as f64;

    sort_values(&mut d_pred);
    sort_values(&mut d_ref);
    let hd95 = percentile(&d_pred, HD_PERCENTILE).max(percentile(&d_ref, HD_PERCENTILE));

    (hd95, assd)
}
