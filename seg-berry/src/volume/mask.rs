use std::ops::Index;

use ndarray::{Array3, ArrayView, Ix3, Zip};

use super::VolumeGeometry;
use crate::Idx3d;

/// 单一类别的三维二值掩膜. `true` 代表前景.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    data: Array3<bool>,
}

impl VolumeGeometry for BinaryMask {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for BinaryMask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl BinaryMask {
    /// 由 `(z, h, w)` 排列的布尔数组直接创建.
    #[inline]
    pub fn new(data: Array3<bool>) -> Self {
        Self { data }
    }

    /// 创建给定形状的全背景掩膜.
    #[inline]
    pub fn empty(shape: Idx3d) -> Self {
        Self::new(Array3::from_elem(shape, false))
    }

    /// 由前景索引集合创建掩膜. 越界索引会导致 panic.
    pub fn from_positions<I: IntoIterator<Item = Idx3d>>(shape: Idx3d, it: I) -> Self {
        let mut ans = Self::empty(shape);
        for pos in it {
            ans.data[pos] = true;
        }
        ans
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, bool, Ix3> {
        self.data.view()
    }

    /// 前景体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 是否不含任何前景?
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 与 `other` 同时为前景的体素个数. 两者形状必须一致, 否则程序 panic.
    #[inline]
    pub fn intersection_count(&self, other: &Self) -> usize {
        Zip::from(&self.data)
            .and(&other.data)
            .fold(0usize, |acc, &a, &b| acc + usize::from(a && b))
    }

    /// 收集所有表面体素, 结果按行优先存储.
    ///
    /// 一个前景体素只要有一个面相邻 (钻石型 6-邻域) 体素为背景或在数据范围外,
    /// 即为表面体素. 这等价于用 6-连通结构元、零边界做一次二值腐蚀再与原掩膜异或.
    pub fn surface(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter(|(_, p)| **p)
            .filter_map(|(pos, _)| {
                let on_surface = diamond_candidates(pos)
                    .into_iter()
                    .any(|n| !self.check(&n) || !self.data[n]);
                on_surface.then_some(pos)
            })
            .collect()
    }
}

/// 获取 `pos` 前后上下左右六个点的坐标. 越界的坐标 **不** 会被过滤,
/// 由调用方用 [`VolumeGeometry::check`] 判断.
#[inline]
fn diamond_candidates((z, h, w): Idx3d) -> [Idx3d; 6] {
    [
        (z.wrapping_sub(1), h, w),
        (z.saturating_add(1), h, w),
        (z, h.wrapping_sub(1), w),
        (z, h.saturating_add(1), w),
        (z, h, w.wrapping_sub(1)),
        (z, h, w.saturating_add(1)),
    ]
}

/// 多个索引集合的联合包围盒, 返回 `(起点, 终点)`, 终点不含.
/// 集合均为空时返回 `None`.
pub(crate) fn bounding_box<'a, I: IntoIterator<Item = &'a Idx3d>>(it: I) -> Option<(Idx3d, Idx3d)> {
    it.into_iter().fold(None, |acc, &(z, h, w)| match acc {
        None => Some(((z, h, w), (z + 1, h + 1, w + 1))),
        Some(((z0, h0, w0), (z1, h1, w1))) => Some((
            (z0.min(z), h0.min(h), w0.min(w)),
            (z1.max(z + 1), h1.max(h + 1), w1.max(w + 1)),
        )),
    })
}
