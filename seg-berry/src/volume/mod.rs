//! 三维标签体数据与二值掩膜.

use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView, Ix3, Zip};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::BACKGROUND;
use crate::{Idx3d, ScoreError, ScoreResult, Spacing3d};

mod mask;

pub use mask::BinaryMask;
pub(crate) use mask::bounding_box;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(header: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = header.dim;
    (z as usize, h as usize, w as usize)
}

/// 将 pixdim 的 (W, H, z) 转换成 (z, H, W).
#[inline]
fn get_spacing_from_header(header: &NiftiHeader) -> Spacing3d {
    let [_, w, h, z, ..] = header.pixdim;
    [z as f64, h as f64, w as f64]
}

/// 检查分辨率是否为有限正数.
#[inline]
pub(crate) fn check_spacing(spacing: Spacing3d) -> ScoreResult<Spacing3d> {
    if spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
        Ok(spacing)
    } else {
        Err(ScoreError::InvalidSpacing(spacing))
    }
}

/// 三维体数据的形状属性和部分通用操作.
pub trait VolumeGeometry {
    /// 获取数据形状大小, 按 `(z, h, w)` 排列.
    fn shape(&self) -> Idx3d;

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }
}

/// 三维标签体数据. 标签值以 `u16` 保存, 分辨率以毫米为单位.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    data: Array3<u16>,
    spacing: Spacing3d,
}

impl VolumeGeometry for LabelVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for LabelVolume {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LabelVolume {
    /// 打开 nii / nii.gz 格式的三维标签. 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    ///
    /// 标签无论以何种数据类型存储, 都必须是 `0..=u16::MAX` 之间的整数.
    /// 形如 `(W, H, z, 1)` 的四维数据按三维处理.
    pub fn open<P: AsRef<Path>>(path: P) -> ScoreResult<Self> {
        let path = path.as_ref();
        let nifti_err = |source| ScoreError::Nifti {
            path: path.to_owned(),
            source,
        };
        let volume_err = |detail: String| ScoreError::Volume {
            path: path.to_owned(),
            detail,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
        let shape = get_shape_from_header(obj.header());
        let spacing = check_spacing(get_spacing_from_header(obj.header()))?;

        let raw = obj.into_volume().into_ndarray::<f32>().map_err(nifti_err)?;
        let (z, h, w) = shape;
        if raw.len() != z * h * w {
            return Err(volume_err(format!(
                "{} voxels do not fit the 3D shape {shape:?}",
                raw.len()
            )));
        }

        // [W, H, z, ..] -> [.., z, H, W]. 转置后的逻辑顺序即为行优先序.
        let mut labels = Vec::with_capacity(raw.len());
        for &v in raw.t().iter() {
            labels.push(to_label(v).ok_or_else(|| volume_err(format!("non-integer label {v}")))?);
        }
        let data = Array3::from_shape_vec(shape, labels)
            .map_err(|e| volume_err(e.to_string()))?;

        Ok(Self { data, spacing })
    }

    /// 根据裸标签数据直接创建实体. `data` 和 `spacing` 均按 `(z, h, w)` 组织.
    ///
    /// 分辨率不是有限正数时返回 `Err`.
    pub fn from_raw(data: Array3<u16>, spacing: Spacing3d) -> ScoreResult<Self> {
        let spacing = check_spacing(spacing)?;
        Ok(Self { data, spacing })
    }

    /// 获取单个体素分辨率, 以毫米为单位, 按 `(z, h, w)` 排列.
    #[inline]
    pub fn spacing(&self) -> Spacing3d {
        self.spacing
    }

    /// 获取单个体素的实际体积值, 以立方毫米为单位.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// 整幅图像的物理体积, 以立方毫米为单位.
    #[inline]
    pub fn physical_volume(&self) -> f64 {
        self.size() as f64 * self.voxel()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u16, Ix3> {
        self.data.view()
    }

    /// 获取值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u16) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 最大标签值. 空数据返回背景值.
    #[inline]
    pub fn max_label(&self) -> u16 {
        self.data.iter().copied().max().unwrap_or(BACKGROUND)
    }

    /// 按类别 `class_id` 二值化: 标签等于 `class_id` 的体素为前景.
    pub fn binarize(&self, class_id: u16) -> BinaryMask {
        let mut mask = Array3::from_elem(self.data.dim(), false);
        Zip::from(&mut mask)
            .and(&self.data)
            .for_each(|m, &p| *m = p == class_id);
        BinaryMask::new(mask)
    }
}

/// 浮点体素值转换为标签. 非整数, 负数或溢出均返回 `None`.
#[inline]
fn to_label(v: f32) -> Option<u16> {
    let r = v.round();
    ((r - v).abs() < 1e-3 && (0.0..=u16::MAX as f32).contains(&r)).then_some(r as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_to_label() {
        assert_eq!(to_label(0.0), Some(0));
        assert_eq!(to_label(3.0), Some(3));
        assert_eq!(to_label(2.9999), Some(3));
        assert_eq!(to_label(0.5), None);
        assert_eq!(to_label(-1.0), None);
        assert_eq!(to_label(f32::NAN), None);
        assert_eq!(to_label(1e6), None);
    }

    #[test]
    fn test_from_raw_spacing() {
        let data = Array3::<u16>::zeros((2, 3, 4));
        assert!(LabelVolume::from_raw(data.clone(), [1.0, 0.0, 1.0]).is_err());
        assert!(LabelVolume::from_raw(data.clone(), [1.0, f64::NAN, 1.0]).is_err());

        let v = LabelVolume::from_raw(data, [2.0, 0.5, 0.5]).unwrap();
        assert_eq!(v.shape(), (2, 3, 4));
        assert_eq!(v.size(), 24);
        assert_eq!(v.voxel(), 0.5);
        assert_eq!(v.physical_volume(), 12.0);
        assert_eq!(v.max_label(), BACKGROUND);
    }

    #[test]
    fn test_binarize_and_count() {
        let mut data = Array3::<u16>::zeros((2, 2, 2));
        data[(0, 0, 0)] = 1;
        data[(1, 1, 1)] = 2;
        data[(1, 0, 1)] = 2;
        let v = LabelVolume::from_raw(data, [1.0; 3]).unwrap();

        assert_eq!(v.max_label(), 2);
        assert_eq!(v.count(2), 2);
        assert_eq!(v[(1, 1, 1)], 2);

        let m = v.binarize(2);
        assert_eq!(m.count(), 2);
        assert!(m[(1, 0, 1)]);
        assert!(!m[(0, 0, 0)]);
        assert!(v.binarize(7).is_empty());
    }

    #[test]
    fn test_open_transposes_axes() {
        use nifti::writer::WriterOptions;

        // 文件内按 (x, y, z) = (W, H, z) 存储.
        let mut data = Array3::<u8>::zeros((4, 3, 2));
        data[(3, 2, 1)] = 1;
        data[(0, 1, 0)] = 2;
        let header = NiftiHeader {
            pixdim: [1.0, 0.5, 1.0, 2.5, 1.0, 1.0, 1.0, 1.0],
            ..NiftiHeader::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P1.nii.gz");
        WriterOptions::new(&path)
            .reference_header(&header)
            .write_nifti(&data)
            .unwrap();

        let v = LabelVolume::open(&path).unwrap();
        assert_eq!(v.shape(), (2, 3, 4));
        assert_eq!(v.spacing(), [2.5, 1.0, 0.5]);
        assert_eq!(v[(1, 2, 3)], 1);
        assert_eq!(v[(0, 1, 0)], 2);
        assert_eq!(v.count(1), 1);
        assert_eq!(v.max_label(), 2);
        assert_eq!(v.voxel(), 1.25);
    }
}
