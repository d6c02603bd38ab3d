//! 标签体数据的读取接口.

use std::path::Path;

use crate::{LabelVolume, ScoreResult};

/// 标签体数据读取器.
///
/// 默认实现 [`NiftiReader`] 读取 nii / nii.gz 文件. 其他格式,
/// 或测试中的内存数据, 可以自行实现该 trait 后交给 [`super::ScoreCollector`].
pub trait VolumeReader: Send + Sync {
    /// 读取 `path` 处的标签体数据.
    fn read(&self, path: &Path) -> ScoreResult<LabelVolume>;
}

/// 通过 `nifti` crate 读取标签.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiReader;

impl VolumeReader for NiftiReader {
    #[inline]
    fn read(&self, path: &Path) -> ScoreResult<LabelVolume> {
        LabelVolume::open(path)
    }
}
