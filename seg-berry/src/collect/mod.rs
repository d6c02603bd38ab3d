//! 评分收集: 按文件名匹配预测目录与参考目录, 逐病例评分, 产出评分文件.
//!
//! # 注意
//!
//! 1. 单个病例的问题 (读取失败, 缺少参考, 形状不一致, 没有前景类别)
//!   只会记入 [`SkipReport`], 不会中断批处理.
//! 2. 评分文件在内存中构造完毕后, 由调用方一次性写出.

use std::path::{Path, PathBuf};

use crate::consts::{NIFTI_EXTENSIONS, SCORE_FILE_NAME};
use crate::metrics::{self, SegScores};
use crate::scores::{FieldMap, MetricRecord, ScoreEntry, ScoreFile};
use crate::{LabelVolume, ScoreError, ScoreResult, SkipReason, SkipReport, VolumeGeometry};

mod pairs;
mod reader;

pub use pairs::{pair_loader, PairLoader, VolumePair};
pub use reader::{NiftiReader, VolumeReader};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        /// 并行地对每个元素实施 `op`, 结果保持原顺序.
        fn map_ordered<T, U, F>(items: &[T], op: F) -> Vec<U>
        where
            T: Sync,
            U: Send,
            F: Fn(&T) -> U + Sync + Send,
        {
            items.par_iter().map(op).collect()
        }
    } else {
        /// 依次对每个元素实施 `op`.
        fn map_ordered<T, U, F>(items: &[T], op: F) -> Vec<U>
        where
            F: Fn(&T) -> U,
        {
            items.iter().map(op).collect()
        }
    }
}

/// 参与评分的类别.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassSelector {
    /// 单类别模式: 只评该类别, 记录中不写 `"class"` 字段.
    Single(u16),

    /// 多类别模式: 评 `1..=N` 的每个类别.
    ///
    /// `None` 表示逐病例推断 `N` 为该病例预测中的最大标签值;
    /// `Some(N)` 为固定类别数 (通常来自 `dataset.json`).
    Multi(Option<u16>),
}

/// 病例编号的生成方式.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatientIdStyle {
    /// 完整文件名, 如 `UMCU 001.nii.gz`.
    #[default]
    FileName,

    /// 去掉 NIfTI 扩展名的文件名, 如 `UMCU 001`.
    Stem,
}

impl PatientIdStyle {
    /// 由文件名生成病例编号.
    pub fn patient_id(self, file_name: &str) -> String {
        match self {
            Self::FileName => file_name.to_string(),
            Self::Stem => NIFTI_EXTENSIONS
                .iter()
                .find_map(|ext| file_name.strip_suffix(ext))
                .unwrap_or(file_name)
                .to_string(),
        }
    }
}

/// 一次收集的结果.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// 评分文件.
    pub scores: ScoreFile,

    /// 被跳过的病例.
    pub skipped: SkipReport,
}

/// 评分收集器.
#[derive(Debug, Clone, Default)]
pub struct ScoreCollector<R = NiftiReader> {
    reader: R,
    id_style: PatientIdStyle,
}

impl ScoreCollector<NiftiReader> {
    /// 读取 NIfTI 标签的收集器.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: VolumeReader> ScoreCollector<R> {
    /// 使用自定义读取器.
    #[inline]
    pub fn with_reader(reader: R) -> Self {
        Self {
            reader,
            id_style: PatientIdStyle::default(),
        }
    }

    /// 设置病例编号的生成方式.
    #[inline]
    pub fn id_style(mut self, style: PatientIdStyle) -> Self {
        self.id_style = style;
        self
    }

    /// 对 `pred_dir` 下每个文件与 `ref_dir` 下同名文件评分.
    ///
    /// 只有目录本身不可用时返回 `Err`; 单个病例的问题记入 [`Collection::skipped`].
    pub fn collect<P, Q>(
        &self,
        pred_dir: P,
        ref_dir: Q,
        selector: ClassSelector,
    ) -> ScoreResult<Collection>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let pairs: Vec<VolumePair> = pair_loader(pred_dir.as_ref(), ref_dir.as_ref())?.collect();
        tracing::info!(
            predictions = %pred_dir.as_ref().display(),
            references = %ref_dir.as_ref().display(),
            files = pairs.len(),
            ?selector,
            "collecting scores"
        );

        let results = map_ordered(&pairs, |pair| self.score_pair(pair, selector));

        let mut ans = Collection::default();
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(entry) => {
                    let patient = self.id_style.patient_id(&pair.file_name);
                    tracing::debug!(%patient, records = entry.records().len(), "scored");
                    ans.scores.insert(patient, entry);
                }
                Err(reason) => ans.skipped.push(pair.prediction.display().to_string(), reason),
            }
        }

        tracing::info!(
            patients = ans.scores.len(),
            skipped = ans.skipped.len(),
            "collection finished"
        );
        Ok(ans)
    }

    fn score_pair(
        &self,
        pair: &VolumePair,
        selector: ClassSelector,
    ) -> Result<ScoreEntry, SkipReason> {
        let pred = self
            .reader
            .read(&pair.prediction)
            .map_err(|e| SkipReason::PredictionUnreadable(e.to_string()))?;
        if !pair.reference.is_file() {
            return Err(SkipReason::MissingReference);
        }
        let reference = self
            .reader
            .read(&pair.reference)
            .map_err(|e| SkipReason::ReferenceUnreadable(e.to_string()))?;
        if pred.shape() != reference.shape() {
            return Err(SkipReason::ShapeMismatch(pred.shape(), reference.shape()));
        }

        match selector {
            ClassSelector::Single(c) => Ok(class_record(&pred, &reference, c, None)?.into()),
            ClassSelector::Multi(n) => {
                let n = n.unwrap_or_else(|| pred.max_label());
                if n == 0 {
                    return Err(SkipReason::NoForegroundClass);
                }
                let records = (1..=n)
                    .map(|c| class_record(&pred, &reference, c, Some(c)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records.into())
            }
        }
    }
}

/// 单个类别的评分记录. 分辨率取自预测.
fn class_record(
    pred: &LabelVolume,
    reference: &LabelVolume,
    class: u16,
    class_id: Option<u16>,
) -> Result<MetricRecord, SkipReason> {
    let p = pred.binarize(class);
    let r = reference.binarize(class);
    let scores: SegScores = metrics::score(&p, &r, pred.spacing()).map_err(|e| match e {
        ScoreError::ShapeMismatch(a, b) => SkipReason::ShapeMismatch(a, b),
        other => SkipReason::PredictionUnreadable(other.to_string()),
    })?;
    tracing::trace!(class, dice = scores.dice, hd95 = scores.hd95, "class scored");

    Ok(MetricRecord {
        class_id,
        scores,
        volume: pred.physical_volume(),
        segment_volume: r.count() as f64 * pred.voxel(),
        extra: FieldMap::new(),
    })
}

/// 评分文件输出路径: 未指定时为 `<pred_dir>/scores.json`;
/// 指定已存在的目录时为 `<dir>/scores.json`; 否则即为给定路径.
pub fn resolve_output<P: AsRef<Path>>(pred_dir: P, output: Option<&Path>) -> PathBuf {
    match output {
        None => pred_dir.as_ref().join(SCORE_FILE_NAME),
        Some(p) if p.is_dir() => p.join(SCORE_FILE_NAME),
        Some(p) => p.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_id_style() {
        assert_eq!(PatientIdStyle::FileName.patient_id("UMCU 001.nii.gz"), "UMCU 001.nii.gz");
        assert_eq!(PatientIdStyle::Stem.patient_id("UMCU 001.nii.gz"), "UMCU 001");
        assert_eq!(PatientIdStyle::Stem.patient_id("a.nii"), "a");
        assert_eq!(PatientIdStyle::Stem.patient_id("a.mha"), "a.mha");
    }

    #[test]
    fn test_resolve_output() {
        let dir = tempfile::tempdir().unwrap();
        let pred = Path::new("/data/pred");
        assert_eq!(resolve_output(pred, None), pred.join("scores.json"));
        assert_eq!(
            resolve_output(pred, Some(dir.path())),
            dir.path().join("scores.json")
        );
        let file = dir.path().join("out.json");
        assert_eq!(resolve_output(pred, Some(&file)), file);
    }
}
