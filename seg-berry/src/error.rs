//! 运行时错误.

use crate::{Idx3d, Spacing3d};
use std::path::PathBuf;
use thiserror::Error;

/// 评分与汇总的配置错误和 I/O 错误.
///
/// 逐条数据上的可恢复问题不在此列, 它们被记入 [`crate::SkipReport`].
#[derive(Debug, Error)]
pub enum ScoreError {
    /// 底层文件 I/O 错误.
    #[error("I/O error on `{}`", .path.display())]
    Io {
        /// 出错的路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: std::io::Error,
    },

    /// 文件内容不是合法 JSON.
    #[error("malformed JSON in `{}`", .path.display())]
    Json {
        /// 出错的文件.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: serde_json::Error,
    },

    /// 内存中的 JSON 文本解析或序列化失败.
    #[error("malformed JSON")]
    JsonText(#[from] serde_json::Error),

    /// nifti 体数据读取失败.
    #[error("cannot read NIfTI volume `{}`", .path.display())]
    Nifti {
        /// 出错的文件.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: nifti::NiftiError,
    },

    /// 体数据可以读出, 但无法解释为三维标签.
    #[error("`{}` is not a 3D label volume: {detail}", .path.display())]
    Volume {
        /// 出错的文件.
        path: PathBuf,
        /// 具体原因.
        detail: String,
    },

    /// CSV 导出失败.
    #[error("CSV export failed")]
    Csv(#[from] csv::Error),

    /// 预测与参考掩膜形状不一致. 依次为预测形状和参考形状.
    #[error("shape mismatch: prediction {0:?}, reference {1:?}")]
    ShapeMismatch(Idx3d, Idx3d),

    /// 体素分辨率必须为有限正数.
    #[error("invalid voxel spacing {0:?}")]
    InvalidSpacing(Spacing3d),

    /// 路径不是目录.
    #[error("`{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// 评分文件结构不符合约定.
    #[error("unexpected score layout for patient `{patient}`: {detail}")]
    Layout {
        /// 病例编号.
        patient: String,
        /// 具体原因.
        detail: String,
    },

    /// 评分记录缺少必需字段.
    #[error("patient `{patient}` has no numeric `{field}` field")]
    MissingField {
        /// 病例编号.
        patient: String,
        /// 字段名.
        field: String,
    },

    /// 配对比较需要恰好 `expected` 个方法.
    #[error("exactly {expected} methods are required, found {}: {names:?}", .names.len())]
    MethodCount {
        /// 期望的方法个数.
        expected: usize,
        /// 实际出现的方法名.
        names: Vec<String>,
    },

    /// 两处给出的类别数不一致.
    #[error("class count mismatch: {left_name} has {left} classes, {right_name} has {right}")]
    ClassCountMismatch {
        /// 第一处来源.
        left_name: String,
        /// 第一处类别数.
        left: u16,
        /// 第二处来源.
        right_name: String,
        /// 第二处类别数.
        right: u16,
    },

    /// 类别名称表或中心代码表不合法.
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// 无法识别的指标名.
    #[error("unknown metric `{0}`, expected one of dice, iou, hd95, assd")]
    UnknownMetric(String),
}

/// 评分 / 汇总运行时结果.
pub type ScoreResult<T> = Result<T, ScoreError>;

impl ScoreError {
    /// 包装 `path` 上的 I/O 错误.
    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
