//! 批处理中被跳过的条目.

use crate::Idx3d;
use std::fmt;
use thiserror::Error;

/// 条目被跳过的原因. 均为可恢复问题, 不会中断批处理.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// 预测体数据读取失败.
    #[error("read error: {0}")]
    PredictionUnreadable(String),

    /// 参考目录下没有同名文件.
    #[error("no matching reference")]
    MissingReference,

    /// 参考体数据读取失败.
    #[error("refs error: {0}")]
    ReferenceUnreadable(String),

    /// 预测与参考形状不一致.
    #[error("shape mismatch: prediction {0:?}, reference {1:?}")]
    ShapeMismatch(Idx3d, Idx3d),

    /// 多类别模式下, 预测中没有任何前景类别可评.
    #[error("prediction has no foreground class")]
    NoForegroundClass,

    /// 解剖子目录下没有评分文件.
    #[error("no score file")]
    MissingScoreFile,

    /// 类别名称表中没有该类别.
    #[error("class {0} has no name in the label manifest")]
    UnknownClassLabel(u16),

    /// 字段值不是数值, 无法作为指标.
    #[error("field `{0}` is not numeric")]
    NonNumericField(String),
}

/// 一条被跳过的记录.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// 被跳过的条目 (文件路径, 病例编号等).
    pub item: String,

    /// 原因.
    pub reason: SkipReason,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.item)
    }
}

/// 跳过记录汇总. 批处理结束时统一展示.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipReport {
    entries: Vec<Skipped>,
}

impl SkipReport {
    /// 空报告.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条跳过, 同时发出 `warn` 事件.
    pub fn push(&mut self, item: impl Into<String>, reason: SkipReason) {
        let item = item.into();
        tracing::warn!(%item, %reason, "skipped");
        self.entries.push(Skipped { item, reason });
    }

    /// 合并另一份报告. 不会重复发出 `warn` 事件.
    #[inline]
    pub fn merge(&mut self, other: SkipReport) {
        self.entries.extend(other.entries);
    }

    /// 跳过条目数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何跳过?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按记录顺序迭代.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Skipped> {
        self.entries.iter()
    }
}

impl fmt::Display for SkipReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Skipped:")?;
        for s in self.entries.iter() {
            writeln!(f, "\t- {s}")?;
        }
        Ok(())
    }
}
