//! 长表汇总.
//!
//! 多个方法、多个解剖结构的评分文件被展开为统一的长表, 每行一个
//! (病例, 解剖结构, 方法, 中心, 指标). 每条源数据恰好展开为两行:
//! 中心为 `"All"` 的一行, 以及中心为推导结果的一行.
//!
//! # 注意
//!
//! 1. 同一方法下重复给出同一文件会导致重复计数, 这里不做去重.
//! 2. 评分文件无法读取或结构错误时直接返回 `Err`, 因为文件是调用方显式给出的.
//! 3. 表一旦构造完成即不再修改, 过滤操作均返回新表.

use std::io::Write;
use std::path::Path;

use itertools::Itertools;

use crate::consts::{keys, ALL_CENTERS};
use crate::json::value_to_f64;
use crate::labels::DatasetLabels;
use crate::scores::ScoreFile;
use crate::{ScoreResult, SkipReason, SkipReport};

mod center;
mod compare;
mod pivot;
mod source;

pub use center::CenterMap;
pub use compare::{CenterSummary, DifferenceReport, PairedDifference};
pub use pivot::{PivotKey, PivotRow, PivotTable};
pub use source::{group_sources, Discovery, MethodSource};

/// 长表中的一行.
#[derive(Debug, Clone, PartialEq)]
pub struct LongFormRow {
    /// 病例编号.
    pub pt_id: String,
    /// 解剖结构.
    pub anatomy: String,
    /// 方法名. 单文件读取时为 `None`.
    pub method: Option<String>,
    /// 中心名称, 或哨兵 `"All"`.
    pub center: String,
    /// 类别编号, 仅多类别记录有.
    pub class_id: Option<u16>,
    /// 指标名.
    pub metric_name: String,
    /// 指标值.
    pub metric: f64,
    /// 参考标注该类别的物理体积 (立方毫米), 缺失时为 `NaN`.
    pub segment_volume: f64,
    /// 整幅图像的物理体积 (立方毫米), 缺失时为 `NaN`.
    pub volume: f64,
}

impl LongFormRow {
    /// 是否为 `"All"` 重复行?
    #[inline]
    pub fn is_all_centers(&self) -> bool {
        self.center == ALL_CENTERS
    }
}

/// 尚未打上中心标签的行. 经 [`CenterMap::expand`] 变为两条 [`LongFormRow`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlatRow {
    pub(crate) pt_id: String,
    pub(crate) anatomy: String,
    pub(crate) method: Option<String>,
    pub(crate) class_id: Option<u16>,
    pub(crate) metric_name: String,
    pub(crate) metric: f64,
    pub(crate) segment_volume: f64,
    pub(crate) volume: f64,
}

impl FlatRow {
    #[inline]
    pub(crate) fn into_long(self, center: String) -> LongFormRow {
        LongFormRow {
            pt_id: self.pt_id,
            anatomy: self.anatomy,
            method: self.method,
            center,
            class_id: self.class_id,
            metric_name: self.metric_name,
            metric: self.metric,
            segment_volume: self.segment_volume,
            volume: self.volume,
        }
    }
}

/// 解剖结构名的来源.
#[derive(Debug, Clone, Default)]
pub enum AnatomyRule {
    /// 评分文件父目录名 (去掉扩展名).
    #[default]
    ParentDir,

    /// 父目录名, 首字母大写、其余小写.
    ParentDirCapitalized,

    /// 多类别记录使用类别名称, 单类别记录回退到父目录名.
    /// 名称表中没有的类别记入跳过报告.
    ClassLabels(DatasetLabels),
}

impl AnatomyRule {
    fn resolve(&self, dir_name: &str, class_id: Option<u16>) -> Result<String, SkipReason> {
        match (self, class_id) {
            (Self::ParentDirCapitalized, _) => Ok(capitalize(dir_name)),
            (Self::ClassLabels(labels), Some(c)) => labels
                .name(c)
                .map(str::to_string)
                .ok_or(SkipReason::UnknownClassLabel(c)),
            _ => Ok(dir_name.to_string()),
        }
    }
}

/// 首字母大写, 其余小写.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    }
}

/// 评分文件父目录名 (去掉扩展名). 相对路径先尽量转换为绝对路径.
fn parent_dir_name(path: &Path) -> String {
    let abs = if path.is_relative() {
        path.canonicalize().unwrap_or_else(|_| path.to_owned())
    } else {
        path.to_owned()
    };
    abs.parent()
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 长表构造器. 中心映射表与解剖结构规则在构造时注入.
#[derive(Debug, Clone, Default)]
pub struct ScoreTableBuilder {
    centers: CenterMap,
    anatomy: AnatomyRule,
}

impl ScoreTableBuilder {
    /// 使用中心映射表 `centers` 创建构造器.
    #[inline]
    pub fn new(centers: CenterMap) -> Self {
        Self {
            centers,
            anatomy: AnatomyRule::default(),
        }
    }

    /// 设置解剖结构名的来源.
    #[inline]
    pub fn anatomy_rule(mut self, rule: AnatomyRule) -> Self {
        self.anatomy = rule;
        self
    }

    /// 读取单个评分文件, 方法名可选.
    pub fn read_file<P: AsRef<Path>>(
        &self,
        path: P,
        method: Option<&str>,
    ) -> ScoreResult<AggregatedTable> {
        let mut table = AggregatedTable::default();
        self.extend_from_file(&mut table, path.as_ref(), method)?;
        Ok(table)
    }

    /// 读取多个不带方法名的评分文件.
    pub fn build_files<I, P>(&self, files: I) -> ScoreResult<AggregatedTable>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut table = AggregatedTable::default();
        for file in files {
            self.extend_from_file(&mut table, file.as_ref(), None)?;
        }
        Ok(table)
    }

    /// 按方法汇总. 同名方法先合并, 输出顺序为方法顺序、文件顺序、文件内顺序.
    pub fn build<I>(&self, sources: I) -> ScoreResult<AggregatedTable>
    where
        I: IntoIterator<Item = MethodSource>,
    {
        let mut table = AggregatedTable::default();
        for src in group_sources(sources) {
            for file in src.files.iter() {
                self.extend_from_file(&mut table, file, Some(&src.method))?;
            }
        }
        tracing::info!(rows = table.len(), skipped = table.skipped.len(), "table built");
        Ok(table)
    }

    fn extend_from_file(
        &self,
        table: &mut AggregatedTable,
        path: &Path,
        method: Option<&str>,
    ) -> ScoreResult<()> {
        let flat = self.flatten(path, method, &mut table.skipped)?;
        tracing::debug!(file = %path.display(), ?method, rows = flat.len() * 2, "score file read");
        table.rows.reserve(flat.len() * 2);
        for row in flat {
            table.rows.extend(self.centers.expand(row));
        }
        Ok(())
    }

    /// 评分文件中的每条 (病例, 类别, 指标) 变为一条 [`FlatRow`].
    fn flatten(
        &self,
        path: &Path,
        method: Option<&str>,
        skipped: &mut SkipReport,
    ) -> ScoreResult<Vec<FlatRow>> {
        let file = ScoreFile::read(path)?;
        let dir_name = parent_dir_name(path);
        let item = |pt_id: &str| format!("{} [{pt_id}]", path.display());

        let mut rows = Vec::new();
        for (pt_id, entry) in file.iter() {
            for fields in entry.records() {
                let class_id = fields.class_id();
                let anatomy = match self.anatomy.resolve(&dir_name, class_id) {
                    Ok(a) => a,
                    Err(reason) => {
                        skipped.push(item(pt_id), reason);
                        continue;
                    }
                };
                let segment_volume = fields.get_f64(keys::SEGMENT_VOLUME).unwrap_or(f64::NAN);
                let volume = fields.get_f64(keys::VOLUME).unwrap_or(f64::NAN);

                for (name, value) in fields.metric_fields() {
                    let Some(metric) = value_to_f64(value) else {
                        skipped.push(item(pt_id), SkipReason::NonNumericField(name.to_string()));
                        continue;
                    };
                    rows.push(FlatRow {
                        pt_id: pt_id.to_string(),
                        anatomy: anatomy.clone(),
                        method: method.map(str::to_string),
                        class_id,
                        metric_name: name.to_string(),
                        metric,
                        segment_volume,
                        volume,
                    });
                }
            }
        }
        Ok(rows)
    }
}

/// 汇总长表.
#[derive(Debug, Clone, Default)]
pub struct AggregatedTable {
    rows: Vec<LongFormRow>,

    /// 构造过程中跳过的条目.
    pub skipped: SkipReport,
}

impl AggregatedTable {
    /// 由现成的行构造.
    #[inline]
    pub fn from_rows(rows: Vec<LongFormRow>) -> Self {
        Self {
            rows,
            skipped: SkipReport::new(),
        }
    }

    /// 全部行.
    #[inline]
    pub fn rows(&self) -> &[LongFormRow] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 按顺序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, LongFormRow> {
        self.rows.iter()
    }

    /// 保留满足 `pred` 的行, 返回新表. 跳过报告随之复制.
    pub fn filter<F: Fn(&LongFormRow) -> bool>(&self, pred: F) -> Self {
        Self {
            rows: self.rows.iter().filter(|r| pred(r)).cloned().collect(),
            skipped: self.skipped.clone(),
        }
    }

    /// 去掉指标值为 `NaN` 的行.
    #[inline]
    pub fn drop_nan(&self) -> Self {
        self.filter(|r| !r.metric.is_nan())
    }

    /// 去掉指标值非有限 (`NaN`, `±inf`) 的行.
    #[inline]
    pub fn drop_non_finite(&self) -> Self {
        self.filter(|r| r.metric.is_finite())
    }

    /// 去掉 `"All"` 重复行.
    #[inline]
    pub fn without_all_centers(&self) -> Self {
        self.filter(|r| !r.is_all_centers())
    }

    /// 只保留中心为 `center` 的行.
    #[inline]
    pub fn filter_center(&self, center: &str) -> Self {
        self.filter(|r| r.center == center)
    }

    /// 只保留指标 `name` 的行.
    #[inline]
    pub fn metric(&self, name: &str) -> Self {
        self.filter(|r| r.metric_name == name)
    }

    /// 按首次出现顺序列出方法名.
    pub fn methods(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|r| r.method.as_deref())
            .unique()
            .collect()
    }

    /// 按首次出现顺序列出解剖结构.
    pub fn anatomies(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.anatomy.as_str()).unique().collect()
    }

    /// 按首次出现顺序列出中心.
    pub fn centers(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.center.as_str()).unique().collect()
    }

    /// 按首次出现顺序列出指标名.
    pub fn metric_names(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.metric_name.as_str())
            .unique()
            .collect()
    }

    /// 以 CSV 写出长表. `NaN` 写为空单元格, `±inf` 写为 `inf` / `-inf`.
    pub fn write_long_csv<W: Write>(&self, writer: W) -> ScoreResult<()> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record([
            "pt_id",
            "anatomy",
            "method",
            "center",
            "class",
            "metric_name",
            "metric",
            "segment_volume",
            "volume",
        ])?;
        for r in self.rows.iter() {
            let class = r.class_id.map(|c| c.to_string()).unwrap_or_default();
            let metric = format_float(r.metric);
            let segment_volume = format_float(r.segment_volume);
            let volume = format_float(r.volume);
            w.write_record([
                r.pt_id.as_str(),
                r.anatomy.as_str(),
                r.method.as_deref().unwrap_or_default(),
                r.center.as_str(),
                class.as_str(),
                r.metric_name.as_str(),
                metric.as_str(),
                segment_volume.as_str(),
                volume.as_str(),
            ])?;
        }
        w.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a AggregatedTable {
    type Item = &'a LongFormRow;
    type IntoIter = std::slice::Iter<'a, LongFormRow>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// 按 pandas 习惯格式化浮点数.
pub(crate) fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.is_infinite() {
        String::from(if v > 0.0 { "inf" } else { "-inf" })
    } else {
        v.to_string()
    }
}
