//! 透视表: 长表中同一 (病例, 解剖结构, 方法, 中心, 类别) 的指标行合并为一行.

use std::collections::BTreeMap;
use std::io::Write;

use super::{format_float, AggregatedTable};
use crate::consts::keys;
use crate::metrics::MetricKind;
use crate::scores::{ScoreEntry, ScoreFields, ScoreFile};
use crate::{ScoreError, ScoreResult};

/// 透视表行索引.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PivotKey {
    /// 病例编号.
    pub pt_id: String,
    /// 解剖结构.
    pub anatomy: String,
    /// 方法名.
    pub method: Option<String>,
    /// 中心.
    pub center: String,
    /// 类别编号.
    pub class_id: Option<u16>,
}

/// 透视表中的一行.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    /// 行索引.
    pub key: PivotKey,
    /// 指标名到指标值. 源数据中没有的指标不出现.
    pub metrics: BTreeMap<String, f64>,
    /// 参考标注该类别的物理体积 (立方毫米).
    pub segment_volume: f64,
    /// 整幅图像的物理体积 (立方毫米).
    pub volume: f64,
}

/// 单元格累加器. 仅在同一文件被重复登记时会有多个值.
#[derive(Debug, Default)]
struct Cell {
    sum: f64,
    n: usize,
}

/// 透视表. 行按索引排序, 指标列按名称排序.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotTable {
    columns: Vec<String>,
    rows: Vec<PivotRow>,
}

impl AggregatedTable {
    /// 透视为每个 (病例, 解剖结构, 方法, 中心, 类别) 一行, 每个指标一列.
    ///
    /// 同一单元格出现多个值时取平均, 并发出 `warn` 事件.
    pub fn pivot(&self) -> PivotTable {
        let mut cells: BTreeMap<PivotKey, (BTreeMap<&str, Cell>, f64, f64)> = BTreeMap::new();
        for r in self.iter() {
            let key = PivotKey {
                pt_id: r.pt_id.clone(),
                anatomy: r.anatomy.clone(),
                method: r.method.clone(),
                center: r.center.clone(),
                class_id: r.class_id,
            };
            let (metrics, ..) = cells
                .entry(key)
                .or_insert_with(|| (BTreeMap::new(), r.segment_volume, r.volume));
            let cell = metrics.entry(r.metric_name.as_str()).or_default();
            cell.sum += r.metric;
            cell.n += 1;
        }

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(cells.len());
        for (key, (metrics, segment_volume, volume)) in cells {
            let metrics = metrics
                .into_iter()
                .map(|(name, cell)| {
                    if cell.n > 1 {
                        tracing::warn!(pt_id = %key.pt_id, metric = name, n = cell.n, "averaging duplicate cells");
                    }
                    (name.to_string(), cell.sum / cell.n as f64)
                })
                .collect::<BTreeMap<_, _>>();
            for name in metrics.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
            rows.push(PivotRow {
                key,
                metrics,
                segment_volume,
                volume,
            });
        }
        columns.sort_unstable();

        PivotTable { columns, rows }
    }
}

impl PivotTable {
    /// 指标列名, 已排序.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 全部行.
    #[inline]
    pub fn rows(&self) -> &[PivotRow] {
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

    /// 以 CSV 写出. 缺失或 `NaN` 的单元格为空, `±inf` 写为 `inf` / `-inf`.
    pub fn write_csv<W: Write>(&self, writer: W) -> ScoreResult<()> {
        let mut w = csv::Writer::from_writer(writer);
        let mut header = vec!["pt_id", "anatomy", "method", "center", "class"];
        header.extend(self.columns.iter().map(String::as_str));
        header.extend([keys::SEGMENT_VOLUME, keys::VOLUME]);
        w.write_record(&header)?;

        for r in self.rows.iter() {
            let mut record = vec![
                r.key.pt_id.clone(),
                r.key.anatomy.clone(),
                r.key.method.clone().unwrap_or_default(),
                r.key.center.clone(),
                r.key.class_id.map(|c| c.to_string()).unwrap_or_default(),
            ];
            record.extend(self.columns.iter().map(|c| {
                r.metrics
                    .get(c)
                    .map(|v| format_float(*v))
                    .unwrap_or_default()
            }));
            record.push(format_float(r.segment_volume));
            record.push(format_float(r.volume));
            w.write_record(&record)?;
        }
        w.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// 还原为评分文件. 病例按编号排序, 多类别记录按类别排序.
    ///
    /// 同一 (病例, 类别) 只能出现一次. 表中含有多个方法、解剖结构或中心时
    /// 会违反这一点, 返回 `Err`, 调用方应先筛选.
    pub fn to_score_file(&self) -> ScoreResult<ScoreFile> {
        let mut patients: BTreeMap<&str, Vec<&PivotRow>> = BTreeMap::new();
        for r in self.rows.iter() {
            patients.entry(r.key.pt_id.as_str()).or_default().push(r);
        }

        let mut file = ScoreFile::new();
        for (pt_id, mut rows) in patients {
            let layout = |detail: &str| ScoreError::Layout {
                patient: pt_id.to_string(),
                detail: detail.to_string(),
            };
            rows.sort_by_key(|r| r.key.class_id);
            if rows.windows(2).any(|w| w[0].key.class_id == w[1].key.class_id) {
                return Err(layout("a class appears more than once, filter the table first"));
            }

            let entry = match rows.as_slice() {
                [single] if single.key.class_id.is_none() => ScoreEntry::Single(to_fields(single)),
                _ if rows.iter().all(|r| r.key.class_id.is_some()) => {
                    ScoreEntry::Multi(rows.iter().map(|r| to_fields(r)).collect())
                }
                _ => return Err(layout("mixes single-class and multi-class records")),
            };
            file.insert(pt_id, entry);
        }
        Ok(file)
    }
}

/// 按收集器的字段顺序写出: 四项指标, 其余指标, 类别, 体积.
fn to_fields(r: &PivotRow) -> ScoreFields {
    let mut fields = ScoreFields::new();
    for kind in MetricKind::ALL {
        if let Some(v) = r.metrics.get(kind.name()) {
            fields.insert_f64(kind.name(), *v);
        }
    }
    for (name, v) in r.metrics.iter() {
        if name.parse::<MetricKind>().is_err() {
            fields.insert_f64(name.as_str(), *v);
        }
    }
    if let Some(c) = r.key.class_id {
        fields.insert(keys::CLASS, c.into());
    }
    // 体积字段缺失时以 NaN 进入长表, 还原时不写回.
    if !r.volume.is_nan() {
        fields.insert_f64(keys::VOLUME, r.volume);
    }
    if !r.segment_volume.is_nan() {
        fields.insert_f64(keys::SEGMENT_VOLUME, r.segment_volume);
    }
    fields
}
