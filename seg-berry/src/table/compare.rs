//! 分中心描述统计与两方法配对差值.

use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;

use super::AggregatedTable;
use crate::metrics::stats::{mean, percentile, sort_values, Summary};
use crate::{ScoreError, ScoreResult};

/// 一个 (解剖结构, 中心) 上某指标的描述统计.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenterSummary {
    /// 解剖结构.
    pub anatomy: String,
    /// 中心.
    pub center: String,
    /// 统计量.
    #[serde(flatten)]
    pub summary: Summary,
}

/// 一个 (解剖结构, 中心) 上的配对差值.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedDifference {
    /// 解剖结构.
    pub anatomy: String,
    /// 中心.
    pub center: String,
    /// 配对个数.
    pub n: usize,
    /// 差值均值.
    pub mean: f64,
    /// 差值 2.5% 分位数.
    pub low: f64,
    /// 差值 97.5% 分位数.
    pub high: f64,
}

/// 两方法配对差值报告. 差值为 `methods[0] - methods[1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceReport {
    /// 指标名.
    pub metric: String,
    /// 参与比较的两个方法, 按首次出现顺序.
    pub methods: [String; 2],
    /// 按解剖结构 (排序后)、中心 (首次出现顺序) 排列的结果.
    pub entries: Vec<PairedDifference>,
}

impl AggregatedTable {
    /// 指标 `metric` 在每个 (解剖结构, 中心) 上的描述统计.
    ///
    /// 解剖结构按名称排序, 中心按首次出现顺序. 非有限值不参与统计, 只计数.
    pub fn summarize(&self, metric: &str) -> Vec<CenterSummary> {
        let table = self.metric(metric);
        let mut anatomies = table.anatomies();
        anatomies.sort_unstable();
        let centers = table.centers();

        anatomies
            .iter()
            .cartesian_product(centers.iter())
            .filter_map(|(&anatomy, &center)| {
                let values: Vec<f64> = table
                    .iter()
                    .filter(|r| r.anatomy == anatomy && r.center == center)
                    .map(|r| r.metric)
                    .collect();
                (!values.is_empty()).then(|| CenterSummary {
                    anatomy: anatomy.to_string(),
                    center: center.to_string(),
                    summary: Summary::of(values),
                })
            })
            .collect()
    }

    /// 指标 `metric` 上两个方法的逐病例配对差值.
    ///
    /// 表中 (该指标下) 的方法数不是 2 时返回 `Err`. 只有两个方法下
    /// 均有有限值的 (病例, 类别, 解剖结构, 中心) 参与计算. 多类别评分
    /// 文件中同一病例的每个类别各算一对.
    pub fn paired_differences(&self, metric: &str) -> ScoreResult<DifferenceReport> {
        let table = self.metric(metric);
        let methods = table.methods();
        let [m1, m2] = methods.as_slice() else {
            return Err(ScoreError::MethodCount {
                expected: 2,
                names: methods.iter().map(|s| s.to_string()).collect(),
            });
        };

        type Key<'a> = (&'a str, Option<u16>, &'a str, &'a str, &'a str);
        let mut values: HashMap<Key<'_>, f64> = HashMap::new();
        for r in table.iter() {
            if let Some(m) = r.method.as_deref() {
                let key = (r.pt_id.as_str(), r.class_id, r.anatomy.as_str(), r.center.as_str(), m);
                values.entry(key).or_insert(r.metric);
            }
        }

        let mut anatomies = table.anatomies();
        anatomies.sort_unstable();
        let centers = table.centers();
        let cases: Vec<(&str, Option<u16>)> = table
            .iter()
            .map(|r| (r.pt_id.as_str(), r.class_id))
            .unique()
            .collect();

        let mut entries = Vec::with_capacity(anatomies.len() * centers.len());
        for &anatomy in anatomies.iter() {
            for &center in centers.iter() {
                let mut diffs: Vec<f64> = cases
                    .iter()
                    .filter_map(|&(pt, class)| {
                        let a = values.get(&(pt, class, anatomy, center, *m1))?;
                        let b = values.get(&(pt, class, anatomy, center, *m2))?;
                        (a.is_finite() && b.is_finite()).then(|| a - b)
                    })
                    .collect();
                sort_values(&mut diffs);
                entries.push(PairedDifference {
                    anatomy: anatomy.to_string(),
                    center: center.to_string(),
                    n: diffs.len(),
                    mean: mean(&diffs),
                    low: percentile(&diffs, 2.5),
                    high: percentile(&diffs, 97.5),
                });
            }
        }

        Ok(DifferenceReport {
            metric: metric.to_string(),
            methods: [m1.to_string(), m2.to_string()],
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::LongFormRow;
    use super::*;

    fn row(pt_id: &str, method: &str, center: &str, metric: f64) -> LongFormRow {
        class_row(pt_id, method, center, None, metric)
    }

    fn class_row(
        pt_id: &str,
        method: &str,
        center: &str,
        class_id: Option<u16>,
        metric: f64,
    ) -> LongFormRow {
        LongFormRow {
            pt_id: pt_id.to_string(),
            anatomy: if class_id.is_some() { "organs" } else { "tumor" }.to_string(),
            method: Some(method.to_string()),
            center: center.to_string(),
            class_id,
            metric_name: "dice".to_string(),
            metric,
            segment_volume: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn test_summarize() {
        let table = AggregatedTable::from_rows(vec![
            row("P1", "A", "All", 0.5),
            row("P1", "A", "X", 0.5),
            row("P2", "A", "All", f64::NAN),
            row("P2", "A", "Y", f64::NAN),
        ]);
        let s = table.summarize("dice");
        assert_eq!(s.len(), 3);
        assert_eq!(s[0].center, "All");
        assert_eq!(s[0].summary.n, 1);
        assert_eq!(s[0].summary.non_finite, 1);
        assert_eq!(s[2].center, "Y");
        assert!(table.summarize("hd95").is_empty());
    }

    #[test]
    fn test_paired_differences() {
        let table = AggregatedTable::from_rows(vec![
            row("P1", "A", "X", 0.9),
            row("P1", "B", "X", 0.7),
            row("P2", "A", "X", 0.8),
            row("P2", "B", "X", f64::NAN),
            row("P3", "A", "X", 0.6),
        ]);
        let report = table.paired_differences("dice").unwrap();
        assert_eq!(report.methods, ["A".to_string(), "B".to_string()]);
        assert_eq!(report.entries.len(), 1);
        let e = &report.entries[0];
        assert_eq!(e.n, 1);
        assert!((e.mean - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_paired_differences_multi_class() {
        let table = AggregatedTable::from_rows(vec![
            class_row("P1", "A", "All", Some(1), 0.9),
            class_row("P1", "A", "All", Some(2), 0.1),
            class_row("P1", "A", "X", Some(1), 0.9),
            class_row("P1", "A", "X", Some(2), 0.1),
            class_row("P1", "B", "All", Some(1), 0.8),
            class_row("P1", "B", "All", Some(2), 0.9),
            class_row("P1", "B", "X", Some(1), 0.8),
            class_row("P1", "B", "X", Some(2), 0.9),
        ]);
        let report = table.paired_differences("dice").unwrap();
        assert_eq!(report.entries.len(), 2);
        for e in report.entries.iter() {
            assert_eq!(e.anatomy, "organs");
            assert_eq!(e.n, 2);
            assert!((e.mean - -0.35).abs() < 1e-12);
            assert!((e.low - -0.8).abs() < 0.05);
            assert!((e.high - 0.1).abs() < 0.05);
        }
    }

    #[test]
    fn test_paired_differences_needs_two_methods() {
        let one = AggregatedTable::from_rows(vec![row("P1", "A", "X", 0.9)]);
        assert!(matches!(
            one.paired_differences("dice"),
            Err(ScoreError::MethodCount { expected: 2, .. })
        ));

        let three = AggregatedTable::from_rows(vec![
            row("P1", "A", "X", 0.9),
            row("P1", "B", "X", 0.9),
            row("P1", "C", "X", 0.9),
        ]);
        match three.paired_differences("dice") {
            Err(ScoreError::MethodCount { names, .. }) => assert_eq!(names, ["A", "B", "C"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
