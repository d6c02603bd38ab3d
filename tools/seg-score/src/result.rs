//! 结果展示.

use seg_berry::metrics::stats::Summary;
use seg_berry::metrics::MetricKind;
use seg_berry::table::{CenterSummary, DifferenceReport};
use std::io::{self, Write};

const S4: &str = "    ";

#[inline]
fn f64_to_display(f: f64) -> String {
    if f.is_nan() {
        "/".to_string()
    } else {
        format!("{f:.4}")
    }
}

/// 将一个描述统计写进 `w` 中.
fn describe_into<W: Write>(s: &Summary, w: &mut W) -> io::Result<()> {
    writeln!(w, "{S4}N: {} (+{} non-finite)", s.n, s.non_finite)?;
    writeln!(
        w,
        "{S4}Mean ± std: {} ± {}",
        f64_to_display(s.mean),
        f64_to_display(s.std)
    )?;
    writeln!(
        w,
        "{S4}Median [min, max]: {} [{}, {}]",
        f64_to_display(s.median),
        f64_to_display(s.min),
        f64_to_display(s.max)
    )?;
    writeln!(
        w,
        "{S4}2.5% / 5% / 95% / 97.5%: {} / {} / {} / {}",
        f64_to_display(s.q025),
        f64_to_display(s.q05),
        f64_to_display(s.q95),
        f64_to_display(s.q975)
    )?;
    Ok(())
}

/// 写出全部分中心统计, 块之间以分隔线隔开.
pub fn write_summaries<W: Write>(metric: &str, all: &[CenterSummary], w: &mut W) -> io::Result<()> {
    utils::sep_to(&mut *w)?;
    for c in all {
        writeln!(w, "`{metric}` of {} @ {}:", c.anatomy, c.center)?;
        describe_into(&c.summary, w)?;
        utils::sep_to(&mut *w)?;
    }
    Ok(())
}

/// 写出配对差值报告.
pub fn write_differences<W: Write>(report: &DifferenceReport, w: &mut W) -> io::Result<()> {
    let [m1, m2] = &report.methods;
    writeln!(w, "`{}`: {m1} - {m2}", report.metric)?;
    if let Ok(kind) = report.metric.parse::<MetricKind>() {
        let better = if kind.higher_is_better() { "positive" } else { "negative" };
        writeln!(w, "{S4}A {better} difference favours {m1}")?;
    }
    utils::sep_to(&mut *w)?;
    for e in report.entries.iter() {
        writeln!(w, "{} @ {}:", e.anatomy, e.center)?;
        writeln!(w, "{S4}Pairs: {}", e.n)?;
        writeln!(w, "{S4}Mean difference: {}", f64_to_display(e.mean))?;
        writeln!(
            w,
            "{S4}95% interval: [{}, {}]",
            f64_to_display(e.low),
            f64_to_display(e.high)
        )?;
    }
    utils::sep_to(&mut *w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seg_berry::table::PairedDifference;

    #[test]
    fn test_write_summaries() {
        let all = [CenterSummary {
            anatomy: "tumor".to_string(),
            center: "All".to_string(),
            summary: Summary::of([0.5, 0.7, f64::INFINITY]),
        }];
        let mut buf = Vec::new();
        write_summaries("dice", &all, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("`dice` of tumor @ All:"));
        assert!(text.contains("N: 2 (+1 non-finite)"));
        assert!(text.contains("Mean ± std: 0.6000 ± 0.1414"));
    }

    #[test]
    fn test_write_differences() {
        let entry = PairedDifference {
            anatomy: "tumor".to_string(),
            center: "All".to_string(),
            n: 3,
            mean: -0.25,
            low: -0.5,
            high: f64::NAN,
        };
        let mut report = DifferenceReport {
            metric: "hd95".to_string(),
            methods: ["A".to_string(), "B".to_string()],
            entries: vec![entry],
        };
        let mut buf = Vec::new();
        write_differences(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("`hd95`: A - B"));
        assert!(text.contains("A negative difference favours A"));
        assert!(text.contains("Pairs: 3"));
        assert!(text.contains("95% interval: [-0.5000, /]"));

        report.metric = "dice".to_string();
        let mut buf = Vec::new();
        write_differences(&report, &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("A positive difference favours A"));

        report.metric = "time".to_string();
        let mut buf = Vec::new();
        write_differences(&report, &mut buf).unwrap();
        assert!(!String::from_utf8(buf).unwrap().contains("favours"));
    }
}
