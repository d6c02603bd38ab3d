//! 各子命令的实际运行.

use crate::cli::{CollectArgs, InputArgs, MergeFieldArgs, MetricArgs, TableArgs, TableFormat};
use crate::result;
use anyhow::{bail, Context, Result};
use seg_berry::labels::consistent_class_count;
use seg_berry::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use utils::loader;

/// 打开输出. 未指定路径时为标准输出.
fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let f = File::create(p).with_context(|| format!("cannot create `{}`", p.display()))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(io::stdout().lock()),
    })
}

/// 在标准错误上展示跳过报告.
fn show_skipped(skipped: &SkipReport) {
    if !skipped.is_empty() {
        eprint!("{skipped}");
    }
}

/// 由命令行确定多类别模式的类别数. 没有任何约束时逐病例推断.
fn class_count(args: &CollectArgs) -> Result<Option<u16>> {
    let mut counts = Vec::with_capacity(args.dataset_file.len() + 1);
    for path in args.dataset_file.iter() {
        let labels = DatasetLabels::load(path)?;
        counts.push((path.display().to_string(), labels.class_count()));
    }
    if let Some(n) = args.classes {
        counts.push(("--classes".to_string(), n));
    }
    if counts.is_empty() {
        return Ok(None);
    }
    let n = consistent_class_count(counts.iter().map(|(name, n)| (name.as_str(), *n)))?;
    Ok(Some(n))
}

/// `collect`.
pub fn collect(args: CollectArgs) -> Result<()> {
    let selector = if args.multi {
        ClassSelector::Multi(class_count(&args)?)
    } else {
        ClassSelector::Single(args.class)
    };
    let style = if args.stem {
        PatientIdStyle::Stem
    } else {
        PatientIdStyle::FileName
    };

    let out = ScoreCollector::new()
        .id_style(style)
        .collect(&args.pred, &args.reference, selector)?;
    let path = resolve_output(&args.pred, args.output.as_deref());
    out.scores.write(&path)?;

    show_skipped(&out.skipped);
    println!("Wrote {} to {}", out.scores, path.display());
    Ok(())
}

/// 按命令行输入构造长表. 自动发现的跳过记录排在前面.
fn build_table(args: &InputArgs) -> Result<AggregatedTable> {
    let centers = loader::center_map(args.center_map.as_deref())?;
    let rule = if args.capitalize {
        AnatomyRule::ParentDirCapitalized
    } else {
        match loader::dataset_labels(args.dataset_file.as_deref())? {
            Some(labels) => AnatomyRule::ClassLabels(labels),
            None => AnatomyRule::ParentDir,
        }
    };

    let mut sources = Vec::with_capacity(args.methods.len() + args.discover.len());
    let mut skipped = SkipReport::new();
    for (name, path) in args.methods.iter() {
        let file = loader::resolve_in_scores_dir(path);
        sources.push(MethodSource::from_files(name.as_str(), [file]));
    }
    for (name, root) in args.discover.iter() {
        let found = MethodSource::discover(name.as_str(), loader::resolve_in_scores_dir(root))?;
        skipped.merge(found.skipped);
        sources.push(found.source);
    }
    if sources.is_empty() {
        bail!("no score file given, use --method NAME=PATH or --discover NAME=DIR");
    }

    let mut table = ScoreTableBuilder::new(centers)
        .anatomy_rule(rule)
        .build(sources)?;
    skipped.merge(std::mem::take(&mut table.skipped));

    let mut table = if args.drop_nan { table.drop_nan() } else { table };
    table.skipped = skipped;
    tracing::debug!(
        methods = table.methods().len(),
        anatomies = table.anatomies().len(),
        drop_nan = args.drop_nan,
        "table ready"
    );
    show_skipped(&table.skipped);
    Ok(table)
}

/// `table`.
pub fn table(args: TableArgs) -> Result<()> {
    let mut table = build_table(&args.input)?;
    if args.no_all {
        table = table.without_all_centers();
    }
    if let Some(center) = args.center.as_deref() {
        table = table.filter_center(center);
    }

    let mut w = open_output(args.output.as_deref())?;
    match args.format {
        TableFormat::Long => table.write_long_csv(&mut w)?,
        TableFormat::Pivot => table.pivot().write_csv(&mut w)?,
        TableFormat::Scores => {
            let scores = table
                .pivot()
                .to_score_file()
                .context("a score file needs one method, one anatomy and one center, try --center")?;
            writeln!(w, "{}", scores.to_json_string()?)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// `summary`.
pub fn summary(args: MetricArgs) -> Result<()> {
    let table = build_table(&args.input)?;
    let all = table.summarize(&args.metric);
    if all.is_empty() {
        bail!("no `{}` values in the table", args.metric);
    }

    let mut w = io::stdout().lock();
    if args.json {
        writeln!(w, "{}", seg_berry::json::to_string_pretty(&all)?)?;
    } else {
        result::write_summaries(&args.metric, &all, &mut w)?;
    }
    Ok(())
}

/// `diff`.
pub fn diff(args: MetricArgs) -> Result<()> {
    let table = build_table(&args.input)?;
    let report = table.paired_differences(&args.metric)?;

    let mut w = io::stdout().lock();
    if args.json {
        writeln!(w, "{}", seg_berry::json::to_string_pretty(&report)?)?;
    } else {
        result::write_differences(&report, &mut w)?;
    }
    Ok(())
}

/// `merge-field`.
pub fn merge_field(args: MergeFieldArgs) -> Result<()> {
    let mut target = ScoreFile::read(&args.target)?;
    let source = ScoreFile::read(&args.source)?;
    let missing = target.merge_field(&args.key, &source);

    let path = args.output.as_deref().unwrap_or(&args.target);
    target.write(path)?;
    println!(
        "Merged `{}` into {} of {} patients, wrote {}",
        args.key,
        target.len() - missing.len(),
        target.len(),
        path.display()
    );
    Ok(())
}
