//! 命令行参数.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use seg_berry::consts::keys;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "seg-score", version, about = "Score segmentations and aggregate score files")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score every prediction against the reference of the same file name.
    Collect(CollectArgs),

    /// Aggregate score files into a long or pivoted table.
    Table(TableArgs),

    /// Per-center descriptive statistics of one metric.
    Summary(MetricArgs),

    /// Paired differences of one metric between exactly two methods.
    Diff(MetricArgs),

    /// Copy one field (e.g. `time`) from another score file into a score file.
    MergeField(MergeFieldArgs),
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Directory of predicted label volumes.
    #[arg(long)]
    pub pred: PathBuf,

    /// Directory of reference label volumes.
    #[arg(long = "ref")]
    pub reference: PathBuf,

    /// Class scored in single-class mode.
    #[arg(long, default_value_t = 1, conflicts_with = "multi")]
    pub class: u16,

    /// Score every class 1..=N. N is inferred per patient unless fixed below.
    #[arg(long)]
    pub multi: bool,

    /// Fixed class count for multi-class mode.
    #[arg(long, requires = "multi")]
    pub classes: Option<u16>,

    /// Label manifest(s) fixing the class count; all of them must agree (repeatable).
    #[arg(long, requires = "multi")]
    pub dataset_file: Vec<PathBuf>,

    /// Use the file name without `.nii.gz` / `.nii` as patient id.
    #[arg(long)]
    pub stem: bool,

    /// Output file or directory. Defaults to `<pred>/scores.json`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Score file of a method, as NAME=PATH (repeatable, same name merges).
    #[arg(long = "method", value_name = "NAME=PATH", value_parser = parse_named)]
    pub methods: Vec<(String, PathBuf)>,

    /// Method root whose anatomy subdirectories hold score files, as NAME=DIR (repeatable).
    #[arg(long = "discover", value_name = "NAME=DIR", value_parser = parse_named)]
    pub discover: Vec<(String, PathBuf)>,

    /// JSON table mapping center codes to labels. Falls back to `$SEG_CENTER_MAP`.
    #[arg(long)]
    pub center_map: Option<PathBuf>,

    /// Name multi-class anatomies after this label manifest. Falls back to `$SEG_DATASET_FILE`.
    #[arg(long)]
    pub dataset_file: Option<PathBuf>,

    /// Capitalize anatomy names taken from directory names.
    #[arg(long, conflicts_with = "dataset_file")]
    pub capitalize: bool,

    /// Drop rows whose metric is NaN.
    #[arg(long)]
    pub drop_nan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableFormat {
    /// One row per metric value.
    Long,
    /// One row per patient, one column per metric.
    Pivot,
    /// Pivot restored to a score file (one method, one anatomy, one center).
    Scores,
}

#[derive(Debug, Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output layout.
    #[arg(long, value_enum, default_value_t = TableFormat::Pivot)]
    pub format: TableFormat,

    /// Drop the duplicated "All" center rows.
    #[arg(long)]
    pub no_all: bool,

    /// Keep only this center.
    #[arg(long, conflicts_with = "no_all")]
    pub center: Option<String>,

    /// Output file. Defaults to standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MetricArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Metric name.
    #[arg(long, default_value = "dice")]
    pub metric: String,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MergeFieldArgs {
    /// Score file receiving the field.
    #[arg(long)]
    pub target: PathBuf,

    /// Score file the field is read from.
    #[arg(long)]
    pub source: PathBuf,

    /// Field name.
    #[arg(long, default_value = keys::TIME)]
    pub key: String,

    /// Output file. Defaults to overwriting the target.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// 解析 `NAME=PATH`.
fn parse_named(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got `{s}`")),
    }
}
