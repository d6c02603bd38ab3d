//! 分割评分与评分文件汇总的命令行入口.

use clap::Parser;

mod cli;
mod result;
mod runner;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::init_tracing(cli.verbose);
    tracing::debug!(cpus = utils::cpus(), "seg-score started");

    match cli.command {
        Commands::Collect(args) => runner::collect(args),
        Commands::Table(args) => runner::table(args),
        Commands::Summary(args) => runner::summary(args),
        Commands::Diff(args) => runner::diff(args),
        Commands::MergeField(args) => runner::merge_field(args),
    }
}
