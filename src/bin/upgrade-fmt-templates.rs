use std::path::PathBuf;

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use fmt_upgrade::{BatchOpts, FileStatus, FsStore, RuleTable};
use tracing_subscriber::EnvFilter;

/// Update the format templates to the version required for xyuv 2.x.
#[derive(Parser, Debug)]
#[command(name = "upgrade-fmt-templates", version)]
struct Cli {
    /// Path to a px_fmt folder containing format templates to update.
    px_fmt_dir: PathBuf,

    /// Report which templates would change without writing them.
    #[arg(long, default_value_t = false)]
    check: bool,

    /// JSON rule table (`[{"from": "...", "to": "..."}]`) replacing the built-in xyuv 2.x rules.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Process templates in parallel.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rules = match &cli.rules {
        Some(path) => RuleTable::from_path(path)
            .with_context(|| format!("load rule table '{}'", path.display()))?,
        None => RuleTable::xyuv2(),
    };

    let opts = BatchOpts {
        check: cli.check,
        parallel: cli.parallel,
        threads: cli.threads,
    };

    let report = fmt_upgrade::upgrade_dir(&FsStore::new(), &cli.px_fmt_dir, &rules, &opts)
        .with_context(|| format!("upgrade templates in '{}'", cli.px_fmt_dir.display()))?;

    for outcome in &report.outcomes {
        match &outcome.status {
            FileStatus::Changed { fields } if cli.check => {
                eprintln!("would update {} ({fields} fields)", outcome.path.display());
            }
            FileStatus::Changed { fields } => {
                eprintln!("updated {} ({fields} fields)", outcome.path.display());
            }
            FileStatus::Unchanged => {}
            FileStatus::Failed(e) => {
                let kind = if e.is_structural() { "structure" } else { "storage" };
                eprintln!("FAILED ({kind}) {}: {e}", outcome.path.display());
            }
        }
    }

    eprintln!(
        "{} templates: {} {}, {} unchanged, {} failed",
        report.processed(),
        report.changed(),
        if cli.check { "to update" } else { "updated" },
        report.unchanged(),
        report.failed()
    );

    if !report.is_success() {
        anyhow::bail!("{} template(s) failed to upgrade", report.failed());
    }
    if cli.check && report.changed() > 0 {
        anyhow::bail!("{} template(s) need upgrading", report.changed());
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
