use crate::foundation::error::{UpgradeError, UpgradeResult};
use crate::rewrite::RewriteEngine;
use crate::rules::RuleTable;
use crate::store::DocumentStore;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Options for [`upgrade_dir`].
#[derive(Clone, Debug, Default)]
pub struct BatchOpts {
    /// Report pending changes without saving anything.
    pub check: bool,
    /// Process files on a worker pool.
    pub parallel: bool,
    /// Worker count for parallel mode; `None` uses rayon's default.
    pub threads: Option<usize>,
}

/// What happened to a single template file.
#[derive(Debug)]
pub enum FileStatus {
    /// Rewritten and saved (or, in check mode, would be).
    Changed { fields: usize },
    /// Nothing matched; the file was left alone.
    Unchanged,
    Failed(UpgradeError),
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Per-file outcomes in listing order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub check: bool,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn changed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Changed { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Unchanged))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &UpgradeError)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            FileStatus::Failed(e) => Some((o.path.as_path(), e)),
            _ => None,
        })
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// True when every file was processed without error.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Load, rewrite and save one template. Nothing is saved unless the rewrite succeeds and
/// actually changed a field.
#[tracing::instrument(skip(store, engine, path), fields(path = %path.display()))]
pub fn upgrade_file(
    store: &dyn DocumentStore,
    engine: RewriteEngine<'_>,
    path: &Path,
    check: bool,
) -> UpgradeResult<FileStatus> {
    let document = store.load(path)?;
    let rewrite = engine.rewrite(document)?;

    if !rewrite.is_changed() {
        tracing::debug!("no legacy field paths found");
        return Ok(FileStatus::Unchanged);
    }

    if check {
        tracing::info!(fields = rewrite.changed_fields, "would rewrite");
    } else {
        store.save(path, &rewrite.document)?;
        tracing::info!(fields = rewrite.changed_fields, "rewrote");
    }
    Ok(FileStatus::Changed {
        fields: rewrite.changed_fields,
    })
}

/// Upgrade every template in `dir`.
///
/// A failing file is recorded in the report and does not stop the batch. Only a failure to
/// list the directory (or to build the worker pool) is returned as an error.
pub fn upgrade_dir(
    store: &dyn DocumentStore,
    dir: &Path,
    rules: &RuleTable,
    opts: &BatchOpts,
) -> UpgradeResult<BatchReport> {
    let files = store.list_files(dir)?;
    tracing::info!(
        dir = %dir.display(),
        files = files.len(),
        rules = rules.len(),
        check = opts.check,
        "upgrading format templates"
    );

    let engine = RewriteEngine::new(rules);
    let run_one = |path: &PathBuf| {
        let status = upgrade_file(store, engine, path, opts.check).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to upgrade template");
            FileStatus::Failed(e)
        });
        FileOutcome {
            path: path.clone(),
            status,
        }
    };

    let outcomes = if opts.parallel {
        let pool = build_thread_pool(opts.threads)?;
        pool.install(|| files.par_iter().map(run_one).collect::<Vec<_>>())
    } else {
        files.iter().map(run_one).collect()
    };

    Ok(BatchReport {
        outcomes,
        check: opts.check,
    })
}

fn build_thread_pool(threads: Option<usize>) -> UpgradeResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(UpgradeError::Other(anyhow::anyhow!(
            "'threads' must be >= 1 when set"
        )));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| UpgradeError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}
