//! Dry-run unified diff support for `zkagent render --dry-run`.

use std::path::PathBuf;

use similar::TextDiff;

use zkagent_core::RenderJob;
use zkagent_renderer::{TemplateData, TemplateEngine};

use crate::writer::read_existing;
use crate::SyncError;

/// A single rendered target diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Render `job` and compare it to the current target content.
///
/// Returns `None` when the target is already up to date. No files are written.
pub fn diff_job(
    engine: &TemplateEngine,
    job: &RenderJob,
    data: &TemplateData,
) -> Result<Option<FileDiff>, SyncError> {
    let rendered = engine.render_file(&job.template, data)?;
    let existing = read_existing(&job.target)?.unwrap_or_default();
    if existing == rendered {
        return Ok(None);
    }

    let old_header = format!("a/{}", job.target.display());
    let new_header = format!("b/{}", job.target.display());
    let unified = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(FileDiff {
        path: job.target.clone(),
        unified_diff: unified,
    }))
}

/// Diff every job; the first render failure aborts.
pub fn diff_jobs(
    engine: &TemplateEngine,
    jobs: &[RenderJob],
    data: &TemplateData,
) -> Result<Vec<FileDiff>, SyncError> {
    let mut diffs = Vec::new();
    for job in jobs {
        if let Some(diff) = diff_job(engine, job, data)? {
            diffs.push(diff);
        }
    }
    Ok(diffs)
}
