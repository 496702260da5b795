//! Render-and-write pipeline shared by the CLI and the daemon.

use zkagent_core::RenderJob;
use zkagent_renderer::{TemplateData, TemplateEngine};

use crate::writer::{atomic_write, WriteResult};
use crate::SyncError;

/// Result of one render job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: RenderJob,
    pub result: Result<WriteResult, SyncError>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Render `job.template` and write `job.target`.
///
/// The target is only touched once the whole template rendered.
pub fn render_job(
    engine: &TemplateEngine,
    job: &RenderJob,
    data: &TemplateData,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let rendered = engine.render_file(&job.template, data)?;
    atomic_write(&job.target, &rendered, dry_run)
}

/// Run every job in order; a failed job never stops the ones after it.
pub fn render_jobs(
    engine: &TemplateEngine,
    jobs: &[RenderJob],
    data: &TemplateData,
    dry_run: bool,
) -> Vec<JobOutcome> {
    jobs.iter()
        .map(|job| {
            let result = render_job(engine, job, data, dry_run);
            if let Err(err) = &result {
                tracing::warn!(
                    "render {} -> {} failed: {err}",
                    job.template.display(),
                    job.target.display()
                );
            }
            JobOutcome {
                job: job.clone(),
                result,
            }
        })
        .collect()
}
