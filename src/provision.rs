//! Knowledge source provisioning.
//!
//! Creates a knowledge source for a repository, uploads the repository
//! snapshot into it, and waits for the ingestion job to finish.
//!
//! # Polling
//!
//! The job is polled at a fixed `poll_interval_ms` with no backoff until it
//! reaches `completed` or `failed`, for at most `max_poll_attempts` polls.
//! The wait is an ordinary future: dropping it (for example when the HTTP
//! client disconnects) stops polling at the next sleep.
//!
//! Nothing is retried. A non-success response at any step, a failed job, or
//! an exhausted poll budget aborts provisioning.

use std::time::Duration;

use crate::client::AgentService;
use crate::config::ProvisioningConfig;
use crate::error::{DocsError, DocsResult};
use crate::models::{DocumentPayload, IngestionJob, JobStatus, KnowledgeSource, RepoId};

/// Create a knowledge source for `repo`, ingest `payload` into it, and
/// return the source once ingestion has completed.
pub async fn provision_source(
    service: &dyn AgentService,
    settings: &ProvisioningConfig,
    repo: &RepoId,
    payload: &DocumentPayload,
) -> DocsResult<KnowledgeSource> {
    let source = service.create_source(&repo.resource_name()).await?;
    tracing::info!(
        repo = %repo,
        source_id = %source.source_id,
        name = %source.name,
        "knowledge source created"
    );

    let job = service.upload_document(&source.source_id, payload).await?;
    tracing::info!(
        source_id = %source.source_id,
        job_id = %job.job_id,
        bytes = payload.content.len(),
        "document uploaded"
    );

    wait_for_job(service, settings, job).await?;
    Ok(source)
}

/// Poll `job` until it reaches a terminal state.
///
/// Returns the completed job. A job that is already terminal is returned
/// (or reported) without polling.
///
/// # Errors
///
/// - [`DocsError::IngestionFailed`] with the job metadata, unmodified.
/// - [`DocsError::IngestionTimeout`] after `max_poll_attempts` polls.
/// - Any error from [`AgentService::get_job`].
pub async fn wait_for_job(
    service: &dyn AgentService,
    settings: &ProvisioningConfig,
    mut job: IngestionJob,
) -> DocsResult<IngestionJob> {
    let interval = Duration::from_millis(settings.poll_interval_ms);
    let mut attempts: u32 = 0;

    loop {
        match job.status {
            JobStatus::Completed => {
                tracing::info!(job_id = %job.job_id, attempts, "ingestion completed");
                return Ok(job);
            }
            JobStatus::Failed => {
                tracing::warn!(job_id = %job.job_id, metadata = %job.metadata, "ingestion failed");
                return Err(DocsError::IngestionFailed {
                    job_id: job.job_id,
                    metadata: job.metadata,
                });
            }
            JobStatus::Pending | JobStatus::Running => {}
        }

        if attempts >= settings.max_poll_attempts {
            return Err(DocsError::IngestionTimeout {
                job_id: job.job_id,
                attempts,
            });
        }

        tokio::time::sleep(interval).await;
        job = service.get_job(&job.job_id).await?;
        attempts += 1;
        tracing::debug!(job_id = %job.job_id, status = ?job.status, attempts, "polled ingestion job");
    }
}
