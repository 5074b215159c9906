//! The build relay pipeline.
//!
//! [`BuildRelay`] turns one build-success notification into a published
//! artifact: resolve share → download → CDN delete/upload → commit marker →
//! purge. Steps run strictly in sequence inside one task.
//!
//! ## Failure semantics
//!
//! - A malformed payload, a transport failure, or a failed download aborts the
//!   run. A failed download therefore never leads to an upload.
//! - Clearing the previous local artifact tolerates a missing file only. Any
//!   other scratch error (e.g. permission denied) aborts the run before the
//!   download starts.
//! - A CDN call that *answers* with an error status does not abort anything.
//!   It is logged at `warn` and recorded in [`RelayReport::cdn_steps`].
//! - There are no retries and no timeouts beyond those of the adapters.
//!
//! ## Execution contract
//!
//! [`BuildRelay::run`] executes inline and returns the outcome.
//! [`RelayLauncher::launch`] spawns the run on the tokio runtime and returns a
//! [`RelayTask`]; the caller chooses between [`RelayTask::wait`] (learn the
//! outcome) and [`RelayTask::detach`] (the run continues, its outcome is only
//! logged). Runs are not serialised: two runs for the same architecture share
//! scratch and CDN paths, and whichever upload lands last wins.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    ArchitectureTag, BuildNotification, BuildProvider, CdnOperation, CdnResponse, CdnStep,
    CommitMarker, ContentDelivery, RelayError, RelayReport, RelayRunId, RelaySettings,
    ScratchSpace, ShareId, Timestamp,
};

// ---------------------------------------------------------------------------
// Task handle
// ---------------------------------------------------------------------------

/// A relay run executing on the tokio runtime.
///
/// Dropping or [detaching](RelayTask::detach) the task does not cancel the
/// run.
#[derive(Debug)]
pub struct RelayTask {
    run_id: RelayRunId,
    handle: JoinHandle<Result<RelayReport, RelayError>>,
}

impl RelayTask {
    /// Spawns `run` as a new task. Must be called from within a tokio runtime.
    pub fn spawn<F>(run_id: RelayRunId, run: F) -> Self
    where
        F: Future<Output = Result<RelayReport, RelayError>> + Send + 'static,
    {
        Self {
            run_id,
            handle: tokio::spawn(run),
        }
    }

    /// Identifier of the run, also recorded on its `relay` span.
    pub fn run_id(&self) -> RelayRunId {
        self.run_id
    }

    /// Waits for the run to finish and returns its outcome.
    pub async fn wait(self) -> Result<RelayReport, RelayError> {
        self.handle.await.map_err(|e| RelayError::TaskFailed {
            message: e.to_string(),
        })?
    }

    /// Lets the run continue in the background without observing its outcome.
    pub fn detach(self) {
        debug!(run_id = %self.run_id, "relay task detached");
    }
}

/// Starts relay runs on behalf of an event source.
pub trait RelayLauncher: Send + Sync {
    /// Starts processing a raw notification payload.
    ///
    /// The payload is parsed inside the task, so a malformed payload surfaces
    /// as a failed [`RelayTask`] rather than an error here.
    fn launch(&self, payload: serde_json::Value) -> RelayTask;
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// The relay pipeline together with the adapters it drives.
///
/// Cloning is cheap; clones share settings and adapters.
#[derive(Clone)]
pub struct BuildRelay {
    settings: Arc<RelaySettings>,
    provider: Arc<dyn BuildProvider>,
    cdn: Arc<dyn ContentDelivery>,
    scratch: Arc<dyn ScratchSpace>,
}

impl BuildRelay {
    /// Creates a relay driving the given adapters.
    pub fn new(
        settings: RelaySettings,
        provider: Arc<dyn BuildProvider>,
        cdn: Arc<dyn ContentDelivery>,
        scratch: Arc<dyn ScratchSpace>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            provider,
            cdn,
            scratch,
        }
    }

    /// Settings the relay was created with.
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Parses `payload` and runs the pipeline inline.
    pub async fn run(&self, payload: serde_json::Value) -> Result<RelayReport, RelayError> {
        self.run_with_id(RelayRunId::new_random(), payload).await
    }

    /// Runs the pipeline inline for an already-parsed notification.
    pub async fn run_notification(
        &self,
        notification: &BuildNotification,
    ) -> Result<RelayReport, RelayError> {
        let run_id = RelayRunId::new_random();
        self.observe(run_id, self.execute(run_id, notification)).await
    }

    async fn run_with_id(
        &self,
        run_id: RelayRunId,
        payload: serde_json::Value,
    ) -> Result<RelayReport, RelayError> {
        self.observe(run_id, async {
            match parse_notification(payload) {
                Ok(notification) => self.execute(run_id, &notification).await,
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Wraps a run in its span and logs how it ended.
    async fn observe<F>(&self, run_id: RelayRunId, run: F) -> Result<RelayReport, RelayError>
    where
        F: Future<Output = Result<RelayReport, RelayError>>,
    {
        let span = info_span!("relay", %run_id);
        async move {
            let outcome = run.await;
            match &outcome {
                Ok(report) => info!(
                    architecture = %report.architecture,
                    artifact = %report.artifact_path,
                    commit = %report.commit_marker,
                    rejected_cdn_calls = report.rejected_steps().count(),
                    "relay run completed"
                ),
                Err(e) => error!(error = %e, "relay run aborted"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: RelayRunId,
        notification: &BuildNotification,
    ) -> Result<RelayReport, RelayError> {
        let started_at = Timestamp::now();
        let mut cdn_steps = Vec::new();

        let architecture = ArchitectureTag::from_platform(&notification.platform);
        let share_url = &notification.links.share_url.href;
        let share_id =
            ShareId::from_share_url(share_url).ok_or_else(|| RelayError::MissingShareId {
                share_url: share_url.clone(),
            })?;
        info!(
            platform = %notification.platform,
            %architecture,
            %share_id,
            "relaying build"
        );

        let download_url = self.provider.resolve_share(&share_id).await?;
        debug!(%download_url, "share resolved");

        let local_artifact = self.scratch.artifact_path(architecture);
        self.scratch.remove(&local_artifact).await?;
        let bytes_downloaded = self
            .provider
            .download_artifact(&download_url, &local_artifact)
            .await?;
        info!(bytes = bytes_downloaded, path = %local_artifact.display(), "artifact downloaded");

        let artifact_path = self.settings.artifact_cdn_path(architecture);
        let response = self.cdn.delete_object(&artifact_path).await?;
        record(&mut cdn_steps, CdnOperation::Delete, artifact_path.as_str(), response);
        let response = self.cdn.upload_file(&artifact_path, &local_artifact).await?;
        record(&mut cdn_steps, CdnOperation::Upload, artifact_path.as_str(), response);

        let commit_marker = CommitMarker::from_revision(&notification.last_built_revision);
        let local_marker = self.scratch.commit_marker_path();
        self.scratch
            .write_text(&local_marker, commit_marker.as_str())
            .await?;

        let commit_marker_path = self.settings.commit_marker_cdn_path(architecture);
        let response = self.cdn.delete_object(&commit_marker_path).await?;
        record(&mut cdn_steps, CdnOperation::Delete, commit_marker_path.as_str(), response);
        let response = self.cdn.upload_file(&commit_marker_path, &local_marker).await?;
        record(&mut cdn_steps, CdnOperation::Upload, commit_marker_path.as_str(), response);

        let purge_pattern = self.settings.purge_pattern();
        let response = self.cdn.purge(purge_pattern).await?;
        record(&mut cdn_steps, CdnOperation::Purge, purge_pattern, response);

        Ok(RelayReport {
            run_id,
            architecture,
            share_id,
            download_url,
            bytes_downloaded,
            artifact_path,
            commit_marker,
            commit_marker_path,
            cdn_steps,
            started_at,
            finished_at: Timestamp::now(),
        })
    }
}

impl RelayLauncher for BuildRelay {
    fn launch(&self, payload: serde_json::Value) -> RelayTask {
        let run_id = RelayRunId::new_random();
        let relay = self.clone();
        RelayTask::spawn(run_id, async move { relay.run_with_id(run_id, payload).await })
    }
}

/// Parses a raw webhook payload into a [`BuildNotification`].
pub fn parse_notification(payload: serde_json::Value) -> Result<BuildNotification, RelayError> {
    Ok(serde_json::from_value(payload)?)
}

fn record(steps: &mut Vec<CdnStep>, operation: CdnOperation, object: &str, response: CdnResponse) {
    if response.is_success() {
        debug!(%operation, object, status = response.status, "CDN call accepted");
    } else {
        warn!(%operation, object, status = response.status, "CDN call rejected; continuing");
    }
    steps.push(CdnStep {
        operation,
        target: object.to_string(),
        response,
    });
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
