//! Job records and their lifecycle rules.
//!
//! A job is created `Pending`, moves to `Processing` when a runner picks it
//! up, and ends in exactly one terminal state. Terminal states never change.
//! Three field invariants hold at all times and are enforced by the mutation
//! helpers here rather than by callers:
//! - `progress == 100` exactly when the job is `Completed`,
//! - `artifact` is present exactly when the job is `Completed`,
//! - `error` is present exactly when the job is `Failed`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::doc::settings::RenderSettings;
use crate::foundation::error::{PlatenError, PlatenResult};
use crate::transform::ops::TransformRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// What a job does, with its kind-specific input.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum JobKind {
    RenderDocument {
        project: Uuid,
        settings: RenderSettings,
    },
    TransformImage { request: TransformRequest },
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RenderDocument { .. } => "render-document",
            Self::TransformImage { .. } => "transform-image",
        }
    }
}

/// The single output file of a completed job.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ArtifactRef {
    pub media_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Download cutoff. The job record outlives its artifact.
    pub expires_at: DateTime<Utc>,
}

/// Why a job failed: a stable machine-readable tag plus the human-readable
/// message captured from the runner.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobErrorDetail {
    pub kind: String,
    pub message: String,
}

impl JobErrorDetail {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn from_error(err: &PlatenError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Bookkeeping recorded on completion.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct JobResultMeta {
    pub duration_ms: u64,
    pub page_count: Option<usize>,
    pub quality_score: Option<u8>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner: String,
    pub kind: JobKind,
    pub status: JobStatus,
    /// 0..=100; reaches 100 only through [`Job::complete`].
    pub progress: u8,
    pub error: Option<JobErrorDetail>,
    pub artifact: Option<ArtifactRef>,
    pub result: Option<JobResultMeta>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(owner: &str, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            kind,
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            artifact: None,
            result: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: JobStatus) -> PlatenResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PlatenError::invalid_state(format!(
                "job {} cannot move {} -> {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub fn start(&mut self) -> PlatenResult<()> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(self.updated_at);
        Ok(())
    }

    /// Advance progress while running. Capped at 99; only completion reports
    /// 100.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(99).max(self.progress);
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, artifact: ArtifactRef, result: JobResultMeta) -> PlatenResult<()> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.error = None;
        self.artifact = Some(artifact);
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, detail: JobErrorDetail) -> PlatenResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(detail);
        self.artifact = None;
        Ok(())
    }

    pub fn cancel(&mut self) -> PlatenResult<()> {
        self.transition(JobStatus::Cancelled)
    }
}
