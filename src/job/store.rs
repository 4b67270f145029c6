//! Job persistence behind a narrow, sync trait.
//!
//! Mutations go through [`JobStore::apply`], which runs a closure under the
//! store's lock so lifecycle checks and the write are one atomic step. The
//! in-memory store is the only implementation shipped; the trait is the seam
//! for a durable backend.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::foundation::error::{PlatenError, PlatenResult};
use crate::job::model::{Job, JobStatus};

pub trait JobStore: Send + Sync {
    fn insert(&self, job: Job) -> PlatenResult<()>;

    fn get(&self, id: Uuid) -> PlatenResult<Job>;

    /// Mutate one job atomically. The closure's error aborts the mutation and
    /// is returned; on success the updated job is returned.
    fn apply(
        &self,
        id: Uuid,
        mutate: &mut dyn FnMut(&mut Job) -> PlatenResult<()>,
    ) -> PlatenResult<Job>;

    /// All jobs of one owner, newest first.
    fn list_owned(&self, owner: &str) -> PlatenResult<Vec<Job>>;

    /// Ids of `PROCESSING` jobs not touched since `cutoff`.
    fn stale_processing(&self, cutoff: DateTime<Utc>) -> PlatenResult<Vec<Uuid>>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Job>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: Job) -> PlatenResult<()> {
        let mut jobs = self.locked();
        if jobs.contains_key(&job.id) {
            return Err(PlatenError::invalid_state(format!(
                "job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    fn get(&self, id: Uuid) -> PlatenResult<Job> {
        self.locked()
            .get(&id)
            .cloned()
            .ok_or_else(|| PlatenError::not_found(format!("job {id}")))
    }

    fn apply(
        &self,
        id: Uuid,
        mutate: &mut dyn FnMut(&mut Job) -> PlatenResult<()>,
    ) -> PlatenResult<Job> {
        let mut jobs = self.locked();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| PlatenError::not_found(format!("job {id}")))?;
        // Stage the mutation so a failing closure leaves the record untouched.
        let mut staged = job.clone();
        mutate(&mut staged)?;
        *job = staged.clone();
        Ok(staged)
    }

    fn list_owned(&self, owner: &str) -> PlatenResult<Vec<Job>> {
        let jobs = self.locked();
        let mut owned: Vec<Job> = jobs.values().filter(|j| j.owner == owner).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }

    fn stale_processing(&self, cutoff: DateTime<Utc>) -> PlatenResult<Vec<Uuid>> {
        let jobs = self.locked();
        Ok(jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing && j.updated_at < cutoff)
            .map(|j| j.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::settings::{OutputFormat, RenderSettings};
    use crate::job::model::JobKind;

    fn job(owner: &str) -> Job {
        Job::new(
            owner,
            JobKind::RenderDocument {
                project: Uuid::new_v4(),
                settings: RenderSettings::new(OutputFormat::Pdf),
            },
        )
    }

    #[test]
    fn apply_is_atomic_on_error() {
        let store = InMemoryJobStore::new();
        let j = job("alice");
        let id = j.id;
        store.insert(j).unwrap();

        let err = store.apply(id, &mut |job| {
            job.progress = 42;
            Err(PlatenError::invalid_state("refuse"))
        });
        assert!(err.is_err());
        let got = store.get(id).unwrap();
        assert_eq!(got.status, JobStatus::Pending);
        assert_eq!(got.progress, 0);
    }

    #[test]
    fn list_is_newest_first_and_owner_scoped() {
        let store = InMemoryJobStore::new();
        let a1 = job("alice");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let a2 = job("alice");
        let b = job("bob");
        store.insert(a1.clone()).unwrap();
        store.insert(a2.clone()).unwrap();
        store.insert(b).unwrap();

        let listed = store.list_owned("alice").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a2.id);
        assert_eq!(listed[1].id, a1.id);
    }

    #[test]
    fn stale_detection_only_sees_processing() {
        let store = InMemoryJobStore::new();
        let mut processing = job("alice");
        processing.start().unwrap();
        let stale_id = processing.id;
        store.insert(processing).unwrap();
        store.insert(job("alice")).unwrap();

        let future = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(store.stale_processing(future).unwrap(), vec![stale_id]);

        let past = Utc::now() - chrono::Duration::seconds(60);
        assert!(store.stale_processing(past).unwrap().is_empty());
    }
}
