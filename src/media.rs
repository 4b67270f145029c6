//! Collaborator interfaces for document and media access.
//!
//! The engine consumes these through narrow traits; the backing technology
//! (object storage, database) is out of scope. The filesystem-backed
//! [`FsMediaStore`] and [`InMemoryDocumentSource`] are complete enough for
//! in-process deployments and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use uuid::Uuid;

use crate::doc::model::Document;
use crate::foundation::error::{PlatenError, PlatenResult};

/// A stored media object: uploaded source image or produced artifact.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Pixel dimensions for raster media, when known.
    pub dimensions: Option<(u32, u32)>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Media access, consumed and exposed by the job engine.
pub trait MediaStore: Send + Sync {
    /// Look up a media record. Fails `NotFound` if the id does not exist and
    /// `Forbidden` if it belongs to a different owner.
    fn get_media(&self, id: Uuid, owner: &str) -> PlatenResult<MediaRecord>;

    /// Read the media bytes for an owned record.
    fn read_media(&self, id: Uuid, owner: &str) -> PlatenResult<Vec<u8>>;

    /// Persist produced bytes as a first-class media record.
    fn register_artifact(
        &self,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
        owner: &str,
    ) -> PlatenResult<MediaRecord>;
}

/// Project/document lookup.
pub trait DocumentSource: Send + Sync {
    /// Fetch the document for a project. Fails `NotFound` if the project does
    /// not exist and `Forbidden` if it belongs to a different owner.
    fn get_project(&self, id: Uuid, owner: &str) -> PlatenResult<Document>;
}

/// Deletes its path on drop unless disarmed. Covers the failure paths
/// between creating a temp file and renaming it into place.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Filesystem-backed media store rooted at one directory.
///
/// Files are laid out as `<root>/<owner>/<name>`; the in-memory index maps
/// ids to records. Artifact names are collision-free by construction (job id
/// plus timestamp), so no overwrite handling is needed.
pub struct FsMediaStore {
    root: PathBuf,
    index: Mutex<HashMap<Uuid, MediaRecord>>,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> PlatenResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create media root '{}'", root.display()))?;
        Ok(Self {
            root,
            index: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, MediaRecord>> {
        // Mutex poisoning only happens if a holder panicked; the map itself
        // stays consistent, so recover the guard.
        self.index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_bytes(
        &self,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
        owner: &str,
        dimensions: Option<(u32, u32)>,
    ) -> PlatenResult<MediaRecord> {
        let dir = self.root.join(owner);
        std::fs::create_dir_all(&dir)
            .map_err(|e| PlatenError::transient_io(format!("create '{}': {e}", dir.display())))?;
        let path = dir.join(name);

        // Stage through a temp file so a failed write leaves nothing behind
        // and a reader never sees a partial artifact.
        let tmp = dir.join(format!("{name}.tmp"));
        let mut guard = TempFileGuard::new(tmp.clone());
        std::fs::write(&tmp, bytes)
            .map_err(|e| PlatenError::transient_io(format!("write '{}': {e}", tmp.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| PlatenError::transient_io(format!("rename '{}': {e}", path.display())))?;
        guard.disarm();

        let record = MediaRecord {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            name: name.to_string(),
            path,
            mime_type: mime_type.to_string(),
            size_bytes: bytes.len() as u64,
            dimensions,
            created_at: chrono::Utc::now(),
        };
        self.locked().insert(record.id, record.clone());
        Ok(record)
    }

    /// Seed a source media object, recording raster dimensions when the bytes
    /// decode as an image.
    pub fn register_source(
        &self,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
        owner: &str,
    ) -> PlatenResult<MediaRecord> {
        let dimensions = image::load_from_memory(bytes)
            .ok()
            .map(|img| (img.width(), img.height()));
        self.store_bytes(bytes, name, mime_type, owner, dimensions)
    }
}

impl MediaStore for FsMediaStore {
    fn get_media(&self, id: Uuid, owner: &str) -> PlatenResult<MediaRecord> {
        let index = self.locked();
        let record = index
            .get(&id)
            .ok_or_else(|| PlatenError::not_found(format!("media {id}")))?;
        if record.owner != owner {
            return Err(PlatenError::forbidden(format!("media {id}")));
        }
        Ok(record.clone())
    }

    fn read_media(&self, id: Uuid, owner: &str) -> PlatenResult<Vec<u8>> {
        let record = self.get_media(id, owner)?;
        std::fs::read(&record.path).map_err(|e| {
            PlatenError::transient_io(format!("read '{}': {e}", record.path.display()))
        })
    }

    fn register_artifact(
        &self,
        bytes: &[u8],
        name: &str,
        mime_type: &str,
        owner: &str,
    ) -> PlatenResult<MediaRecord> {
        self.store_bytes(bytes, name, mime_type, owner, None)
    }
}

/// In-memory project store for tests and in-process embedding.
#[derive(Default)]
pub struct InMemoryDocumentSource {
    docs: Mutex<HashMap<Uuid, (String, Document)>>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: &str, doc: Document) -> Uuid {
        let id = Uuid::new_v4();
        self.docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, (owner.to_string(), doc));
        id
    }
}

impl DocumentSource for InMemoryDocumentSource {
    fn get_project(&self, id: Uuid, owner: &str) -> PlatenResult<Document> {
        let docs = self
            .docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (doc_owner, doc) = docs
            .get(&id)
            .ok_or_else(|| PlatenError::not_found(format!("project {id}")))?;
        if doc_owner != owner {
            return Err(PlatenError::forbidden(format!("project {id}")));
        }
        Ok(doc.clone())
    }
}
