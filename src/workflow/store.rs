//! Request persistence - one YAML document per request instance
//!
//! Layout: `requests/changes/CHG-2026-001.yaml`, `requests/exceptions/EXC-2026-001.yaml`.
//! Writers lock `<ID>.yaml.lock` around a read-modify-write and `.ids.lock`
//! around ID allocation; see [`RequestLock`].

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::identity::{IdParseError, RequestId, RequestPrefix};
use crate::workflow::lock::{RequestLock, DEFAULT_LOCK_TIMEOUT};
use crate::yaml::{parse_yaml_file, YamlError};

/// Common interface of persisted requests
pub trait Request: Serialize + DeserializeOwned {
    const PREFIX: RequestPrefix;

    fn request_id(&self) -> RequestId;

    fn title(&self) -> &str;

    fn state_label(&self) -> &'static str;

    fn requester(&self) -> &str;

    fn created(&self) -> DateTime<Utc>;

    /// Creation-time invariants
    fn check(&self) -> Result<(), RequestError>;
}

/// A request that violates its creation invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request title must not be empty")]
    EmptyTitle,

    #[error("Temporary exceptions require a duration (--start and --end)")]
    DurationRequired,

    #[error("Duration end ({end}) must be after start ({start})")]
    InvalidDuration {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    #[error("{id} is a {actual} request, not {expected}")]
    WrongKind {
        id: RequestId,
        expected: RequestPrefix,
        actual: RequestPrefix,
    },

    #[error("Request {0} already exists")]
    AlreadyExists(RequestId),

    #[error("Timed out waiting for lock {}; another ngt process is writing", .path.display())]
    LockTimeout { path: PathBuf },

    #[error(transparent)]
    Id(#[from] IdParseError),

    #[error(transparent)]
    Document(#[from] YamlError),

    #[error("Failed to serialize {id}: {message}")]
    Serialize { id: RequestId, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage for one request type
pub trait RequestStore<R: Request> {
    fn load(&self, id: RequestId) -> Result<R, StoreError>;

    /// Insert or overwrite
    fn save(&self, request: &R) -> Result<(), StoreError>;

    /// Every stored request, ordered by ID
    fn list(&self) -> Result<Vec<R>, StoreError>;

    /// Allocate the next ID for `year`
    fn next_id(&self, year: i32) -> Result<RequestId, StoreError> {
        let ids: Vec<RequestId> = self.list()?.iter().map(Request::request_id).collect();
        Ok(RequestId::next(R::PREFIX, year, &ids)?)
    }

    /// Save a new request; fails if the ID is taken
    fn create(&self, request: &R) -> Result<(), StoreError> {
        match self.load(request.request_id()) {
            Ok(_) => Err(StoreError::AlreadyExists(request.request_id())),
            Err(StoreError::NotFound(_)) => self.save(request),
            Err(e) => Err(e),
        }
    }
}

/// Directory of `<ID>.yaml` documents
#[derive(Debug, Clone)]
pub struct YamlRequestStore<R> {
    dir: PathBuf,
    lock_timeout: Duration,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Request> YamlRequestStore<R> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            _kind: PhantomData,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Exclusive access to one request; hold it across load, fire and save
    pub fn lock(&self, id: RequestId) -> Result<RequestLock, StoreError> {
        RequestLock::acquire(self.dir.join(format!("{}.yaml.lock", id)), self.lock_timeout)
    }

    /// Exclusive access to ID allocation; hold it across `next_id` and `create`
    pub fn lock_ids(&self) -> Result<RequestLock, StoreError> {
        RequestLock::acquire(self.dir.join(".ids.lock"), self.lock_timeout)
    }

    fn path_for(&self, id: RequestId) -> PathBuf {
        self.dir.join(format!("{}.yaml", id))
    }

    fn serialize(request: &R) -> Result<String, StoreError> {
        serde_yml::to_string(request).map_err(|e| StoreError::Serialize {
            id: request.request_id(),
            message: e.to_string(),
        })
    }

    /// Fully written temporary file, unique per process
    fn write_temp(&self, id: RequestId, yaml: &str) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self
            .dir
            .join(format!("{}.yaml.{}.tmp", id, std::process::id()));
        std::fs::write(&tmp, yaml)?;
        Ok(tmp)
    }
}

impl<R: Request> RequestStore<R> for YamlRequestStore<R> {
    fn load(&self, id: RequestId) -> Result<R, StoreError> {
        if id.prefix() != R::PREFIX {
            return Err(StoreError::WrongKind {
                id,
                expected: R::PREFIX,
                actual: id.prefix(),
            });
        }
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id));
        }
        Ok(parse_yaml_file(&path)?)
    }

    fn save(&self, request: &R) -> Result<(), StoreError> {
        let id = request.request_id();
        let tmp = self.write_temp(id, &Self::serialize(request)?)?;
        let path = self.path_for(id);
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(id = %id, path = %path.display(), "request saved");
        Ok(())
    }

    /// Publish the document with a hard link, which fails if the ID is taken
    fn create(&self, request: &R) -> Result<(), StoreError> {
        let id = request.request_id();
        let tmp = self.write_temp(id, &Self::serialize(request)?)?;
        let path = self.path_for(id);

        let linked = std::fs::hard_link(&tmp, &path);
        let _ = std::fs::remove_file(&tmp);
        match linked {
            Ok(()) => {
                tracing::debug!(id = %id, path = %path.display(), "request created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<R>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            match RequestId::parse(stem) {
                Ok(id) if id.prefix() == R::PREFIX => ids.push(id),
                _ => tracing::debug!(path = %path.display(), "skipping non-request file"),
            }
        }
        ids.sort();

        ids.into_iter().map(|id| self.load(id)).collect()
    }
}
