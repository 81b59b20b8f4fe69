use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{BackendError, KvBackend, Scope, StoreMap};
use crate::error::{PostitError, Result};

pub const POSTIT_DIR: &str = ".postit";
const LOCAL_FILE: &str = "local.json";
const SYNC_FILE: &str = "sync.json";

/// Backend storing each scope as one JSON object on disk.
///
/// The workspace directory vanishing under a live session is reported as
/// `ContextInvalidated`, the same way a reloaded host runtime would be.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Create a new `.postit/` workspace under `root`.
    pub async fn init(root: &Path) -> Result<Self> {
        let dir = root.join(POSTIT_DIR);

        if fs::try_exists(&dir).await? {
            return Err(PostitError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir).await?;

        let backend = Self { dir };
        for scope in [Scope::Local, Scope::Sync] {
            fs::write(backend.scope_path(scope), b"{}").await?;
        }

        Ok(backend)
    }

    /// Open an existing workspace.
    pub async fn open(root: &Path) -> Result<Self> {
        let dir = root.join(POSTIT_DIR);

        if !fs::try_exists(&dir).await? {
            return Err(PostitError::NotInitialized);
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scope_path(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Local => self.dir.join(LOCAL_FILE),
            Scope::Sync => self.dir.join(SYNC_FILE),
        }
    }

    async fn check_dir(&self) -> std::result::Result<(), BackendError> {
        match fs::try_exists(&self.dir).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(BackendError::ContextInvalidated),
            Err(e) => Err(BackendError::Failed(e.to_string())),
        }
    }

    async fn load(&self, scope: Scope) -> std::result::Result<StoreMap, BackendError> {
        self.check_dir().await?;

        let bytes = match fs::read(self.scope_path(scope)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreMap::new()),
            Err(e) => return Err(BackendError::Failed(e.to_string())),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreMap::new());
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Failed(format!("corrupt {} store: {}", scope, e)))
    }

    async fn store(&self, scope: Scope, map: &StoreMap) -> std::result::Result<(), BackendError> {
        let bytes = serde_json::to_vec_pretty(map).map_err(|e| BackendError::Failed(e.to_string()))?;
        let path = self.scope_path(scope);
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| BackendError::Failed(e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| BackendError::Failed(e.to_string()))
    }
}

#[async_trait]
impl KvBackend for JsonFileBackend {
    async fn get(&self, scope: Scope) -> std::result::Result<StoreMap, BackendError> {
        self.load(scope).await
    }

    async fn set(&self, scope: Scope, items: StoreMap) -> std::result::Result<(), BackendError> {
        let mut map = self.load(scope).await?;
        for (key, value) in items {
            map.insert(key, value);
        }
        self.store(scope, &map).await
    }

    async fn remove(&self, scope: Scope, keys: &[String]) -> std::result::Result<(), BackendError> {
        let mut map = self.load(scope).await?;
        for key in keys {
            map.remove(key);
        }
        self.store(scope, &map).await
    }
}
