//! Persistence provider boundary.
//!
//! Agents and packages are loaded once at startup and package changes are
//! written through as they happen. Uses enum dispatch instead of trait
//! objects because async methods are not dyn-compatible in Rust.
//!
//! Two providers exist: an in-memory store seeded with fixtures (tests and
//! demo runs) and a JSON-file store keeping `agents.json` and
//! `packages.json` under a data directory. Write-through failures are the
//! caller's to log; the engine never retries them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use logitrack_types::{AgentRecord, Package, PackageId, PackageStatus};
use tracing::{debug, warn};

use crate::config::{ConfigError, PersistenceConfig};

/// Errors from the persistence provider.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A data file could not be read or written.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A data file held malformed JSON.
    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Unified provider enum (dyn-compatible alternative to async trait)
// ---------------------------------------------------------------------------

/// Where agents and packages are loaded from and written through to.
#[derive(Debug, Clone)]
pub enum PersistenceProvider {
    /// Seeded in-memory fixtures; saves are accepted and dropped.
    Memory(MemoryStore),
    /// `agents.json` / `packages.json` under a data directory.
    JsonFile(JsonFileStore),
}

impl PersistenceProvider {
    /// An empty in-memory provider.
    pub const fn memory() -> Self {
        Self::Memory(MemoryStore {
            agents: Vec::new(),
            packages: Vec::new(),
        })
    }

    /// An in-memory provider seeded with fixtures.
    pub const fn seeded(agents: Vec<AgentRecord>, packages: Vec<Package>) -> Self {
        Self::Memory(MemoryStore { agents, packages })
    }

    /// A JSON-file provider rooted at `dir`.
    pub fn json_file(dir: impl Into<PathBuf>) -> Self {
        Self::JsonFile(JsonFileStore { dir: dir.into() })
    }

    /// Build the provider named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] for a provider name this
    /// build does not know.
    pub fn from_config(config: &PersistenceConfig) -> Result<Self, ConfigError> {
        match config.provider.as_str() {
            "memory" => Ok(Self::memory()),
            "json-file" => Ok(Self::json_file(&config.path)),
            other => Err(ConfigError::Unsupported {
                field: "persistence.provider",
                value: other.to_owned(),
                expected: r#""memory" or "json-file""#,
            }),
        }
    }

    /// Human-readable provider name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::JsonFile(_) => "json-file",
        }
    }

    /// Load the agent roster.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the backing file exists but cannot
    /// be read or parsed. A missing file is a clean empty roster.
    pub async fn load_agents(&self) -> Result<Vec<AgentRecord>, PersistError> {
        match self {
            Self::Memory(store) => Ok(store.agents.clone()),
            Self::JsonFile(store) => load_list(&store.agents_path()).await,
        }
    }

    /// Load the package table.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the backing file exists but cannot
    /// be read or parsed. A missing file is a clean empty table.
    pub async fn load_packages(&self) -> Result<Vec<Package>, PersistError> {
        match self {
            Self::Memory(store) => Ok(store.packages.clone()),
            Self::JsonFile(store) => load_list(&store.packages_path()).await,
        }
    }

    /// Write a full package record through (creation and assignment).
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the backing file cannot be updated.
    pub async fn save_package(&self, package: &Package) -> Result<(), PersistError> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::JsonFile(store) => store.upsert_package(package).await,
        }
    }

    /// Write a package status transition through.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] when the backing file cannot be updated.
    pub async fn save_package_status(
        &self,
        package_id: PackageId,
        status: PackageStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PersistError> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::JsonFile(store) => store.update_status(package_id, status, updated_at).await,
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Ephemeral fixtures for tests and demo runs.
///
/// Loads return the seed lists; saves are dropped, since runtime state
/// lives in the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    agents: Vec<AgentRecord>,
    packages: Vec<Package>,
}

// ---------------------------------------------------------------------------
// JSON-file store
// ---------------------------------------------------------------------------

/// Two JSON documents under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    fn agents_path(&self) -> PathBuf {
        self.dir.join("agents.json")
    }

    fn packages_path(&self) -> PathBuf {
        self.dir.join("packages.json")
    }

    async fn upsert_package(&self, package: &Package) -> Result<(), PersistError> {
        let path = self.packages_path();
        let mut packages: Vec<Package> = load_list(&path).await?;
        match packages.iter_mut().find(|entry| entry.id == package.id) {
            Some(existing) => *existing = package.clone(),
            None => packages.push(package.clone()),
        }
        self.write_list(&path, &packages).await
    }

    async fn update_status(
        &self,
        package_id: PackageId,
        status: PackageStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PersistError> {
        let path = self.packages_path();
        let mut packages: Vec<Package> = load_list(&path).await?;
        let Some(package) = packages.iter_mut().find(|entry| entry.id == package_id) else {
            warn!(%package_id, "Status write-through for a package not in the data file");
            return Ok(());
        };
        package.status = status;
        package.updated_at = updated_at;
        self.write_list(&path, &packages).await
    }

    async fn write_list<T: serde::Serialize>(
        &self,
        path: &Path,
        items: &[T],
    ) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::Io {
                path: self.dir.clone(),
                source,
            })?;
        let json = serde_json::to_vec_pretty(items).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

async fn load_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Seed file missing; starting empty");
            Ok(Vec::new())
        }
        Err(source) => Err(PersistError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
