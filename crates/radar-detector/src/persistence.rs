use crate::buffer::ContractBuffer;
use crate::pipeline::WatcherStats;
use chrono::{DateTime, Utc};
use radar_core::error::{Error, Result};
use radar_core::types::{Chain, ChainAddress, TokenDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Ponto de retomada da varredura
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Checkpoint {
    Height { last_processed_height: Option<u64> },
    Signatures { last_seen: HashMap<ChainAddress, String> },
}

/// Estado persistido de um watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSnapshot {
    pub chain: Chain,
    pub known_tokens: HashMap<ChainAddress, TokenDescriptor>,
    pub buffers: HashMap<ChainAddress, ContractBuffer>,
    pub stats: WatcherStats,
    pub checkpoint: Checkpoint,
    pub saved_at: DateTime<Utc>,
}

/// Armazenamento opaco de snapshots por chain
pub trait SnapshotStore: Send + Sync {
    fn load(&self, chain: Chain) -> Result<Option<WatcherSnapshot>>;
    fn save(&self, snapshot: &WatcherSnapshot) -> Result<()>;
}

/// Snapshots em arquivos JSON, um por chain
pub struct JsonSnapshotStore {
    dir: PathBuf,
}

impl JsonSnapshotStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, chain: Chain) -> PathBuf {
        let name = serde_json::to_value(chain)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| chain.display_name().to_lowercase());
        self.dir.join(format!("{}.json", name))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self, chain: Chain) -> Result<Option<WatcherSnapshot>> {
        let path = self.path_for(chain);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&path)?;
        let snapshot: WatcherSnapshot = serde_json::from_slice(&raw)
            .map_err(|e| Error::StorageError(format!("snapshot inválido em {}: {}", path.display(), e)))?;
        if snapshot.chain != chain {
            return Err(Error::StorageError(format!(
                "snapshot de {} encontrado no arquivo de {}",
                snapshot.chain, chain
            )));
        }
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &WatcherSnapshot) -> Result<()> {
        let path = self.path_for(snapshot.chain);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| Error::EncodeError(e.to_string()))?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
