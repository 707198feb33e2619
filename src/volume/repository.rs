//! Volume metadata repository
//!
//! Every volume lives at `volumes/<name>` as a full JSON snapshot. The
//! repository keeps no state of its own: each call is one round trip to the
//! coordination store, which serializes conflicting writes (last write wins).

use crate::common::{Error, Result};
use crate::store::{KeyValue, KvStore};
use crate::volume::filter::VolumeFilter;
use crate::volume::types::{Brick, Volume};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Namespace of volume records in the coordination store
pub const VOLUME_PREFIX: &str = "volumes/";

/// Store key of the volume called `name`
pub fn volume_key(name: &str) -> String {
    format!("{}{}", VOLUME_PREFIX, name)
}

/// Result of a full scan of the volume namespace
#[derive(Debug, Default)]
pub struct VolumeScan {
    pub volumes: Vec<Volume>,
    /// Keys whose value is not a volume record
    pub corrupt: Vec<String>,
}

/// CRUD and cross-volume queries over volume records
#[derive(Clone)]
pub struct VolumeRepository {
    store: Arc<dyn KvStore>,
}

impl VolumeRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create or replace a volume record
    pub async fn put(&self, volume: &Volume) -> Result<()> {
        volume.validate()?;

        let key = volume_key(&volume.name);
        let value = serde_json::to_vec(volume).map_err(|source| {
            tracing::error!(key = %key, error = %source, "Failed to serialize volume");
            Error::Serialization {
                key: key.clone(),
                source,
            }
        })?;

        self.store.put(&key, value).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Couldn't add volume to store");
            e
        })?;

        tracing::debug!(volume = %volume.name, id = %volume.id, "Volume stored");
        Ok(())
    }

    /// Fetch the volume called `name`
    pub async fn get(&self, name: &str) -> Result<Volume> {
        let key = volume_key(name);
        let mut kvs = self.store.get(&key).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Couldn't retrieve volume from store");
            e
        })?;

        if kvs.len() != 1 {
            return Err(Error::NotFound(name.to_string()));
        }

        let kv = kvs.remove(0);
        decode(&kv).map_err(|e| {
            tracing::error!(key = %kv.key, error = %e, "Failed to decode volume");
            e
        })
    }

    /// Remove the volume called `name`. Removing an absent volume is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let deleted = self.store.delete(&volume_key(name)).await?;
        tracing::debug!(volume = %name, deleted, "Volume deleted");
        Ok(())
    }

    /// Whether a volume called `name` exists
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.store.get(&volume_key(name)).await?.len() == 1)
    }

    /// Every decodable volume. Corrupt records are logged and skipped.
    pub async fn list(&self) -> Result<Vec<Volume>> {
        self.list_filtered(&VolumeFilter::all()).await
    }

    /// Decodable volumes whose metadata matches `filter`
    pub async fn list_filtered(&self, filter: &VolumeFilter) -> Result<Vec<Volume>> {
        let kvs = self.store.get_prefix(VOLUME_PREFIX).await?;

        let volumes: Vec<Volume> = kvs
            .iter()
            .filter_map(decode_or_skip)
            .filter(|vol| filter.matches(&vol.metadata))
            .collect();
        tracing::debug!(
            mode = ?filter.mode(),
            scanned = kvs.len(),
            matched = volumes.len(),
            "Volumes listed"
        );
        Ok(volumes)
    }

    /// Every volume, plus the keys of records that could not be decoded
    pub async fn scan(&self) -> Result<VolumeScan> {
        let kvs = self.store.get_prefix(VOLUME_PREFIX).await?;

        let mut scan = VolumeScan::default();
        for kv in &kvs {
            match decode_or_skip(kv) {
                Some(vol) => scan.volumes.push(vol),
                None => scan.corrupt.push(kv.key.clone()),
            }
        }
        Ok(scan)
    }

    /// Name to UUID of every decodable volume
    pub async fn list_names(&self) -> Result<HashMap<String, Uuid>> {
        let kvs = self.store.get_prefix(VOLUME_PREFIX).await?;

        Ok(kvs
            .iter()
            .filter_map(decode_or_skip)
            .map(|vol| (vol.name, vol.id))
            .collect())
    }

    /// Bricks of every volume in the cluster, volume by volume
    pub async fn all_bricks(&self) -> Result<Vec<Brick>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .flat_map(|vol| vol.bricks)
            .collect())
    }

    /// Whether a replicating volume other than `exclude` is started.
    ///
    /// The excluded volume never counts, whatever its own type or state.
    pub async fn safe_to_modify(&self, exclude: Uuid) -> Result<bool> {
        Ok(self
            .list()
            .await?
            .iter()
            .any(|vol| vol.id != exclude && vol.is_replicating() && vol.is_started()))
    }

    /// Verify that `hostname:path` is a brick of `volume`
    pub fn validate_brick_location(
        &self,
        volume: &Volume,
        hostname: &str,
        path: &str,
    ) -> Result<()> {
        volume.validate_brick_location(hostname, path)
    }
}

fn decode(kv: &KeyValue) -> Result<Volume> {
    serde_json::from_slice(&kv.value).map_err(|source| Error::Deserialization {
        key: kv.key.clone(),
        source,
    })
}

fn decode_or_skip(kv: &KeyValue) -> Option<Volume> {
    match decode(kv) {
        Ok(vol) => Some(vol),
        Err(e) => {
            tracing::error!(volume = %kv.key, error = %e, "Failed to unmarshal volume, skipping");
            None
        }
    }
}
