//! Verify volume metadata integrity

use crate::common::Result;
use crate::volume::{Brick, VolumeRepository};
use std::collections::BTreeMap;

/// Outcome of a pass over every volume record
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub total_records: usize,
    pub healthy: usize,
    /// Keys whose value is not a volume record
    pub corrupted: Vec<String>,
    /// Volume name and the reason it fails validation
    pub invalid: Vec<(String, String)>,
    /// Bricks claimed by more than one volume, with the claiming volumes
    pub shared_bricks: Vec<(Brick, Vec<String>)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted.is_empty() && self.invalid.is_empty() && self.shared_bricks.is_empty()
    }
}

pub async fn verify_volumes(repo: &VolumeRepository) -> Result<VerifyReport> {
    tracing::info!("Starting volume verification");

    let scan = repo.scan().await?;
    let mut report = VerifyReport {
        total_records: scan.volumes.len() + scan.corrupt.len(),
        corrupted: scan.corrupt,
        ..Default::default()
    };

    let mut owners: BTreeMap<&Brick, Vec<String>> = BTreeMap::new();
    for vol in &scan.volumes {
        match vol.validate() {
            Ok(()) => report.healthy += 1,
            Err(e) => report.invalid.push((vol.name.clone(), e.to_string())),
        }
        for brick in &vol.bricks {
            let volumes = owners.entry(brick).or_default();
            if volumes.last() != Some(&vol.name) {
                volumes.push(vol.name.clone());
            }
        }
    }

    report.shared_bricks = owners
        .into_iter()
        .filter(|(_, volumes)| volumes.len() > 1)
        .map(|(brick, volumes)| (brick.clone(), volumes))
        .collect();

    tracing::info!(
        total = report.total_records,
        healthy = report.healthy,
        corrupted = report.corrupted.len(),
        invalid = report.invalid.len(),
        shared_bricks = report.shared_bricks.len(),
        "Volume verification finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemStore};
    use crate::volume::{Volume, VolumeType};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clean_cluster() {
        let repo = VolumeRepository::new(Arc::new(MemStore::new()));
        let vol = Volume::new("gv0", VolumeType::Distribute, vec![Brick::new("n1", "/b/1")]);
        repo.put(&vol).await.unwrap();

        let report = verify_volumes(&repo).await.unwrap();
        assert_eq!(report.total_records, 1);
        assert_eq!(report.healthy, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_colon_in_host_or_path_is_not_shared() {
        let repo = VolumeRepository::new(Arc::new(MemStore::new()));
        // both print as "fd00:b:/c"
        let a = Volume::new("a", VolumeType::Distribute, vec![Brick::new("fd00:b", "/c")]);
        let b = Volume::new("b", VolumeType::Distribute, vec![Brick::new("fd00", "b:/c")]);
        assert_eq!(a.bricks[0].to_string(), b.bricks[0].to_string());
        repo.put(&a).await.unwrap();
        repo.put(&b).await.unwrap();

        let report = verify_volumes(&repo).await.unwrap();
        assert!(report.shared_bricks.is_empty());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_reports_every_problem() {
        let store = Arc::new(MemStore::new());
        let repo = VolumeRepository::new(store.clone());

        let a = Volume::new("a", VolumeType::Replicate, vec![Brick::new("n1", "/b/1")]);
        let b = Volume::new("b", VolumeType::Distribute, vec![Brick::new("n1", "/b/1")]);
        repo.put(&a).await.unwrap();
        repo.put(&b).await.unwrap();

        // written behind the repository's back, so never validated
        let dup = Volume::new(
            "c",
            VolumeType::Distribute,
            vec![Brick::new("n2", "/b/9"), Brick::new("n2", "/b/9")],
        );
        store
            .put("volumes/c", serde_json::to_vec(&dup).unwrap())
            .await
            .unwrap();
        store.put("volumes/d", b"not json".to_vec()).await.unwrap();

        let report = verify_volumes(&repo).await.unwrap();
        assert_eq!(report.total_records, 4);
        assert_eq!(report.healthy, 2);
        assert_eq!(report.corrupted, vec!["volumes/d".to_string()]);
        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.invalid[0].0, "c");

        // a duplicate inside one volume is invalid, not shared
        assert_eq!(report.shared_bricks.len(), 1);
        let (brick, volumes) = &report.shared_bricks[0];
        assert_eq!(brick, &Brick::new("n1", "/b/1"));
        assert_eq!(volumes, &vec!["a".to_string(), "b".to_string()]);
        assert!(!report.is_clean());
    }
}
