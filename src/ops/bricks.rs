//! Brick collision checks

use crate::common::Result;
use crate::volume::{Brick, VolumeRepository};
use std::collections::HashSet;

/// Candidate bricks that some volume of the cluster already uses.
///
/// Returned in the order of `candidates`, each at most once.
pub async fn find_brick_conflicts(
    repo: &VolumeRepository,
    candidates: &[Brick],
) -> Result<Vec<Brick>> {
    let used: HashSet<Brick> = repo.all_bricks().await?.into_iter().collect();

    let mut seen = HashSet::new();
    let conflicts: Vec<Brick> = candidates
        .iter()
        .filter(|brick| used.contains(*brick) && seen.insert(*brick))
        .cloned()
        .collect();

    if !conflicts.is_empty() {
        tracing::warn!(count = conflicts.len(), "Bricks already in use");
    }
    Ok(conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use crate::volume::{Volume, VolumeType};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_conflicts_with_existing_volumes() {
        let repo = VolumeRepository::new(Arc::new(MemStore::new()));
        let vol = Volume::new(
            "gv0",
            VolumeType::Replicate,
            vec![Brick::new("n1", "/b/1"), Brick::new("n2", "/b/1")],
        );
        repo.put(&vol).await.unwrap();

        let candidates = vec![
            Brick::new("n1", "/b/1"),
            Brick::new("n1", "/b/2"),
            Brick::new("n1", "/b/1"),
            Brick::new("n3", "/b/1"),
        ];
        let conflicts = find_brick_conflicts(&repo, &candidates).await.unwrap();
        assert_eq!(conflicts, vec![Brick::new("n1", "/b/1")]);
    }

    #[tokio::test]
    async fn test_no_volumes_no_conflicts() {
        let repo = VolumeRepository::new(Arc::new(MemStore::new()));
        let conflicts = find_brick_conflicts(&repo, &[Brick::new("n1", "/b/1")])
            .await
            .unwrap();
        assert!(conflicts.is_empty());
    }
}
