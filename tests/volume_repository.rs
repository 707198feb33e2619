//! Volume repository behaviour against an in-process store

use clusterd::store::{KvStore, MemStore};
use clusterd::volume::{Brick, Volume, VolumeFilter, VolumeRepository, VolumeState, VolumeType};
use clusterd::Error;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

fn setup() -> (Arc<MemStore>, VolumeRepository) {
    let store = Arc::new(MemStore::new());
    (store.clone(), VolumeRepository::new(store))
}

fn volume(name: &str, vol_type: VolumeType, state: VolumeState, bricks: &[(&str, &str)]) -> Volume {
    let mut vol = Volume::new(
        name,
        vol_type,
        bricks.iter().map(|(h, p)| Brick::new(*h, *p)).collect(),
    );
    vol.state = state;
    vol
}

#[tokio::test]
async fn test_volume_lifecycle() {
    let (_, repo) = setup();
    let vol = volume(
        "gv0",
        VolumeType::Replicate,
        VolumeState::Created,
        &[("n1", "/b/1"), ("n2", "/b/1")],
    )
    .with_metadata("owner", "ops");

    assert!(!repo.exists("gv0").await.unwrap());
    repo.put(&vol).await.unwrap();
    assert!(repo.exists("gv0").await.unwrap());

    let stored = repo.get("gv0").await.unwrap();
    assert_eq!(stored, vol);
    assert_eq!(stored.bricks().len(), 2);

    repo.delete("gv0").await.unwrap();
    assert!(matches!(repo.get("gv0").await, Err(Error::NotFound(_))));
    assert!(!repo.exists("gv0").await.unwrap());

    // deleting an absent volume is fine
    repo.delete("gv0").await.unwrap();
}

#[tokio::test]
async fn test_list_with_metadata_filters() {
    let (_, repo) = setup();
    let a = volume("a", VolumeType::Distribute, VolumeState::Created, &[("n1", "/a")])
        .with_metadata("tier", "gold");
    let b = volume("b", VolumeType::Distribute, VolumeState::Created, &[("n1", "/b")])
        .with_metadata("tier", "silver");
    let c = volume("c", VolumeType::Distribute, VolumeState::Created, &[("n1", "/c")])
        .with_metadata("backup", "gold");
    for vol in [&a, &b, &c] {
        repo.put(vol).await.unwrap();
    }

    let names = |vols: Vec<Volume>| {
        let mut names: Vec<String> = vols.into_iter().map(|v| v.name).collect();
        names.sort();
        names
    };

    assert_eq!(names(repo.list().await.unwrap()), ["a", "b", "c"]);
    assert_eq!(
        names(repo.list_filtered(&VolumeFilter::key("tier")).await.unwrap()),
        ["a", "b"]
    );
    assert_eq!(
        names(repo.list_filtered(&VolumeFilter::value("gold")).await.unwrap()),
        ["a", "c"]
    );
    assert_eq!(
        names(
            repo.list_filtered(&VolumeFilter::key_value("tier", "gold"))
                .await
                .unwrap()
        ),
        ["a"]
    );
    assert!(repo
        .list_filtered(&VolumeFilter::key_value("tier", "bronze"))
        .await
        .unwrap()
        .is_empty());

    let params = HashMap::from([("value".to_string(), "silver".to_string())]);
    assert_eq!(
        names(
            repo.list_filtered(&VolumeFilter::from_params(&params))
                .await
                .unwrap()
        ),
        ["b"]
    );
}

#[tokio::test]
async fn test_value_filter_lists_each_volume_once() {
    let (_, repo) = setup();
    let vol = volume("gv0", VolumeType::Distribute, VolumeState::Created, &[("n1", "/a")])
        .with_metadata("primary", "gold")
        .with_metadata("secondary", "gold");
    repo.put(&vol).await.unwrap();

    let listed = repo.list_filtered(&VolumeFilter::value("gold")).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_corrupt_record_is_skipped() {
    let (store, repo) = setup();
    for name in ["a", "b", "c"] {
        let vol = volume(name, VolumeType::Distribute, VolumeState::Created, &[("n1", name)]);
        repo.put(&vol).await.unwrap();
    }
    store.put("volumes/zz", b"{\"name\":".to_vec()).await.unwrap();

    assert_eq!(repo.list().await.unwrap().len(), 3);
    assert_eq!(repo.list_names().await.unwrap().len(), 3);
    assert!(matches!(repo.get("zz").await, Err(Error::Deserialization { .. })));
}

#[tokio::test]
async fn test_all_bricks() {
    let (_, repo) = setup();
    assert!(repo.all_bricks().await.unwrap().is_empty());

    repo.put(&volume(
        "a",
        VolumeType::Replicate,
        VolumeState::Started,
        &[("n1", "/b/1"), ("n2", "/b/1")],
    ))
    .await
    .unwrap();
    repo.put(&volume("b", VolumeType::Distribute, VolumeState::Created, &[("n3", "/b/2")]))
        .await
        .unwrap();

    let mut bricks: Vec<String> = repo
        .all_bricks()
        .await
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    bricks.sort();
    assert_eq!(bricks, ["n1:/b/1", "n2:/b/1", "n3:/b/2"]);
}

#[tokio::test]
async fn test_safe_to_modify() {
    let (_, repo) = setup();
    let a = volume("a", VolumeType::Replicate, VolumeState::Started, &[("n1", "/a")]);
    let b = volume("b", VolumeType::Distribute, VolumeState::Started, &[("n1", "/b")]);
    repo.put(&a).await.unwrap();
    repo.put(&b).await.unwrap();

    // the only started replica is the excluded volume itself
    assert!(!repo.safe_to_modify(a.id).await.unwrap());
    assert!(repo.safe_to_modify(b.id).await.unwrap());
    assert!(repo.safe_to_modify(Uuid::new_v4()).await.unwrap());

    let c = volume("c", VolumeType::DistDisperse, VolumeState::Started, &[("n1", "/c")]);
    repo.put(&c).await.unwrap();
    assert!(repo.safe_to_modify(a.id).await.unwrap());
}

#[tokio::test]
async fn test_safe_to_modify_empty_cluster() {
    let (_, repo) = setup();
    assert!(!repo.safe_to_modify(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_validate_brick_location() {
    let (_, repo) = setup();
    let vol = volume(
        "gv0",
        VolumeType::Replicate,
        VolumeState::Created,
        &[("n1", "/b/1"), ("n2", "/b/2")],
    );

    repo.validate_brick_location(&vol, "n2", "/b/2").unwrap();
    assert!(matches!(
        repo.validate_brick_location(&vol, "n3", "/b/1"),
        Err(Error::UnknownHost { .. })
    ));
    // the path exists, but on another host
    assert!(matches!(
        repo.validate_brick_location(&vol, "n1", "/b/2"),
        Err(Error::UnknownBrickPath { .. })
    ));
}

#[tokio::test]
async fn test_unavailable_store() {
    let (store, repo) = setup();
    store.set_available(false);

    let err = repo.list().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(repo.safe_to_modify(Uuid::new_v4()).await, Err(Error::StoreTransport(_))));
    assert!(matches!(repo.all_bricks().await, Err(Error::StoreTransport(_))));
    assert!(matches!(repo.delete("gv0").await, Err(Error::StoreTransport(_))));
}
