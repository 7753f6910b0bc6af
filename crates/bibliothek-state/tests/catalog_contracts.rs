//! Contract tests for CatalogStore.
//!
//! Every scenario runs against the in-memory fake and against SurrealDB's
//! in-memory engine. Any conforming implementation must pass these.

use std::collections::BTreeMap;
use std::sync::Arc;

use bibliothek_state::fakes::MemoryCatalogStore;
use bibliothek_state::{
    CatalogStore, Change, Channel, ContentDigest, DisplayMode, Download, NewBuild,
    StorageError, SurrealCatalogStore,
};

async fn backends() -> Vec<(&'static str, Arc<dyn CatalogStore>)> {
    vec![
        (
            "memory",
            Arc::new(MemoryCatalogStore::new()) as Arc<dyn CatalogStore>,
        ),
        (
            "surreal",
            Arc::new(SurrealCatalogStore::in_memory().await.unwrap()) as Arc<dyn CatalogStore>,
        ),
    ]
}

fn build(number: u32) -> NewBuild {
    NewBuild {
        number,
        channel: Channel::Default,
        changes: Vec::new(),
        downloads: BTreeMap::new(),
    }
}

// ===========================================================================
// Hierarchy
// ===========================================================================

#[tokio::test]
async fn ensure_project_is_idempotent_and_immutable() {
    for (name, store) in backends().await {
        let first = store.ensure_project("paper", "Paper").await.unwrap();
        let again = store.ensure_project("paper", "Something Else").await.unwrap();

        assert_eq!(first.id, again.id, "{name}");
        assert_eq!(again.friendly_name, "Paper", "{name}");
        assert_eq!(store.list_projects().await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn groups_are_scoped_by_project() {
    for (name, store) in backends().await {
        let paper = store.ensure_project("paper", "Paper").await.unwrap();
        let velocity = store.ensure_project("velocity", "Velocity").await.unwrap();

        let a = store.ensure_group(&paper, "1.20").await.unwrap();
        let b = store.ensure_group(&velocity, "1.20").await.unwrap();
        let a_again = store.ensure_group(&paper, "1.20").await.unwrap();

        assert_ne!(a.id, b.id, "{name}");
        assert_eq!(a.id, a_again.id, "{name}");
        assert_eq!(a.created_at, a_again.created_at, "{name}: timestamp only set on insert");
        assert_eq!(a.project_id, paper.id, "{name}");
        assert_eq!(store.list_groups(&paper).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn version_group_association_is_fixed_at_creation() {
    for (name, store) in backends().await {
        let project = store.ensure_project("paper", "Paper").await.unwrap();
        let g1 = store.ensure_group(&project, "1.20").await.unwrap();
        let g2 = store.ensure_group(&project, "1.21").await.unwrap();

        let created = store.ensure_version(&project, &g1, "1.20.1").await.unwrap();
        let reused = store.ensure_version(&project, &g2, "1.20.1").await.unwrap();

        assert_eq!(created.id, reused.id, "{name}");
        assert_eq!(reused.group_id, g1.id, "{name}");
        assert_eq!(store.list_versions(&project).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn concurrent_ensure_creates_exactly_one_record() {
    for _round in 0..5 {
        for (name, store) in backends().await {
            let mut tasks = Vec::new();
            for i in 0..8 {
                let store = store.clone();
                tasks.push(tokio::spawn(async move {
                    let project = store.ensure_project("paper", &format!("Paper {i}")).await?;
                    let group = store.ensure_group(&project, "1.20").await?;
                    let version = store.ensure_version(&project, &group, "1.20.1").await?;
                    Ok::<_, StorageError>((project.id, group.id, version.id))
                }));
            }

            let mut ids = Vec::new();
            for task in tasks {
                match task.await.unwrap() {
                    Ok(resolved) => ids.push(resolved),
                    Err(e) => panic!("{name}: concurrent ensure failed: {e}"),
                }
            }
            ids.dedup();
            assert_eq!(ids.len(), 1, "{name}: all callers observe the same records");

            let projects = store.list_projects().await.unwrap();
            assert_eq!(projects.len(), 1, "{name}");
            assert_eq!(store.list_groups(&projects[0]).await.unwrap().len(), 1, "{name}");
            assert_eq!(store.list_versions(&projects[0]).await.unwrap().len(), 1, "{name}");
        }
    }
}

// ===========================================================================
// Builds
// ===========================================================================

#[tokio::test]
async fn latest_build_is_highest_number() {
    for (name, store) in backends().await {
        let project = store.ensure_project("paper", "Paper").await.unwrap();
        let group = store.ensure_group(&project, "1.20").await.unwrap();
        let version = store.ensure_version(&project, &group, "1.20.1").await.unwrap();

        assert!(store.latest_build(&project, &version).await.unwrap().is_none(), "{name}");

        for n in [1, 5, 2] {
            store.insert_build(&project, &version, build(n)).await.unwrap();
        }

        let latest = store.latest_build(&project, &version).await.unwrap().unwrap();
        assert_eq!(latest.number, 5, "{name}");
    }
}

#[tokio::test]
async fn duplicate_build_number_is_rejected() {
    for (name, store) in backends().await {
        let project = store.ensure_project("paper", "Paper").await.unwrap();
        let group = store.ensure_group(&project, "1.20").await.unwrap();
        let version = store.ensure_version(&project, &group, "1.20.1").await.unwrap();

        store.insert_build(&project, &version, build(7)).await.unwrap();
        let err = store
            .insert_build(&project, &version, build(7))
            .await
            .unwrap_err();

        assert!(
            matches!(err, StorageError::DuplicateBuild { number: 7, .. }),
            "{name}: {err:?}"
        );
        assert_eq!(store.list_builds(&project, &version).await.unwrap().len(), 1, "{name}");
    }
}

#[tokio::test]
async fn concurrent_inserts_of_one_number_leave_a_single_build() {
    for round in 0..10 {
        for (name, store) in backends().await {
            let project = store.ensure_project("paper", "Paper").await.unwrap();
            let group = store.ensure_group(&project, "1.20").await.unwrap();
            let version = store.ensure_version(&project, &group, "1.20.1").await.unwrap();

            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    let (project, version) = (project.clone(), version.clone());
                    tokio::spawn(async move { store.insert_build(&project, &version, build(1)).await })
                })
                .collect();

            let (mut inserted, mut duplicates) = (0, 0);
            for task in tasks {
                match task.await.unwrap() {
                    Ok(_) => inserted += 1,
                    Err(StorageError::DuplicateBuild { number: 1, .. }) => duplicates += 1,
                    Err(other) => panic!("{name} round {round}: {other:?}"),
                }
            }
            assert_eq!((inserted, duplicates), (1, 1), "{name} round {round}");
            assert_eq!(store.list_builds(&project, &version).await.unwrap().len(), 1, "{name}");
        }
    }
}

#[tokio::test]
async fn same_number_in_different_versions_is_allowed() {
    for (name, store) in backends().await {
        let project = store.ensure_project("paper", "Paper").await.unwrap();
        let group = store.ensure_group(&project, "1.20").await.unwrap();
        let v1 = store.ensure_version(&project, &group, "1.20.1").await.unwrap();
        let v2 = store.ensure_version(&project, &group, "1.20.2").await.unwrap();

        store.insert_build(&project, &v1, build(1)).await.unwrap();
        store.insert_build(&project, &v2, build(1)).await.unwrap();

        assert!(store.get_build(&project, &v1, 1).await.unwrap().is_some(), "{name}");
        assert!(store.get_build(&project, &v2, 1).await.unwrap().is_some(), "{name}");
    }
}

#[tokio::test]
async fn build_round_trips_changes_and_downloads() {
    for (name, store) in backends().await {
        let project = store.ensure_project("paper", "Paper").await.unwrap();
        let group = store.ensure_group(&project, "1.20").await.unwrap();
        let version = store.ensure_version(&project, &group, "1.20.1").await.unwrap();

        let mut downloads = BTreeMap::new();
        downloads.insert(
            "application.primary".to_string(),
            Download {
                name: "paper-1.20.1-1.jar".to_string(),
                sha256: ContentDigest::from_bytes(b"primary"),
            },
        );
        downloads.insert(
            "application.mojmap".to_string(),
            Download {
                name: "paper-mojmap.jar".to_string(),
                sha256: ContentDigest::from_bytes(b"mojmap"),
            },
        );
        let changes = vec![
            Change {
                commit: "b".repeat(40),
                summary: "Second".to_string(),
                message: "Second\n\nBody".to_string(),
            },
            Change {
                commit: "a".repeat(40),
                summary: "First".to_string(),
                message: "First".to_string(),
            },
        ];

        let written = store
            .insert_build(
                &project,
                &version,
                NewBuild {
                    number: 1,
                    channel: Channel::Experimental,
                    changes: changes.clone(),
                    downloads: downloads.clone(),
                },
            )
            .await
            .unwrap();
        let read = store.get_build(&project, &version, 1).await.unwrap().unwrap();

        assert_eq!(read.id, written.id, "{name}");
        assert_eq!(read.channel, Channel::Experimental, "{name}");
        assert_eq!(read.display_mode, DisplayMode::Hide, "{name}");
        assert_eq!(read.downloads, downloads, "{name}");
        assert_eq!(read.changes, changes, "{name}");
        assert_eq!(read.head_commit(), Some("b".repeat(40).as_str()), "{name}");
        assert_eq!(read.project_id, project.id, "{name}");
        assert_eq!(read.version_id, version.id, "{name}");
    }
}

// ===========================================================================
// Lookups
// ===========================================================================

#[tokio::test]
async fn lookups_do_not_create_records() {
    for (name, store) in backends().await {
        assert!(store.find_project("ghost").await.unwrap().is_none(), "{name}");
        assert!(store.list_projects().await.unwrap().is_empty(), "{name}");

        let project = store.ensure_project("paper", "Paper").await.unwrap();
        assert!(store.find_version(&project, "9.9").await.unwrap().is_none(), "{name}");
        assert!(store.list_versions(&project).await.unwrap().is_empty(), "{name}");
        assert_eq!(
            store.find_project("paper").await.unwrap().map(|p| p.id),
            Some(project.id),
            "{name}"
        );
    }
}
