//! Tenant-scoped repository behaviour over the in-memory backend.

use std::sync::Arc;

use vendorhub_core::RecordMeta;
use vendorhub_core::models::{Bus, BusStatus};
use vendorhub_db_memory::InMemoryStore;
use vendorhub_storage::{DynStore, Query, Repository, Scope};

fn bus(vendor: &str, reg: &str, capacity: u32) -> Bus {
    Bus {
        meta: RecordMeta::for_vendor(vendor),
        registration_number: reg.to_string(),
        model: "Scania Touring".to_string(),
        capacity,
        amenities: vec!["wifi".to_string()],
        status: BusStatus::Active,
    }
}

fn store() -> DynStore {
    Arc::new(InMemoryStore::new())
}

#[tokio::test]
async fn other_tenants_records_are_invisible() {
    let store = store();
    let alpha = Repository::<Bus>::new(store.clone(), Scope::tenant("alpha"));
    let beta = Repository::<Bus>::new(store.clone(), Scope::tenant("beta"));

    let created = alpha.insert(&bus("alpha", "KAA 001A", 40)).await.unwrap();

    assert!(alpha.get(created.meta.id.as_str()).await.unwrap().is_some());
    assert!(beta.get(&created.meta.id).await.unwrap().is_none());
    assert!(beta.require(&created.meta.id).await.unwrap_err().is_not_found());
    assert!(!beta.delete(&created.meta.id).await.unwrap());
    assert_eq!(beta.count(Query::new()).await.unwrap(), 0);

    let platform = Repository::<Bus>::new(store, Scope::Platform);
    assert_eq!(platform.count(Query::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn cannot_write_records_of_another_tenant() {
    let repo = Repository::<Bus>::new(store(), Scope::tenant("alpha"));
    assert!(repo.insert(&bus("beta", "KBB 002B", 40)).await.is_err());
}

#[tokio::test]
async fn update_touches_timestamp() {
    let repo = Repository::<Bus>::new(store(), Scope::tenant("alpha"));
    let mut b = repo.insert(&bus("alpha", "KAA 001A", 40)).await.unwrap();
    let before = b.meta.updated_at;
    b.capacity = 52;
    repo.update(&mut b).await.unwrap();
    assert!(b.meta.updated_at >= before);

    let reloaded = repo.require(&b.meta.id).await.unwrap();
    assert_eq!(reloaded.capacity, 52);
    assert_eq!(reloaded.meta.created_at, b.meta.created_at);
}

#[tokio::test]
async fn find_pages_and_counts() {
    let repo = Repository::<Bus>::new(store(), Scope::tenant("alpha"));
    for i in 0..7 {
        repo.insert(&bus("alpha", &format!("KAA {i:03}A"), 30 + i))
            .await
            .unwrap();
    }
    let (page, total) = repo
        .find(Query::new().sort_by("capacity", false).window(5, 5))
        .await
        .unwrap();
    assert_eq!(total, 7);
    assert_eq!(page.iter().map(|b| b.capacity).collect::<Vec<_>>(), [35, 36]);

    let found = repo
        .find_one(Query::new().eq("registrationNumber", "KAA 003A"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.capacity, 33);
}
