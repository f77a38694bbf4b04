use std::collections::BTreeSet;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use quarry::{memory::MemoryBackend, prelude::*};
use serde::{Deserialize, Serialize};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Indexed)]
struct Download {
    #[serde(rename = "_id", default = "zero_id")]
    id: ObjectId,
    #[index]
    name: String,
    #[index(desc)]
    age: i32,
    status: String,
    #[serde(default)]
    created_at: Option<bson::DateTime>,
    #[serde(default)]
    updated_at: Option<bson::DateTime>,
}

impl Download {
    fn new(name: impl Into<String>, age: i32, status: &str) -> Self {
        Self {
            id: zero_id(),
            name: name.into(),
            age,
            status: status.to_string(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Record for Download {
    fn id(&self) -> &ObjectId {
        &self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }

    fn touch(&mut self, at: DateTime<Utc>, creating: bool) {
        let at = bson::DateTime::from_chrono(at);

        if creating {
            self.created_at = Some(at);
        }
        self.updated_at = Some(at);
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, Indexed)]
struct Episode {
    #[serde(rename = "_id", default = "zero_id")]
    id: ObjectId,
    #[index]
    #[serde(rename = "series_id", default)]
    series: String,
    #[index(desc)]
    #[serde(rename = "release_date")]
    released: i64,
    title: String,
}

impl Record for Episode {
    fn id(&self) -> &ObjectId {
        &self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

async fn seeded(n: i32) -> Store<MemoryBackend, Download> {
    init_tracing();

    let store = Store::new(MemoryBackend::new(), "downloads");
    for i in 0..n {
        let status = if i % 2 == 0 { "done" } else { "queued" };
        let mut download = Download::new(format!("d{i:02}"), i, status);
        store.save(&mut download).await.unwrap();
    }

    store
}

fn names(records: &[Download]) -> Vec<&str> {
    records.iter().map(|d| d.name.as_str()).collect()
}

#[tokio::test]
async fn default_limit_applies_until_disabled() {
    let store = seeded(30).await;

    assert_eq!(store.query().run().await.unwrap().len(), 25);
    assert_eq!(store.query().limit(0).run().await.unwrap().len(), 30);
    assert_eq!(store.query().limit(-1).run().await.unwrap().len(), 30);
    assert_eq!(store.query().limit(7).run().await.unwrap().len(), 7);
}

#[tokio::test]
async fn count_agrees_with_unbounded_run() {
    let store = seeded(12).await;

    let query = store.query().eq("status", "done").gte("age", 4).limit(0);
    let count = query.count().await.unwrap();

    assert_eq!(count, 4);
    assert_eq!(query.run().await.unwrap().len() as u64, count);

    let bounded = store.query().limit(3);
    assert!((bounded.run().await.unwrap().len() as u64) <= bounded.count().await.unwrap());
}

#[tokio::test]
async fn save_inserts_then_replaces() {
    let store = seeded(0).await;
    let mut download = Download::new("a", 1, "queued");

    store.save(&mut download).await.unwrap();
    let id = download.id;
    assert!(!is_zero_id(&id));

    download.status = "done".to_string();
    store.save(&mut download).await.unwrap();

    assert_eq!(download.id, id);
    assert_eq!(store.count(None).await.unwrap(), 1);
    assert_eq!(store.get_by_id(&id).await.unwrap().status, "done");
}

#[tokio::test]
async fn save_maintains_timestamps() {
    let store = seeded(0).await;
    let mut download = Download::new("a", 1, "queued");

    store.save(&mut download).await.unwrap();
    let created = download.created_at;
    assert!(created.is_some());

    store.save(&mut download).await.unwrap();
    let stored = store.get_by_id(&download.id).await.unwrap();

    assert_eq!(stored.created_at, created);
    assert!(stored.updated_at >= created);
}

#[tokio::test]
async fn failed_writes_leave_the_record_untouched() {
    let store = seeded(1).await;
    let mut stray = Download::new("stray", 1, "queued");
    stray.id = ObjectId::new();
    let before = stray.clone();

    assert!(matches!(store.save(&mut stray).await, Err(StoreError::NotFound(..))));
    assert_eq!(stray, before);

    assert!(matches!(store.update(&mut stray).await, Err(StoreError::NotFound(..))));
    assert_eq!(stray.updated_at, None);
    assert_eq!(store.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn or_group_returns_the_union() {
    let store = seeded(0).await;
    let seeds = [("a1", 1, "done"), ("a2", 2, "done"), ("b1", 11, "queued"), ("b2", 12, "queued"), ("x", 3, "queued")];
    for (name, age, status) in seeds {
        store.save(&mut Download::new(name, age, status)).await.unwrap();
    }

    let found = store
        .query()
        .or(|q| q.eq("status", "done").gte("age", 10))
        .asc("name")
        .run()
        .await
        .unwrap();

    let reference = seeds
        .iter()
        .filter(|(_, age, status)| *status == "done" || *age >= 10)
        .map(|(name, _, _)| *name)
        .collect::<Vec<_>>();

    assert_eq!(names(&found), reference);
    assert_eq!(names(&found), vec!["a1", "a2", "b1", "b2"]);
}

#[tokio::test]
async fn complex_or_matches_either_conjunction() {
    let store = seeded(10).await;

    let found = store
        .query()
        .complex_or(|a, b| (a.eq("status", "done").lt("age", 3), b.eq("age", 9)))
        .asc("age")
        .run()
        .await
        .unwrap();

    assert_eq!(names(&found), vec!["d00", "d02", "d09"]);
}

#[tokio::test]
async fn sort_keys_apply_in_priority_order() {
    let store = seeded(6).await;

    let found = store.query().asc("status").desc("age").run().await.unwrap();

    assert_eq!(names(&found), vec!["d04", "d02", "d00", "d05", "d03", "d01"]);
}

#[tokio::test]
async fn skip_and_limit_paginate_sorted_results() {
    let store = seeded(10).await;

    let found = store.query().asc("age").skip(4).limit(3).run().await.unwrap();
    assert_eq!(names(&found), vec!["d04", "d05", "d06"]);

    let first = store.query().desc("age").first().await.unwrap();
    assert_eq!(first.map(|d| d.name), Some("d09".to_string()));
}

#[tokio::test]
async fn batch_visits_every_record_once() {
    let store = seeded(10).await;

    let mut pages = Vec::new();
    let mut seen = BTreeSet::new();
    store
        .query()
        .batch(3, |page| {
            pages.push((page.skip, page.len()));
            seen.extend(page.into_iter().map(|d| d.id));
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(pages, vec![(0, 3), (3, 3), (6, 3), (9, 1)]);
    assert_eq!(seen.len(), 10);
}

#[tokio::test]
async fn batch_respects_filters() {
    let store = seeded(10).await;

    let mut total = 0;
    store
        .query()
        .eq("status", "done")
        .batch(2, |page| {
            assert!(page.items.iter().all(|d| d.status == "done"));
            total += page.len();
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(total, 5);
}

#[tokio::test]
async fn delete_many_removes_exactly_the_matches() {
    let store = seeded(10).await;
    let query = store.query().eq("status", "queued");

    let expected = query.count().await.unwrap();
    assert_eq!(query.delete_many().await.unwrap(), expected);
    assert_eq!(query.count().await.unwrap(), 0);
    assert_eq!(store.count(None).await.unwrap(), 5);
}

#[tokio::test]
async fn defaults_scope_queries_but_not_store_count() {
    let mut store = seeded(10).await;
    store.set_query_defaults([Expr::from(Clause::eq("status", "done").unwrap())]);

    assert_eq!(store.query().count().await.unwrap(), 5);
    assert!(store.query().limit(0).run().await.unwrap().iter().all(|d| d.status == "done"));
    assert_eq!(store.count(None).await.unwrap(), 10);

    let queued: Expr = Clause::eq("status", "queued").unwrap().into();
    assert_eq!(store.count(queued.clone()).await.unwrap(), 5);
    assert_eq!(store.query().limit(0).raw(queued).await.unwrap().len(), 5);
}

#[tokio::test]
async fn invalid_field_fails_every_terminal_call() {
    let store = seeded(3).await;
    let query = store.query().eq("status", "done").or(|q| q.eq(" ", 1));

    assert!(matches!(query.run().await, Err(StoreError::InvalidField(_))));
    assert!(matches!(query.count().await, Err(StoreError::InvalidField(_))));
    assert!(matches!(query.delete_many().await, Err(StoreError::InvalidField(_))));
    assert_eq!(store.count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn lookups_by_identity() {
    let store = seeded(2).await;
    let existing = store.query().asc("age").first().await.unwrap().unwrap();

    let found = store.get(&existing.id.to_hex()).await.unwrap();
    assert_eq!(found, existing);

    let mut out = Download::new("", 0, "");
    store.find(&existing.id.to_hex(), &mut out).await.unwrap();
    assert_eq!(out, existing);

    assert!(matches!(store.get("zzz").await, Err(StoreError::InvalidIdentity(_))));
    assert!(matches!(
        store.get(&ObjectId::new().to_hex()).await,
        Err(StoreError::NotFound(_, collection)) if collection == "downloads"
    ));
}

#[tokio::test]
async fn update_and_delete_need_a_persisted_identity() {
    let store = seeded(1).await;
    let mut fresh = Download::new("x", 0, "queued");

    assert!(matches!(store.update(&mut fresh).await, Err(StoreError::InvalidIdentity(_))));
    assert!(matches!(store.delete(&fresh).await, Err(StoreError::InvalidIdentity(_))));

    let mut existing = store.query().first().await.unwrap().unwrap();
    existing.status = "done".into();
    store.update(&mut existing).await.unwrap();
    assert_eq!(store.get_by_id(&existing.id).await.unwrap().status, "done");

    store.delete(&existing).await.unwrap();
    assert_eq!(store.count(None).await.unwrap(), 0);
    assert!(matches!(store.delete(&existing).await, Err(StoreError::NotFound(_, _))));
}

#[tokio::test]
async fn create_with_transaction_assigns_identity() {
    let store = seeded(0).await;
    let mut download = Download::new("tx", 3, "queued");

    store.create_with_transaction(&mut download).await.unwrap();

    assert!(!is_zero_id(&download.id));
    assert!(download.created_at.is_some());
    assert_eq!(store.get_by_id(&download.id).await.unwrap().name, "tx");
}

#[tokio::test]
async fn derived_and_descriptor_indexes_agree() {
    let declared = Download::declared_indexes()
        .into_iter()
        .map(|f| (f.name, f.direction))
        .collect::<Vec<_>>();

    let described = parse_descriptor("name:1,age:-1")
        .unwrap()
        .into_iter()
        .flat_map(|spec| spec.keys)
        .map(|key| (key.field, key.direction))
        .collect::<Vec<_>>();

    assert_eq!(declared, described);
    assert_eq!(
        declared,
        vec![
            ("name".to_string(), IndexDirection::Ascending),
            ("age".to_string(), IndexDirection::Descending),
        ]
    );
}

#[tokio::test]
async fn derived_indexes_use_serde_renames() {
    let store = Store::<_, Episode>::new(MemoryBackend::new(), "episodes");
    store.create_declared_indexes().await.unwrap();
    store.create_declared_indexes().await.unwrap();

    assert_eq!(
        store.list_indexes().await.unwrap(),
        vec![
            IndexSpec::single("series_id", IndexDirection::Ascending),
            IndexSpec::single("release_date", IndexDirection::Descending),
        ]
    );
}

#[tokio::test]
async fn open_applies_config() {
    let config = StoreConfig::from_json_str(
        r#"{
            "uri": "memory://",
            "database": "media",
            "collection": "downloads",
            "default_limit": 3,
            "indexes": "status;name:1,age:desc"
        }"#,
    )
    .unwrap();

    let store = Store::<_, Download>::open(MemoryBackend::new(), &config).await.unwrap();
    for i in 0..5 {
        store.save(&mut Download::new(format!("d{i}"), i, "done")).await.unwrap();
    }

    assert_eq!(store.collection(), "downloads");
    assert_eq!(store.query().run().await.unwrap().len(), 3);
    assert_eq!(store.list_indexes().await.unwrap(), parse_descriptor("status;name:1,age:desc").unwrap());
}

#[tokio::test]
async fn open_rejects_bad_descriptor() {
    let config = StoreConfig::new("memory://", "media", "downloads").with_indexes("name,:1");

    assert!(matches!(
        Store::<_, Download>::open(MemoryBackend::new(), &config).await,
        Err(StoreError::InvalidField(_))
    ));
}

#[tokio::test]
async fn builder_is_reusable_after_extension() {
    let store = seeded(10).await;

    let query = store.query().eq("status", "done").limit(0);
    assert_eq!(query.run().await.unwrap().len(), 5);

    let query = query.gt("age", 4);
    assert_eq!(names(&query.asc("age").run().await.unwrap()), vec!["d06", "d08"]);
}

#[tokio::test]
async fn shutdown_consumes_the_store() {
    let store = seeded(1).await;
    store.shutdown().await.unwrap();
}
