//! Duplicate-hash registration: identical bytes register once; the
//! second call returns the existing identifier, writes no new object,
//! and leaves exactly one primary per hash.

mod common;

use common::{harness, raw_document};
use fdd_core::DocumentType;
use fdd_pipeline::Registered;
use fdd_store::MetadataStore;

#[tokio::test]
async fn identical_bytes_register_once() {
    let h = harness();
    let raw = raw_document("Acme Burgers, LLC", DocumentType::Initial, (2023, 1, 15));

    let first = h.pipeline.register_document(&raw).await.unwrap();
    let Registered::New(primary_id) = first else {
        panic!("first registration must be new, got {first:?}");
    };
    let objects_after_first = h.objects.object_count();

    let second = h.pipeline.register_document(&raw).await.unwrap();
    assert_eq!(
        second,
        Registered::Duplicate {
            existing: primary_id
        }
    );

    // No new object-store write for the duplicate.
    assert_eq!(h.objects.object_count(), objects_after_first);

    // Exactly one primary carries the hash; the duplicate points at it.
    let primary = h.store.get_fdd(primary_id).await.unwrap().unwrap();
    assert!(primary.duplicate_of.is_none());
    let all = h
        .store
        .list_fdds_for_franchisor(primary.franchisor_id)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    let duplicates: Vec<_> = all.iter().filter(|f| f.duplicate_of.is_some()).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].duplicate_of, Some(primary_id));
    // Lineage pointers are exclusive.
    assert!(duplicates[0].superseded_by.is_none());
}

#[tokio::test]
async fn concurrent_identical_registrations_linearize() {
    let h = std::sync::Arc::new(harness());
    let raw = raw_document("Zenith Plumbing Co.", DocumentType::Initial, (2023, 3, 1));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let h = h.clone();
        let raw = raw.clone();
        handles.push(tokio::spawn(async move {
            h.pipeline.register_document(&raw).await.unwrap()
        }));
    }

    let mut new_count = 0;
    let mut duplicate_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Registered::New(_) => new_count += 1,
            Registered::Duplicate { .. } => duplicate_count += 1,
        }
    }
    assert_eq!(new_count, 1, "exactly one primary");
    assert_eq!(duplicate_count, 5);
}
