//! Amendment supersession: a later amendment for the same franchisor
//! supersedes the current filing, and the lineage walk resolves the
//! newest record.

mod common;

use common::{harness, raw_document};
use fdd_core::DocumentType;
use fdd_pipeline::Registered;
use fdd_resolve::latest_of;
use fdd_store::MetadataStore;

#[tokio::test]
async fn amendment_supersedes_initial() {
    let h = harness();

    let initial = raw_document("Acme Burgers, LLC", DocumentType::Initial, (2023, 1, 15));
    let Registered::New(initial_id) = h.pipeline.register_document(&initial).await.unwrap()
    else {
        panic!("initial must register as new");
    };

    let mut amendment = raw_document("Acme Burgers, LLC", DocumentType::Amendment, (2023, 1, 15));
    amendment.amendment_date = chrono::NaiveDate::from_ymd_opt(2024, 2, 1);
    // Different bytes so the hash differs.
    amendment.bytes.extend_from_slice(b"\n% amended\n");
    let Registered::New(amendment_id) = h.pipeline.register_document(&amendment).await.unwrap()
    else {
        panic!("amendment must register as new");
    };

    let old = h.store.get_fdd(initial_id).await.unwrap().unwrap();
    assert_eq!(old.superseded_by, Some(amendment_id));
    assert!(old.duplicate_of.is_none());

    let new = h.store.get_fdd(amendment_id).await.unwrap().unwrap();
    assert!(new.superseded_by.is_none());

    // Both filings resolve to the amendment as the latest.
    let all = h
        .store
        .list_fdds_for_franchisor(new.franchisor_id)
        .await
        .unwrap();
    let chain: std::collections::BTreeMap<_, _> = all
        .iter()
        .filter_map(|f| f.superseded_by.map(|newer| (f.id, newer)))
        .collect();
    assert_eq!(
        latest_of(initial_id, |id| chain.get(&id).copied()).unwrap(),
        amendment_id
    );
    assert_eq!(
        latest_of(amendment_id, |id| chain.get(&id).copied()).unwrap(),
        amendment_id
    );
}

#[tokio::test]
async fn later_renewal_supersedes_only_older_filings() {
    let h = harness();

    let first = raw_document("Zenith Plumbing Co.", DocumentType::Initial, (2022, 6, 1));
    let Registered::New(first_id) = h.pipeline.register_document(&first).await.unwrap() else {
        panic!("first must be new");
    };

    let mut renewal = raw_document("Zenith Plumbing Co.", DocumentType::Renewal, (2023, 6, 1));
    renewal.bytes.extend_from_slice(b"\n% renewal\n");
    let Registered::New(renewal_id) = h.pipeline.register_document(&renewal).await.unwrap()
    else {
        panic!("renewal must be new");
    };

    // A same-day filing does not supersede the renewal.
    let mut same_day = raw_document("Zenith Plumbing Co.", DocumentType::Initial, (2023, 6, 1));
    same_day.bytes.extend_from_slice(b"\n% refile\n");
    let Registered::New(same_day_id) = h.pipeline.register_document(&same_day).await.unwrap()
    else {
        panic!("same-day filing must be new");
    };

    let first = h.store.get_fdd(first_id).await.unwrap().unwrap();
    assert_eq!(first.superseded_by, Some(renewal_id));
    let renewal = h.store.get_fdd(renewal_id).await.unwrap().unwrap();
    assert!(renewal.superseded_by.is_none());
    let same_day = h.store.get_fdd(same_day_id).await.unwrap().unwrap();
    assert!(same_day.superseded_by.is_none());
}
