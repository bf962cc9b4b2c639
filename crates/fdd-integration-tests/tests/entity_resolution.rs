//! Entity resolution through registration: exact canonical matches,
//! and the review band creating a tentative franchisor with a
//! persisted review record.

mod common;

use common::{harness, harness_with, raw_document, well_formed_answers};
use fdd_core::{DocumentType, ReviewReason};
use fdd_pipeline::{CancelToken, Registered};
use fdd_store::MetadataStore;

#[tokio::test]
async fn punctuation_variants_match_exactly() {
    let h = harness();

    let first = raw_document("Acme Burgers, LLC", DocumentType::Initial, (2023, 1, 15));
    let Registered::New(first_id) = h.pipeline.register_document(&first).await.unwrap() else {
        panic!("first must be new");
    };
    let first_fdd = h.store.get_fdd(first_id).await.unwrap().unwrap();

    // Same name without punctuation normalizes identically.
    let mut variant = raw_document("ACME BURGERS LLC", DocumentType::Renewal, (2024, 1, 15));
    variant.bytes.extend_from_slice(b"\n% 2024 renewal\n");
    let Registered::New(second_id) = h.pipeline.register_document(&variant).await.unwrap()
    else {
        panic!("variant must be new (different bytes)");
    };
    let second_fdd = h.store.get_fdd(second_id).await.unwrap().unwrap();

    assert_eq!(first_fdd.franchisor_id, second_fdd.franchisor_id);
    let franchisor = h
        .store
        .get_franchisor(first_fdd.franchisor_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(franchisor.canonical_name, "Acme Burgers");
    assert!(!franchisor.tentative);
    // The observed raw rendering is kept as an alternate name.
    assert!(franchisor
        .alternate_names
        .iter()
        .any(|n| n == "ACME BURGERS LLC"));
}

#[tokio::test]
async fn review_band_creates_tentative_franchisor_with_candidates() {
    // Thresholds squeezed so the trigram mock embedder lands a close
    // misspelling inside the review band.
    let h = harness_with(well_formed_answers, CancelToken::never(), |config| {
        config.similarity.high_threshold = 0.995;
        config.similarity.review_threshold = 0.50;
    });

    let first = raw_document("Acme Burgers, LLC", DocumentType::Initial, (2023, 1, 15));
    let Registered::New(first_id) = h.pipeline.register_document(&first).await.unwrap() else {
        panic!("first must be new");
    };
    let original = h.store.get_fdd(first_id).await.unwrap().unwrap();

    let mut misspelled = raw_document("Akme Burgers LLC", DocumentType::Initial, (2023, 5, 1));
    misspelled.bytes.extend_from_slice(b"\n% other filer\n");
    let Registered::New(second_id) = h.pipeline.register_document(&misspelled).await.unwrap()
    else {
        panic!("review-band candidate must still register");
    };
    let tentative_fdd = h.store.get_fdd(second_id).await.unwrap().unwrap();

    // A distinct, tentative franchisor was created.
    assert_ne!(tentative_fdd.franchisor_id, original.franchisor_id);
    let tentative = h
        .store
        .get_franchisor(tentative_fdd.franchisor_id)
        .await
        .unwrap()
        .unwrap();
    assert!(tentative.tentative);

    // The review record links the candidates.
    let reviews = h.store.list_reviews(second_id).await.unwrap();
    let entity_reviews: Vec<_> = reviews
        .iter()
        .filter(|r| r.reason == ReviewReason::EntityMatch)
        .collect();
    assert_eq!(entity_reviews.len(), 1);
    assert!(entity_reviews[0]
        .candidates
        .iter()
        .any(|(id, _)| *id == original.franchisor_id));
    assert!(!entity_reviews[0].resolved);
}
