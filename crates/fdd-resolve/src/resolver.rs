//! # Entity Resolver
//!
//! Resolution over a [`FranchisorDirectory`] and an embedding provider:
//! normalize, exact match, vector match with thresholds, create. Ties
//! at equal similarity break toward the older entity.

use fdd_core::config::SimilarityConfig;
use fdd_core::{Franchisor, FranchisorId, MatchKind};
use fdd_embed::{EmbedError, EmbeddingProvider};
use thiserror::Error;

use crate::directory::{DirectoryError, FranchisorDirectory, FranchisorMatch};
use crate::normalize::normalize_name;

/// Candidates fetched per vector query.
const TOP_K: usize = 5;

/// Error from entity resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The embedding provider is down; transient.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbedError),

    /// The franchisor store is down; transient.
    #[error(transparent)]
    Store(DirectoryError),
}

impl ResolveError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::EmbeddingUnavailable(e) => e.is_transient(),
            Self::Store(DirectoryError::StoreUnavailable(_)) => true,
            Self::Store(DirectoryError::DuplicateName { .. }) => false,
        }
    }
}

/// Outcome of resolving a candidate name.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub franchisor_id: FranchisorId,
    pub match_kind: MatchKind,
    /// Candidate matches, populated for `NeedsReview` outcomes so the
    /// registration stage can persist a review record.
    pub candidates: Vec<(FranchisorId, f32)>,
}

/// Contact fields captured from the filing cover pages.
#[derive(Debug, Clone, Default)]
pub struct ContactFields {
    pub parent_company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Entity resolver over a directory and embedding provider.
pub struct EntityResolver<'a> {
    directory: &'a dyn FranchisorDirectory,
    embedder: &'a dyn EmbeddingProvider,
    thresholds: SimilarityConfig,
}

impl<'a> EntityResolver<'a> {
    pub fn new(
        directory: &'a dyn FranchisorDirectory,
        embedder: &'a dyn EmbeddingProvider,
        thresholds: SimilarityConfig,
    ) -> Self {
        Self {
            directory,
            embedder,
            thresholds,
        }
    }

    /// Resolve a candidate name to a franchisor.
    pub async fn resolve(
        &self,
        raw_name: &str,
        contacts: &ContactFields,
    ) -> Result<Resolution, ResolveError> {
        let canonical = normalize_name(raw_name);

        if let Some(id) = self
            .directory
            .find_by_canonical_name(&canonical)
            .await
            .map_err(ResolveError::Store)?
        {
            tracing::debug!(%id, name = %canonical, "exact canonical-name match");
            if raw_name != canonical {
                self.directory
                    .add_alternate_name(id, raw_name)
                    .await
                    .map_err(ResolveError::Store)?;
            }
            return Ok(Resolution {
                franchisor_id: id,
                match_kind: MatchKind::Exact,
                candidates: Vec::new(),
            });
        }

        let embedding = self.embedder.embed(&canonical).await?;
        let mut matches = self
            .directory
            .top_k_similar(&embedding, TOP_K)
            .await
            .map_err(ResolveError::Store)?;
        // Equal similarity breaks toward the older entity.
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.created_at.cmp(&b.created_at))
        });

        let top_similarity = matches.first().map(|m| m.similarity).unwrap_or(0.0);

        if top_similarity >= self.thresholds.high_threshold {
            let top = &matches[0];
            tracing::info!(
                id = %top.id,
                name = %canonical,
                similarity = top_similarity,
                "high-confidence entity match"
            );
            self.directory
                .add_alternate_name(top.id, raw_name)
                .await
                .map_err(ResolveError::Store)?;
            return Ok(Resolution {
                franchisor_id: top.id,
                match_kind: MatchKind::HighConfidence,
                candidates: Vec::new(),
            });
        }

        let needs_review = top_similarity >= self.thresholds.review_threshold;
        let id = self
            .create(&canonical, embedding, contacts, needs_review)
            .await?;

        if needs_review {
            tracing::info!(
                %id,
                name = %canonical,
                similarity = top_similarity,
                "review-band match: tentative franchisor created"
            );
            Ok(Resolution {
                franchisor_id: id,
                match_kind: MatchKind::NeedsReview,
                candidates: matches.iter().map(|m| (m.id, m.similarity)).collect(),
            })
        } else {
            tracing::info!(%id, name = %canonical, "new franchisor created");
            Ok(Resolution {
                franchisor_id: id,
                match_kind: MatchKind::Created,
                candidates: Vec::new(),
            })
        }
    }

    async fn create(
        &self,
        canonical: &str,
        embedding: Vec<f32>,
        contacts: &ContactFields,
        tentative: bool,
    ) -> Result<FranchisorId, ResolveError> {
        let mut franchisor = Franchisor::new(canonical.to_string(), embedding);
        franchisor.parent_company = contacts.parent_company.clone();
        franchisor.contact_email = contacts.email.clone();
        franchisor.contact_phone = contacts.phone.clone();
        franchisor.tentative = tentative;

        match self.directory.create_franchisor(franchisor).await {
            Ok(id) => Ok(id),
            // Lost a creation race: link to the winner.
            Err(DirectoryError::DuplicateName { existing }) => Ok(existing),
            Err(e) => Err(ResolveError::Store(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use fdd_embed::mock::HashEmbedder;
    use fdd_embed::vector::cosine_similarity;
    use parking_lot::Mutex;

    /// Minimal in-memory directory for resolver tests.
    #[derive(Default)]
    struct TestDirectory {
        rows: Mutex<Vec<Franchisor>>,
    }

    impl TestDirectory {
        fn with(names: &[&str]) -> Self {
            let embedder = HashEmbedder::new();
            let dir = Self::default();
            let mut rows = Vec::new();
            for (i, name) in names.iter().enumerate() {
                let canonical = normalize_name(name);
                let mut f = Franchisor::new(canonical.clone(), embedder.embed_sync(&canonical));
                // Distinct ages for tie-break tests.
                f.created_at = Utc::now() - Duration::days((names.len() - i) as i64);
                rows.push(f);
            }
            *dir.rows.lock() = rows;
            dir
        }
    }

    #[async_trait]
    impl FranchisorDirectory for TestDirectory {
        async fn find_by_canonical_name(
            &self,
            canonical_name: &str,
        ) -> Result<Option<FranchisorId>, DirectoryError> {
            Ok(self
                .rows
                .lock()
                .iter()
                .find(|f| f.canonical_name == canonical_name)
                .map(|f| f.id))
        }

        async fn top_k_similar(
            &self,
            embedding: &[f32],
            k: usize,
        ) -> Result<Vec<FranchisorMatch>, DirectoryError> {
            let mut matches: Vec<FranchisorMatch> = self
                .rows
                .lock()
                .iter()
                .map(|f| FranchisorMatch {
                    id: f.id,
                    canonical_name: f.canonical_name.clone(),
                    similarity: cosine_similarity(embedding, &f.name_embedding),
                    created_at: f.created_at,
                })
                .collect();
            matches.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            matches.truncate(k);
            Ok(matches)
        }

        async fn create_franchisor(
            &self,
            franchisor: Franchisor,
        ) -> Result<FranchisorId, DirectoryError> {
            let mut rows = self.rows.lock();
            if let Some(existing) = rows
                .iter()
                .find(|f| f.canonical_name == franchisor.canonical_name)
            {
                return Err(DirectoryError::DuplicateName { existing: existing.id });
            }
            let id = franchisor.id;
            rows.push(franchisor);
            Ok(id)
        }

        async fn add_alternate_name(
            &self,
            id: FranchisorId,
            alternate: &str,
        ) -> Result<(), DirectoryError> {
            let mut rows = self.rows.lock();
            if let Some(f) = rows.iter_mut().find(|f| f.id == id) {
                if !f.alternate_names.iter().any(|n| n == alternate) {
                    f.alternate_names.push(alternate.to_string());
                }
            }
            Ok(())
        }
    }

    fn resolver<'a>(
        dir: &'a TestDirectory,
        embedder: &'a HashEmbedder,
    ) -> EntityResolver<'a> {
        EntityResolver::new(dir, embedder, SimilarityConfig::default())
    }

    #[tokio::test]
    async fn exact_match_after_normalization() {
        let dir = TestDirectory::with(&["Acme Burgers, LLC"]);
        let embedder = HashEmbedder::new();
        let resolution = resolver(&dir, &embedder)
            .resolve("Acme Burgers LLC", &ContactFields::default())
            .await
            .unwrap();
        assert_eq!(resolution.match_kind, MatchKind::Exact);
        // The raw rendering is recorded as an alternate name.
        let rows = dir.rows.lock();
        assert!(rows[0]
            .alternate_names
            .contains(&"Acme Burgers LLC".to_string()));
    }

    #[tokio::test]
    async fn unrelated_name_creates_new_entity() {
        let dir = TestDirectory::with(&["Acme Burgers, LLC"]);
        let embedder = HashEmbedder::new();
        let resolution = resolver(&dir, &embedder)
            .resolve("Zenith Plumbing Supply Corp", &ContactFields::default())
            .await
            .unwrap();
        assert_eq!(resolution.match_kind, MatchKind::Created);
        assert_eq!(dir.rows.lock().len(), 2);
        assert!(!dir.rows.lock()[1].tentative);
    }

    #[tokio::test]
    async fn review_band_creates_tentative_with_candidates() {
        let dir = TestDirectory::with(&["Acme Burgers, LLC"]);
        let embedder = HashEmbedder::new();
        // Thresholds squeezed so the trigram mock lands in the band.
        let resolver = EntityResolver::new(
            &dir,
            &embedder,
            SimilarityConfig {
                high_threshold: 0.995,
                review_threshold: 0.50,
            },
        );
        let resolution = resolver
            .resolve("Akme Burgers LLC", &ContactFields::default())
            .await
            .unwrap();
        assert_eq!(resolution.match_kind, MatchKind::NeedsReview);
        assert!(!resolution.candidates.is_empty());
        let rows = dir.rows.lock();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].tentative);
    }

    #[tokio::test]
    async fn high_confidence_links_without_creating() {
        let dir = TestDirectory::with(&["Acme Burgers, LLC"]);
        let embedder = HashEmbedder::new();
        let resolver = EntityResolver::new(
            &dir,
            &embedder,
            SimilarityConfig {
                high_threshold: 0.50,
                review_threshold: 0.30,
            },
        );
        let existing = dir.rows.lock()[0].id;
        let resolution = resolver
            .resolve("Akme Burgers LLC", &ContactFields::default())
            .await
            .unwrap();
        assert_eq!(resolution.match_kind, MatchKind::HighConfidence);
        assert_eq!(resolution.franchisor_id, existing);
        assert_eq!(dir.rows.lock().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_canonical_name_reports_winner() {
        let dir = TestDirectory::with(&["Zenith Plumbing"]);
        let embedder = HashEmbedder::new();
        let existing = dir.rows.lock()[0].id;
        let result = dir
            .create_franchisor(Franchisor::new(
                "Zenith Plumbing".to_string(),
                embedder.embed_sync("Zenith Plumbing"),
            ))
            .await;
        match result {
            Err(DirectoryError::DuplicateName { existing: id }) => assert_eq!(id, existing),
            other => panic!("expected DuplicateName, got {other:?}"),
        }
    }
}
