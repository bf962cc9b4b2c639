//! # Directory Adapter
//!
//! Bridges the metadata store to the entity resolver's narrow
//! [`FranchisorDirectory`] surface, mapping uniqueness conflicts to the
//! race-aware `DuplicateName` outcome.

use async_trait::async_trait;
use fdd_core::{Franchisor, FranchisorId};
use fdd_resolve::{DirectoryError, FranchisorDirectory, FranchisorMatch};

use crate::error::MetaError;
use crate::traits::MetadataStore;

/// Adapter exposing a [`MetadataStore`] as a [`FranchisorDirectory`].
pub struct DirectoryAdapter<'a, S: MetadataStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MetadataStore + ?Sized> DirectoryAdapter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

fn map_err(e: MetaError) -> DirectoryError {
    DirectoryError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl<'a, S: MetadataStore + ?Sized> FranchisorDirectory for DirectoryAdapter<'a, S> {
    async fn find_by_canonical_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<FranchisorId>, DirectoryError> {
        self.store
            .find_franchisor_by_name(canonical_name)
            .await
            .map_err(map_err)
    }

    async fn top_k_similar(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<FranchisorMatch>, DirectoryError> {
        self.store
            .top_k_franchisors(embedding, k)
            .await
            .map_err(map_err)
    }

    async fn create_franchisor(
        &self,
        franchisor: Franchisor,
    ) -> Result<FranchisorId, DirectoryError> {
        let id = franchisor.id;
        let canonical_name = franchisor.canonical_name.clone();
        match self.store.insert_franchisor(&franchisor).await {
            Ok(()) => Ok(id),
            Err(MetaError::Conflict(_)) => {
                // Lost a creation race: surface the winner for linking.
                match self
                    .store
                    .find_franchisor_by_name(&canonical_name)
                    .await
                    .map_err(map_err)?
                {
                    Some(existing) => Err(DirectoryError::DuplicateName { existing }),
                    None => Err(DirectoryError::StoreUnavailable(
                        "conflict without a visible winner".into(),
                    )),
                }
            }
            Err(e) => Err(map_err(e)),
        }
    }

    async fn add_alternate_name(
        &self,
        id: FranchisorId,
        alternate: &str,
    ) -> Result<(), DirectoryError> {
        self.store
            .add_alternate_name(id, alternate)
            .await
            .map_err(map_err)
    }
}
