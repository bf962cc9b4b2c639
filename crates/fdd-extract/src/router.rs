//! # Model Router
//!
//! Selects the ordered provider chain for an item. Configuration wins
//! when present; otherwise the built-in routing applies:
//!
//! - Items 5, 6, 7, 20 (simple tables) — local provider first, then
//!   the high-capacity chain.
//! - Items 19, 21 and everything else — high-capacity chain only.
//!
//! Escalation is positional: on a schema rejection the engine moves to
//! the next provider in the chain, which by construction is of equal or
//! higher capacity.

use std::collections::BTreeMap;
use std::sync::Arc;

use fdd_core::config::LlmConfig;
use fdd_core::ItemNo;
use thiserror::Error;

use crate::provider::{CapacityClass, LlmProvider};

/// Items routed local-first.
const TABLE_ITEMS: [u8; 4] = [5, 6, 7, 20];

/// Error building or querying the router.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Routing configuration referenced a provider that was not registered.
    #[error("llm.routing references unknown provider {0:?}")]
    UnknownProvider(String),

    /// No provider chain could be built for an item.
    #[error("no providers available for {0}")]
    EmptyChain(ItemNo),
}

/// Config-driven provider chains per item.
pub struct ModelRouter {
    providers: BTreeMap<String, Arc<dyn LlmProvider>>,
    routing: BTreeMap<u8, Vec<String>>,
}

impl ModelRouter {
    /// Build a router over the registered providers, validating that
    /// every configured chain references only known names.
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        config: &LlmConfig,
    ) -> Result<Self, RouterError> {
        let by_name: BTreeMap<String, Arc<dyn LlmProvider>> = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        for chain in config.routing.values() {
            for name in chain {
                if !by_name.contains_key(name) {
                    return Err(RouterError::UnknownProvider(name.clone()));
                }
            }
        }
        Ok(Self {
            providers: by_name,
            routing: config.routing.clone(),
        })
    }

    /// The ordered provider chain for an item.
    pub fn chain_for(&self, item_no: ItemNo) -> Result<Vec<Arc<dyn LlmProvider>>, RouterError> {
        if let Some(names) = self.routing.get(&item_no.as_u8()) {
            let chain = names
                .iter()
                .filter_map(|name| self.providers.get(name).cloned())
                .collect::<Vec<_>>();
            if chain.is_empty() {
                return Err(RouterError::EmptyChain(item_no));
            }
            return Ok(chain);
        }
        self.default_chain(item_no)
    }

    /// Built-in routing: local-first for table items, capacity order
    /// otherwise.
    fn default_chain(&self, item_no: ItemNo) -> Result<Vec<Arc<dyn LlmProvider>>, RouterError> {
        let mut local: Vec<Arc<dyn LlmProvider>> = Vec::new();
        let mut high: Vec<Arc<dyn LlmProvider>> = Vec::new();
        for provider in self.providers.values() {
            match provider.capacity_class() {
                CapacityClass::Local => local.push(provider.clone()),
                CapacityClass::HighCapacity => high.push(provider.clone()),
            }
        }
        let chain: Vec<Arc<dyn LlmProvider>> = if TABLE_ITEMS.contains(&item_no.as_u8()) {
            local.into_iter().chain(high).collect()
        } else {
            high
        };
        if chain.is_empty() {
            return Err(RouterError::EmptyChain(item_no));
        }
        Ok(chain)
    }
}
