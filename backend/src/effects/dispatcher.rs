//! At-most-once dispatch of side effects per event identity.
//!
//! For each category the dispatcher compares the report's identity with
//! the persisted last-handled marker. The comparison, the in-process claim
//! and the marker write all happen under one lock, and only then is the
//! effect spawned, so two back-to-back deliveries of the same identity can
//! never both fire. The in-process claim also covers a marker write that
//! failed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{EffectCategory, SideEffect};
use crate::error::ErrorContext;
use crate::models::{EventIdentity, QuakeReport};
use crate::storage::KeyValueStore;

pub struct SideEffectDispatcher {
    store: Arc<dyn KeyValueStore>,
    effects: Vec<Arc<dyn SideEffect>>,
    claimed: Mutex<HashMap<EffectCategory, EventIdentity>>,
}

impl SideEffectDispatcher {
    pub fn new(store: Arc<dyn KeyValueStore>, effects: Vec<Arc<dyn SideEffect>>) -> Self {
        Self {
            store,
            effects,
            claimed: Mutex::new(HashMap::new()),
        }
    }

    pub fn categories(&self) -> Vec<EffectCategory> {
        self.effects.iter().map(|e| e.category()).collect()
    }

    /// Current marker of `category`, if any.
    pub fn marker(&self, category: EffectCategory) -> Option<String> {
        match self.store.get(category.marker_key()) {
            Ok(marker) => marker,
            Err(e) => {
                log::warn!("Failed to read marker {}: {}", category.marker_key(), e);
                None
            }
        }
    }

    /// Fire every effect whose marker differs from the report's identity.
    /// Returns the categories that fired.
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe(&self, report: &QuakeReport) -> Vec<EffectCategory> {
        let identity = report.identity();
        let mut fired = Vec::new();

        for effect in &self.effects {
            let category = effect.category();
            if !self.claim(category, &identity) {
                log::debug!("{:?} already handled for {}", category, identity);
                continue;
            }

            fired.push(category);
            log::info!("Firing {:?} for {}", category, identity);

            let effect = Arc::clone(effect);
            let report = report.clone();
            tokio::spawn(async move {
                if let Err(e) = effect.fire(&report).await {
                    let context = ErrorContext::new("fire_side_effect")
                        .with_entity(format!("{:?}", category))
                        .with_entity_id(report.identity());
                    log::error!("Side effect failed: {} {}", e, context);
                }
            });
        }

        fired
    }

    /// Compare-and-set of the marker for one category.
    fn claim(&self, category: EffectCategory, identity: &EventIdentity) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.get(&category) == Some(identity) {
            return false;
        }
        if self.marker(category).as_deref() == Some(identity.as_str()) {
            claimed.insert(category, identity.clone());
            return false;
        }

        claimed.insert(category, identity.clone());
        if let Err(e) = self.store.set(category.marker_key(), identity.as_str()) {
            log::warn!(
                "Failed to persist marker {} = {}: {}",
                category.marker_key(),
                identity,
                e
            );
        }
        true
    }
}
