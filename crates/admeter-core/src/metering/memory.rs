//! In-process metering backend
//!
//! Dedup sets and accumulators live in [`DashMap`]s; each set insert and
//! each accumulator add runs under the owning shard's write lock, which makes
//! them the atomic check-and-insert / increment the store needs.

use super::{MeterBackend, MeterKey};
use crate::error::StoreError;
use crate::money::Money;
use crate::types::ClientId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

/// Memory-backed counter store
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sets: DashMap<MeterKey, HashSet<ClientId>>,
    spend: DashMap<MeterKey, Money>,
}

impl MemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MeterBackend for MemoryBackend {
    async fn set_insert(&self, key: MeterKey, client: ClientId) -> Result<bool, StoreError> {
        Ok(self.sets.entry(key).or_default().insert(client))
    }

    async fn set_contains(&self, key: MeterKey, client: ClientId) -> Result<bool, StoreError> {
        Ok(self
            .sets
            .get(&key)
            .is_some_and(|set| set.contains(&client)))
    }

    async fn set_len(&self, key: MeterKey) -> Result<u64, StoreError> {
        Ok(self.sets.get(&key).map_or(0, |set| set.len() as u64))
    }

    async fn spend_add(&self, key: MeterKey, amount: Money) -> Result<Money, StoreError> {
        let mut total = self.spend.entry(key).or_default();
        *total = total.checked_add(amount).ok_or(StoreError::Overflow)?;
        Ok(*total)
    }

    async fn spend_get(&self, key: MeterKey) -> Result<Money, StoreError> {
        Ok(self.spend.get(&key).map_or(Money::ZERO, |v| *v))
    }
}
