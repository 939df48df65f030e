//! Ownership registry: which temporary channel belongs to whom
//!
//! Invariant: at most one live temporary channel per owner. Creation goes
//! through [`OwnershipRegistry::reserve`], which claims the owner before the
//! platform channel exists so that two concurrent creation attempts for the
//! same user cannot both pass the check.

use super::errors::RegistryError;
use super::types::{ChannelId, TempChannelRecord, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct RegistryState {
    /// channel -> owner
    channels: HashMap<ChannelId, UserId>,
    /// owner -> channel
    owners: HashMap<UserId, ChannelId>,
    /// owners with a creation in flight
    reserved: HashSet<UserId>,
}

/// Concurrency-safe channel → owner map
#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    state: Mutex<RegistryState>,
}

impl OwnershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // No invariant spans a panic point, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a record without overwriting an existing one
    pub fn register(&self, channel_id: ChannelId, owner_id: UserId) -> Result<(), RegistryError> {
        let mut state = self.lock();
        Self::insert(&mut state, channel_id, owner_id)
    }

    fn insert(
        state: &mut RegistryState,
        channel_id: ChannelId,
        owner_id: UserId,
    ) -> Result<(), RegistryError> {
        if state.owners.contains_key(&owner_id) {
            return Err(RegistryError::OwnerAlreadyRegistered(owner_id));
        }
        if state.channels.contains_key(&channel_id) {
            return Err(RegistryError::ChannelAlreadyRegistered(channel_id));
        }

        state.channels.insert(channel_id, owner_id);
        state.owners.insert(owner_id, channel_id);
        debug!(channel_id = %channel_id, owner_id = %owner_id, "Registered temporary channel");
        Ok(())
    }

    /// True iff `owner_id` owns a live temporary channel
    pub fn owner_has_channel(&self, owner_id: &UserId) -> bool {
        self.lock().owners.contains_key(owner_id)
    }

    pub fn owner_of(&self, channel_id: &ChannelId) -> Option<UserId> {
        self.lock().channels.get(channel_id).copied()
    }

    pub fn channel_of(&self, owner_id: &UserId) -> Option<ChannelId> {
        self.lock().owners.get(owner_id).copied()
    }

    pub fn is_temporary(&self, channel_id: &ChannelId) -> bool {
        self.lock().channels.contains_key(channel_id)
    }

    /// Remove the record for `channel_id`; a missing record is not an error
    pub fn remove(&self, channel_id: &ChannelId) -> Option<UserId> {
        let mut state = self.lock();
        let owner = state.channels.remove(channel_id)?;
        state.owners.remove(&owner);
        debug!(channel_id = %channel_id, owner_id = %owner, "Removed temporary channel record");
        Some(owner)
    }

    /// Claim `owner_id` for a channel creation
    ///
    /// Fails if the owner already has a channel or another creation for
    /// them is in flight. The claim is released when the returned
    /// reservation is dropped without being committed.
    pub fn reserve(self: &Arc<Self>, owner_id: UserId) -> Result<OwnerReservation, RegistryError> {
        let mut state = self.lock();
        if state.owners.contains_key(&owner_id) {
            return Err(RegistryError::OwnerAlreadyRegistered(owner_id));
        }
        if !state.reserved.insert(owner_id) {
            return Err(RegistryError::CreationInFlight(owner_id));
        }

        Ok(OwnerReservation {
            registry: Arc::clone(self),
            owner_id,
            active: true,
        })
    }

    pub fn records(&self) -> Vec<TempChannelRecord> {
        let state = self.lock();
        let mut records: Vec<_> = state
            .channels
            .iter()
            .map(|(channel_id, owner_id)| TempChannelRecord {
                channel_id: *channel_id,
                owner_id: *owner_id,
            })
            .collect();
        records.sort_by_key(|r| r.channel_id);
        records
    }

    pub fn len(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Claim on an owner slot held while their channel is being provisioned
#[derive(Debug)]
pub struct OwnerReservation {
    registry: Arc<OwnershipRegistry>,
    owner_id: UserId,
    active: bool,
}

impl OwnerReservation {
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Turn the reservation into a record for the provisioned channel
    pub fn commit(mut self, channel_id: ChannelId) -> Result<TempChannelRecord, RegistryError> {
        let mut state = self.registry.lock();
        state.reserved.remove(&self.owner_id);
        self.active = false;
        OwnershipRegistry::insert(&mut state, channel_id, self.owner_id)?;

        Ok(TempChannelRecord {
            channel_id,
            owner_id: self.owner_id,
        })
    }
}

impl Drop for OwnerReservation {
    fn drop(&mut self) {
        if self.active {
            self.registry.lock().reserved.remove(&self.owner_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(channel: u64, owner: u64) -> (ChannelId, UserId) {
        (ChannelId::new(channel), UserId::new(owner))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = OwnershipRegistry::new();
        let (channel, owner) = ids(10, 1);

        registry.register(channel, owner).unwrap();

        assert!(registry.owner_has_channel(&owner));
        assert_eq!(registry.owner_of(&channel), Some(owner));
        assert_eq!(registry.channel_of(&owner), Some(channel));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_never_overwrites() {
        let registry = OwnershipRegistry::new();
        registry.register(ChannelId::new(10), UserId::new(1)).unwrap();

        let result = registry.register(ChannelId::new(11), UserId::new(1));
        assert_eq!(
            result,
            Err(RegistryError::OwnerAlreadyRegistered(UserId::new(1)))
        );

        let result = registry.register(ChannelId::new(10), UserId::new(2));
        assert_eq!(
            result,
            Err(RegistryError::ChannelAlreadyRegistered(ChannelId::new(10)))
        );
        assert_eq!(registry.owner_of(&ChannelId::new(10)), Some(UserId::new(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = OwnershipRegistry::new();
        let (channel, owner) = ids(10, 1);
        registry.register(channel, owner).unwrap();

        assert_eq!(registry.remove(&channel), Some(owner));
        assert_eq!(registry.remove(&channel), None);
        assert!(!registry.owner_has_channel(&owner));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_owner_can_register_again_after_remove() {
        let registry = OwnershipRegistry::new();
        registry.register(ChannelId::new(10), UserId::new(1)).unwrap();
        registry.remove(&ChannelId::new(10));

        registry.register(ChannelId::new(11), UserId::new(1)).unwrap();
        assert_eq!(registry.channel_of(&UserId::new(1)), Some(ChannelId::new(11)));
    }

    #[test]
    fn test_reservation_blocks_second_claim() {
        let registry = Arc::new(OwnershipRegistry::new());
        let owner = UserId::new(1);

        let first = registry.reserve(owner).unwrap();
        let second = registry.reserve(owner);
        assert!(matches!(second, Err(RegistryError::CreationInFlight(_))));

        first.commit(ChannelId::new(10)).unwrap();
        let third = registry.reserve(owner);
        assert!(matches!(third, Err(RegistryError::OwnerAlreadyRegistered(_))));
    }

    #[test]
    fn test_dropped_reservation_releases_owner() {
        let registry = Arc::new(OwnershipRegistry::new());
        let owner = UserId::new(1);

        {
            let _reservation = registry.reserve(owner).unwrap();
        }

        let reservation = registry.reserve(owner).unwrap();
        let record = reservation.commit(ChannelId::new(10)).unwrap();
        assert_eq!(record.owner_id, owner);
        assert!(registry.owner_has_channel(&owner));
    }

    #[test]
    fn test_concurrent_reservations_single_winner() {
        let registry = Arc::new(OwnershipRegistry::new());
        let owner = UserId::new(7);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .reserve(owner)
                        .and_then(|r| r.commit(ChannelId::new(100 + i)))
                        .is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_records_sorted() {
        let registry = OwnershipRegistry::new();
        registry.register(ChannelId::new(30), UserId::new(3)).unwrap();
        registry.register(ChannelId::new(10), UserId::new(1)).unwrap();

        let records = registry.records();
        assert_eq!(records[0].channel_id, ChannelId::new(10));
        assert_eq!(records[1].owner_id, UserId::new(3));
    }
}
