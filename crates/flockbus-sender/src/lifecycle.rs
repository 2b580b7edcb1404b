//! Cached sender with lazy construction and explicit invalidation.

use flockbus_core::TransportResult;

use crate::sender::OffsetSender;
use crate::transport::Link;

/// Holds at most one [`OffsetSender`] and rebuilds it on demand.
///
/// While a sender is cached, [`get_sender`](Self::get_sender) returns it
/// without looking at the link. When the cache is empty the link must report
/// connected before a new port is opened. A failed open leaves the cache
/// empty, so the next connected call tries again.
#[derive(Debug)]
pub struct SenderSlot<P> {
    cached: Option<OffsetSender<P>>,
    constructed: u64,
}

impl<P> Default for SenderSlot<P> {
    fn default() -> Self {
        Self {
            cached: None,
            constructed: 0,
        }
    }
}

impl<P> SenderSlot<P> {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached sender, building one if the link allows it.
    ///
    /// - `Ok(Some(_))`: a usable sender
    /// - `Ok(None)`: nothing cached and the link is disconnected
    /// - `Err(_)`: the link reported connected but opening a port failed
    pub fn get_sender<L>(&mut self, link: &L) -> TransportResult<Option<&mut OffsetSender<P>>>
    where
        L: Link<Port = P>,
        P: crate::transport::DatagramPort,
    {
        if self.cached.is_some() {
            return Ok(self.cached.as_mut());
        }
        if !link.state().is_connected() {
            return Ok(None);
        }
        let port = link.open()?;
        self.constructed += 1;
        log::info!("constructed offset sender #{}", self.constructed);
        Ok(Some(self.cached.insert(OffsetSender::new(port))))
    }

    /// Drop the cached sender. The next acquisition builds a fresh one.
    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            log::info!("offset sender invalidated");
        }
    }

    /// Whether a sender is currently cached.
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Senders built over the slot's lifetime.
    pub fn constructed(&self) -> u64 {
        self.constructed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LoopbackLink, LoopbackPort};
    use flockbus_core::TransportError;

    #[test]
    fn test_disconnected_link_yields_none() {
        let link = LoopbackLink::new();
        link.set_connected(false);
        let mut slot = SenderSlot::<LoopbackPort>::new();

        assert!(slot.get_sender(&link).unwrap().is_none());
        assert!(!slot.is_cached());
        assert_eq!(link.opened(), 0);
    }

    #[test]
    fn test_sender_is_cached_until_invalidated() {
        let link = LoopbackLink::new();
        let mut slot = SenderSlot::new();

        assert!(slot.get_sender(&link).unwrap().is_some());
        assert!(slot.get_sender(&link).unwrap().is_some());
        assert_eq!(slot.constructed(), 1);

        slot.invalidate();
        assert!(!slot.is_cached());
        assert!(slot.get_sender(&link).unwrap().is_some());
        assert_eq!(slot.constructed(), 2);
        assert_eq!(link.opened(), 2);
    }

    #[test]
    fn test_cached_sender_survives_disconnect() {
        let link = LoopbackLink::new();
        let mut slot = SenderSlot::new();
        slot.get_sender(&link).unwrap();

        link.set_connected(false);
        assert!(slot.get_sender(&link).unwrap().is_some());
    }

    #[test]
    fn test_failed_construction_leaves_cache_empty() {
        let link = LoopbackLink::new();
        let mut slot = SenderSlot::new();

        link.fail_next_open();
        assert!(slot.get_sender(&link).is_err());
        assert!(!slot.is_cached());

        assert!(slot.get_sender(&link).unwrap().is_some());
        assert_eq!(slot.constructed(), 1);
    }

    #[test]
    fn test_disconnect_between_check_and_open_propagates() {
        let link = LoopbackLink::new();
        let mut slot = SenderSlot::new();

        link.disconnect_on_next_open();
        assert!(matches!(
            slot.get_sender(&link),
            Err(TransportError::NotConnected)
        ));
        assert!(!slot.is_cached());
    }
}
