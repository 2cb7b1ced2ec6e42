//! Instance role selection
//!
//! A board runs as one of two roles, and the role decides which static clock
//! tree and SPI rate profile are used during bring-up. The role is fixed
//! before any peripheral is configured. [`Port`] takes it as part of its
//! immutable [`Config`]; [`RoleSelector`] is there for firmware that reads the
//! role from a strap pin or flash at boot and wants to publish it once.
//!
//! [`Port`]: crate::Port
//! [`Config`]: crate::Config

use core::sync::atomic::{AtomicU8, Ordering};

use crate::{
    clocks::{ClockTree, INITIATOR_CLOCKS, RESPONDER_CLOCKS},
    error::ConfigurationFixed,
};


/// The role of this board instance
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Starts ranging exchanges (a tag)
    Initiator,

    /// Answers ranging exchanges (an anchor)
    Responder,
}

impl Default for Role {
    fn default() -> Self {
        Role::Initiator
    }
}

impl Role {
    /// The static clock tree table for this role
    pub fn clock_tree(self) -> &'static ClockTree {
        match self {
            Role::Initiator => &INITIATOR_CLOCKS,
            Role::Responder => &RESPONDER_CLOCKS,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Role::Initiator => ROLE_INITIATOR,
            Role::Responder => ROLE_RESPONDER,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            ROLE_INITIATOR => Some(Role::Initiator),
            ROLE_RESPONDER => Some(Role::Responder),
            _ => None,
        }
    }
}


const ROLE_UNSET: u8 = 0;
const ROLE_INITIATOR: u8 = 1;
const ROLE_RESPONDER: u8 = 2;


/// A role that can be written exactly once
///
/// Can be placed in a `static`. Writes are expected from the boot thread
/// before interrupts are enabled, so plain loads and stores suffice and the
/// type works on cores without compare-and-swap.
pub struct RoleSelector(AtomicU8);

impl RoleSelector {
    /// Create a selector with no role selected
    pub const fn new() -> Self {
        RoleSelector(AtomicU8::new(ROLE_UNSET))
    }

    /// Select the role
    ///
    /// Only the first call has an effect. Every later call returns
    /// [`ConfigurationFixed`] and leaves the stored role untouched, even if
    /// it asks for the same role again.
    pub fn select(&self, role: Role) -> Result<Role, ConfigurationFixed> {
        if let Some(current) = self.role() {
            log::warn!(
                "rejected role change to {:?}, role is fixed to {:?}",
                role,
                current,
            );
            return Err(ConfigurationFixed);
        }

        self.0.store(role.to_bits(), Ordering::Release);
        log::info!("instance role: {:?}", role);

        Ok(role)
    }

    /// The selected role, if any
    pub fn role(&self) -> Option<Role> {
        Role::from_bits(self.0.load(Ordering::Acquire))
    }
}

impl Default for RoleSelector {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_starts_unset() {
        let selector = RoleSelector::new();
        assert_eq!(selector.role(), None);
    }

    #[test]
    fn selector_accepts_first_selection() {
        let selector = RoleSelector::new();
        assert_eq!(selector.select(Role::Responder), Ok(Role::Responder));
        assert_eq!(selector.role(), Some(Role::Responder));
    }

    #[test]
    fn selector_rejects_change() {
        let selector = RoleSelector::new();
        selector.select(Role::Initiator).unwrap();

        assert_eq!(selector.select(Role::Responder), Err(ConfigurationFixed));
        assert_eq!(selector.role(), Some(Role::Initiator));
    }

    #[test]
    fn selector_rejects_repeated_selection() {
        let selector = RoleSelector::new();
        selector.select(Role::Responder).unwrap();

        assert_eq!(selector.select(Role::Responder), Err(ConfigurationFixed));
        assert_eq!(selector.role(), Some(Role::Responder));
    }

    #[test]
    fn selector_in_static() {
        static SELECTOR: RoleSelector = RoleSelector::new();

        SELECTOR.select(Role::Initiator).unwrap();
        assert_eq!(SELECTOR.role(), Some(Role::Initiator));
    }

    #[test]
    fn roles_pick_distinct_tables() {
        assert!(!core::ptr::eq(
            Role::Initiator.clock_tree(),
            Role::Responder.clock_tree(),
        ));
    }

    #[test]
    fn default_role_is_initiator() {
        assert_eq!(Role::default(), Role::Initiator);
    }
}
