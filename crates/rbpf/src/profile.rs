//! Physical Profiles
//!
//! Build-time selection of the resource envelope a VM may assume. The same
//! source serves a microcontroller with a few kilobytes of RAM and a host
//! process running scripts for testing; only the constants differ.
//!
//! | Property | Embedded | Host |
//! |----------|----------|------|
//! | VM stack | 512 B | 4 KB |
//! | Branch budget | 200 | 100,000 |
//! | Store pool nodes | 64 | 4096 |
//! | Extra regions per VM | 4 | 16 |
//! | Hooks per trigger | 8 | 32 |
//!
//! # Example
//!
//! ```rust,ignore
//! use rbpf::profile::{ActiveProfile, PhysicalProfile};
//!
//! let stack = ActiveProfile::STACK_SIZE;
//! ```

mod sealed {
    pub trait Sealed {}
}

/// Marker trait for physical profiles.
///
/// This trait is sealed; only [`EmbeddedProfile`] and [`HostProfile`]
/// implement it.
pub trait PhysicalProfile: sealed::Sealed + 'static {
    /// VM stack size in bytes. Must be a multiple of 8.
    const STACK_SIZE: usize;

    /// Number of taken branches a single run may perform.
    const BRANCH_BUDGET: u32;

    /// Number of nodes in the key/value pool.
    const STORE_CAPACITY: usize;

    /// Caller-supplied regions a VM may hold in addition to its defaults.
    const MAX_REGIONS: usize;

    /// Maximum number of hooks installed per trigger.
    const MAX_HOOKS_PER_TRIGGER: usize;

    /// Profile name for diagnostics and logging.
    const NAME: &'static str;
}

/// Embedded profile: a few hundred bytes of stack and a small fixed pool.
///
/// ```bash
/// cargo build --features embedded-profile
/// ```
pub struct EmbeddedProfile;

impl sealed::Sealed for EmbeddedProfile {}

impl PhysicalProfile for EmbeddedProfile {
    const STACK_SIZE: usize = 512;
    const BRANCH_BUDGET: u32 = 200;
    const STORE_CAPACITY: usize = 64;
    const MAX_REGIONS: usize = 4;
    const MAX_HOOKS_PER_TRIGGER: usize = 8;
    const NAME: &'static str = "embedded";
}

/// Host profile: generous limits for running scripts in a regular process.
///
/// ```bash
/// cargo build --no-default-features --features host-profile
/// ```
pub struct HostProfile;

impl sealed::Sealed for HostProfile {}

impl PhysicalProfile for HostProfile {
    const STACK_SIZE: usize = 4096;
    const BRANCH_BUDGET: u32 = 100_000;
    const STORE_CAPACITY: usize = 4096;
    const MAX_REGIONS: usize = 16;
    const MAX_HOOKS_PER_TRIGGER: usize = 32;
    const NAME: &'static str = "host";
}

/// The profile selected at build time.
#[cfg(feature = "host-profile")]
pub type ActiveProfile = HostProfile;

/// The profile selected at build time.
#[cfg(all(feature = "embedded-profile", not(feature = "host-profile")))]
pub type ActiveProfile = EmbeddedProfile;

/// Capacity of the extra region table, usable in array lengths.
pub const MAX_REGIONS: usize = ActiveProfile::MAX_REGIONS;

/// Capacity of each hook chain, usable in array lengths.
pub const MAX_HOOKS_PER_TRIGGER: usize = ActiveProfile::MAX_HOOKS_PER_TRIGGER;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_constants_are_consistent() {
        assert!(ActiveProfile::STACK_SIZE > 0);
        assert_eq!(ActiveProfile::STACK_SIZE % 8, 0);
        assert!(ActiveProfile::BRANCH_BUDGET > 0);
        assert!(!ActiveProfile::NAME.is_empty());
    }

    #[cfg(feature = "embedded-profile")]
    #[test]
    fn embedded_profile_matches_device_limits() {
        assert_eq!(EmbeddedProfile::STACK_SIZE, 512);
        assert_eq!(EmbeddedProfile::BRANCH_BUDGET, 200);
    }
}
