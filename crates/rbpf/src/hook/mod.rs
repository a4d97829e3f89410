//! Hook Registry
//!
//! Hosts attach programs to a small, closed set of triggers. Firing a
//! trigger runs its chain newest-first; after each run, that hook's
//! [`HookPolicy`] decides whether the rest of the chain still runs.
//!
//! ```text
//!   fire(Netif, ctx)
//!     ├─► hook 3 (Continue)         r0 = 0   ─► next
//!     ├─► hook 2 (AbortOnNegative)  r0 = -2  ─► stop
//!     └─► hook 1                    (not run)
//! ```
//!
//! A failed run is seen by the policy as its negative result code, so a
//! faulting script never takes the host down with it.

use core::array;
use core::fmt;
use core::str::FromStr;

use heapless::Vec;
use log::{trace, warn};
use thiserror::Error;

use crate::execution::Vm;
use crate::profile::MAX_HOOKS_PER_TRIGGER;

/// Events a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTrigger {
    /// A network interface event.
    Netif,
    /// A scheduler tick.
    Sched,
}

impl HookTrigger {
    pub const COUNT: usize = 2;
    pub const ALL: [HookTrigger; Self::COUNT] = [Self::Netif, Self::Sched];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Netif => "netif",
            Self::Sched => "sched",
        }
    }
}

impl fmt::Display for HookTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HookTrigger {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or(HookError::UnknownTrigger)
    }
}

/// What happens after a hook's program completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HookPolicy {
    /// Always run the next hook.
    #[default]
    Continue,
    /// Stop the chain if the result is negative.
    AbortOnNegative,
    /// Stop the chain if the result is greater than zero.
    AbortOnPositive,
    /// Always stop after this hook.
    Single,
}

impl HookPolicy {
    pub const ALL: [HookPolicy; 4] = [
        Self::Continue,
        Self::AbortOnNegative,
        Self::AbortOnPositive,
        Self::Single,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::AbortOnNegative => "abort-on-negative",
            Self::AbortOnPositive => "abort-on-positive",
            Self::Single => "single",
        }
    }

    /// Whether the chain continues after a hook returned `result`.
    pub const fn continues(self, result: i64) -> bool {
        match self {
            Self::Continue => true,
            Self::AbortOnNegative => result >= 0,
            Self::AbortOnPositive => result <= 0,
            Self::Single => false,
        }
    }
}

impl fmt::Display for HookPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HookPolicy {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or(HookError::UnknownPolicy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("hook chain for {trigger} is full ({capacity} hooks)")]
    ChainFull {
        trigger: HookTrigger,
        capacity: usize,
    },

    #[error("unknown hook trigger")]
    UnknownTrigger,

    #[error("unknown hook policy")]
    UnknownPolicy,
}

/// Handle to an installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u32);

impl HookId {
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable state of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookInfo {
    pub id: HookId,
    pub policy: HookPolicy,
    pub executions: u32,
}

/// Outcome of firing a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookRun {
    /// Hooks that ran.
    pub ran: usize,
    /// Result of the last hook that ran; failures as their negative code.
    pub result: Option<i64>,
}

struct Hook<'a> {
    id: HookId,
    vm: Vm<'a>,
    policy: HookPolicy,
    executions: u32,
}

impl Hook<'_> {
    fn info(&self) -> HookInfo {
        HookInfo {
            id: self.id,
            policy: self.policy,
            executions: self.executions,
        }
    }
}

/// Hook chains for every trigger.
pub struct HookRegistry<'a> {
    // Installed oldest first; run in reverse.
    chains: [Vec<Hook<'a>, MAX_HOOKS_PER_TRIGGER>; HookTrigger::COUNT],
    next_id: u32,
}

impl<'a> HookRegistry<'a> {
    pub fn new() -> Self {
        Self {
            chains: array::from_fn(|_| Vec::new()),
            next_id: 0,
        }
    }

    /// Install a VM at the head of a trigger's chain.
    pub fn install(&mut self, trigger: HookTrigger, vm: Vm<'a>, policy: HookPolicy) -> Result<HookId, HookError> {
        let id = HookId(self.next_id);
        let hook = Hook {
            id,
            vm,
            policy,
            executions: 0,
        };
        self.chains[trigger.index()]
            .push(hook)
            .map_err(|_| HookError::ChainFull {
                trigger,
                capacity: MAX_HOOKS_PER_TRIGGER,
            })?;
        self.next_id = self.next_id.wrapping_add(1);
        trace!("installed hook {} on {} ({})", id, trigger, policy);
        Ok(id)
    }

    /// Run a trigger's chain with `ctx` as every program's context.
    pub fn fire(&mut self, trigger: HookTrigger, ctx: &mut [u8]) -> HookRun {
        let mut run = HookRun::default();

        for hook in self.chains[trigger.index()].iter_mut().rev() {
            let result = match hook.vm.execute(&mut *ctx) {
                Ok(r0) => r0,
                Err(e) => {
                    warn!("hook {} on {} failed: {}", hook.id, trigger, e);
                    i64::from(e.code())
                }
            };
            hook.executions = hook.executions.saturating_add(1);
            run.ran += 1;
            run.result = Some(result);

            if !hook.policy.continues(result) {
                trace!("hook {} stopped the {} chain", hook.id, trigger);
                break;
            }
        }
        run
    }

    /// Hooks on a trigger, in the order they run.
    pub fn hooks(&self, trigger: HookTrigger) -> impl Iterator<Item = HookInfo> + '_ {
        self.chains[trigger.index()].iter().rev().map(Hook::info)
    }

    pub fn len(&self, trigger: HookTrigger) -> usize {
        self.chains[trigger.index()].len()
    }

    pub fn is_empty(&self, trigger: HookTrigger) -> bool {
        self.chains[trigger.index()].is_empty()
    }
}

impl Default for HookRegistry<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!("netif".parse::<HookTrigger>(), Ok(HookTrigger::Netif));
        assert_eq!("sched".parse::<HookTrigger>(), Ok(HookTrigger::Sched));
        assert_eq!("timer".parse::<HookTrigger>(), Err(HookError::UnknownTrigger));
        assert_eq!("abort-on-negative".parse::<HookPolicy>(), Ok(HookPolicy::AbortOnNegative));
        assert_eq!("single".parse::<HookPolicy>(), Ok(HookPolicy::Single));
        assert_eq!("abort".parse::<HookPolicy>(), Err(HookError::UnknownPolicy));
    }

    #[test]
    fn policy_decisions() {
        assert!(HookPolicy::Continue.continues(-1));
        assert!(!HookPolicy::AbortOnNegative.continues(-1));
        assert!(HookPolicy::AbortOnNegative.continues(0));
        assert!(!HookPolicy::AbortOnPositive.continues(1));
        assert!(HookPolicy::AbortOnPositive.continues(0));
        assert!(HookPolicy::AbortOnPositive.continues(-3));
        assert!(!HookPolicy::Single.continues(0));
    }

    #[test]
    fn empty_chain() {
        let mut registry = HookRegistry::new();
        assert!(registry.is_empty(HookTrigger::Netif));
        assert_eq!(registry.fire(HookTrigger::Netif, &mut []), HookRun::default());
    }
}
