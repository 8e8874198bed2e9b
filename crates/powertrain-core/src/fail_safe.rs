//! Link health tracking and the fail-safe latch.
//!
//! # State machine
//!
//! ```text
//!            N consecutive link errors, or link lost
//!   Normal ─────────────────────────────────────────▶ Engaged { held: 0 }
//!     ▲                                                   │
//!     │      recovery_exchanges valid exchanges held      │ valid exchange: held += 1
//!     └───────────────────────────────────────────────────┘ link error:     held = 0
//! ```
//!
//! Engaging is latched: the transition fires once and stays engaged until the
//! link has proven itself again, no matter how many more errors pile up.
//! While engaged, commands in valid requests are not applied.

use tracing::{info, warn};

/// Fail-safe state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailSafeState {
    /// Commands flow through
    Normal,
    /// Motors held in the safe state
    Engaged {
        /// Valid exchanges seen since engaging (or since the last link error)
        held: u32,
    },
}

/// Counts consecutive link failures and owns the fail-safe latch.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    threshold: u32,
    recovery_exchanges: u32,
    consecutive_errors: u32,
    state: FailSafeState,
}

impl LinkMonitor {
    /// Create a monitor.
    ///
    /// A `threshold` of zero is treated as one: the first error engages.
    pub fn new(threshold: u32, recovery_exchanges: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            recovery_exchanges,
            consecutive_errors: 0,
            state: FailSafeState::Normal,
        }
    }

    /// Record a recoverable receive or send failure.
    ///
    /// Returns true if this call engaged the fail-safe. The caller is then
    /// responsible for driving the motors to the safe state.
    pub fn record_link_error(&mut self) -> bool {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);

        match self.state {
            FailSafeState::Engaged { .. } => {
                self.state = FailSafeState::Engaged { held: 0 };
                false
            },
            FailSafeState::Normal if self.consecutive_errors >= self.threshold => {
                warn!(
                    consecutive_errors = self.consecutive_errors,
                    threshold = self.threshold,
                    "sustained link failure, engaging fail-safe"
                );
                self.state = FailSafeState::Engaged { held: 0 };
                true
            },
            FailSafeState::Normal => false,
        }
    }

    /// Record loss of the link. Engages immediately.
    ///
    /// Returns true if this call engaged the fail-safe.
    pub fn record_link_lost(&mut self) -> bool {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.engage()
    }

    /// Engage without a link error, e.g. for a session that follows a lost
    /// link.
    ///
    /// Returns true if this call engaged the fail-safe.
    pub fn engage(&mut self) -> bool {
        match self.state {
            FailSafeState::Engaged { .. } => false,
            FailSafeState::Normal => {
                warn!(consecutive_errors = self.consecutive_errors, "engaging fail-safe");
                self.state = FailSafeState::Engaged { held: 0 };
                true
            },
        }
    }

    /// Record a completed exchange: request received, response sent.
    pub fn record_exchange(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Account for one valid request and decide whether its command may be
    /// applied.
    pub fn admit_command(&mut self) -> bool {
        match self.state {
            FailSafeState::Normal => true,
            FailSafeState::Engaged { held } if held >= self.recovery_exchanges => {
                info!(held_exchanges = held, "link recovered, releasing fail-safe");
                self.state = FailSafeState::Normal;
                true
            },
            FailSafeState::Engaged { held } => {
                self.state = FailSafeState::Engaged { held: held + 1 };
                false
            },
        }
    }

    /// Returns true while the motors are held in the safe state.
    pub fn is_engaged(&self) -> bool {
        matches!(self.state, FailSafeState::Engaged { .. })
    }

    /// Current state.
    pub fn state(&self) -> FailSafeState {
        self.state
    }

    /// Link errors since the last completed exchange.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn engages_exactly_at_threshold() {
        let mut monitor = LinkMonitor::new(3, 3);

        assert!(!monitor.record_link_error());
        assert!(!monitor.record_link_error());
        assert!(!monitor.is_engaged());

        assert!(monitor.record_link_error());
        assert!(monitor.is_engaged());
    }

    #[test]
    fn engagement_is_latched() {
        let mut monitor = LinkMonitor::new(3, 3);
        for _ in 0..3 {
            monitor.record_link_error();
        }

        for _ in 0..100 {
            assert!(!monitor.record_link_error());
        }
        assert!(!monitor.record_link_lost());
        assert!(monitor.is_engaged());
    }

    #[test]
    fn completed_exchange_resets_the_count() {
        let mut monitor = LinkMonitor::new(3, 3);

        monitor.record_link_error();
        monitor.record_link_error();
        monitor.record_exchange();
        assert_eq!(monitor.consecutive_errors(), 0);

        assert!(!monitor.record_link_error());
        assert!(!monitor.record_link_error());
        assert!(!monitor.is_engaged());
    }

    #[test]
    fn link_loss_engages_immediately() {
        let mut monitor = LinkMonitor::new(3, 3);

        assert!(monitor.record_link_lost());
        assert!(monitor.is_engaged());
    }

    #[test]
    fn explicit_engage_holds_commands() {
        let mut monitor = LinkMonitor::new(3, 1);

        assert!(monitor.engage());
        assert!(!monitor.engage());
        assert_eq!(monitor.consecutive_errors(), 0);

        assert!(!monitor.admit_command());
        assert!(monitor.admit_command());
    }

    #[test]
    fn recovery_holds_then_releases() {
        let mut monitor = LinkMonitor::new(1, 3);
        monitor.record_link_error();

        assert!(!monitor.admit_command());
        assert!(!monitor.admit_command());
        assert!(!monitor.admit_command());
        assert!(monitor.is_engaged());

        assert!(monitor.admit_command());
        assert_eq!(monitor.state(), FailSafeState::Normal);
    }

    #[test]
    fn link_error_restarts_recovery() {
        let mut monitor = LinkMonitor::new(1, 2);
        monitor.record_link_error();

        assert!(!monitor.admit_command());
        assert!(!monitor.admit_command());
        monitor.record_link_error();
        assert_eq!(monitor.state(), FailSafeState::Engaged { held: 0 });

        assert!(!monitor.admit_command());
        assert!(!monitor.admit_command());
        assert!(monitor.admit_command());
    }

    #[test]
    fn zero_recovery_releases_on_first_valid_exchange() {
        let mut monitor = LinkMonitor::new(1, 0);
        monitor.record_link_error();

        assert!(monitor.admit_command());
        assert!(!monitor.is_engaged());
    }

    #[test]
    fn zero_threshold_acts_as_one() {
        let mut monitor = LinkMonitor::new(0, 3);
        assert!(monitor.record_link_error());
    }

    proptest! {
        #[test]
        fn engages_at_most_once_per_outage(
            threshold in 1u32..10,
            errors in 0u32..64,
        ) {
            let mut monitor = LinkMonitor::new(threshold, 3);
            let engagements = (0..errors).filter(|_| monitor.record_link_error()).count();

            prop_assert_eq!(engagements, usize::from(errors >= threshold));
            prop_assert_eq!(monitor.is_engaged(), errors >= threshold);
        }
    }
}
