//! Status lifecycles.
//!
//! Every status enum declares the statuses reachable from each state. A
//! status with no successors is terminal.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{CoreError, Result};

pub trait Lifecycle: Copy + PartialEq + Display + FromStr<Err = CoreError> + 'static {
    /// Entity name used in transition errors, e.g. `"dispatch"`.
    const ENTITY: &'static str;

    /// Statuses reachable from `self` in one step.
    fn allowed_next(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validate a move to `next` and return it.
    fn transition_to(self, next: Self) -> Result<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::invalid_transition(Self::ENTITY, self, next))
        }
    }
}

/// Parse a requested status value and validate the move from `current`.
pub fn parse_transition<S: Lifecycle>(current: S, requested: &str) -> Result<S> {
    let next: S = requested.parse()?;
    current.transition_to(next)
}
