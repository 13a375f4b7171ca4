//! Toggle rules for optimistic vote updates.
//!
//! Only upvote presence moves the visible tally; downvotes never subtract.

use crate::models::{VoteAction, VoteDirection};

/// The local change applied before the authority answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticPlan {
    pub direction: VoteDirection,
    pub tally_delta: i64,
}

/// Compute the optimistic direction and tally delta for `requested` given `prev`.
pub fn plan_toggle(prev: VoteDirection, requested: VoteAction) -> OptimisticPlan {
    let (direction, tally_delta) = match (prev, requested) {
        (VoteDirection::Up, VoteAction::Up) => (VoteDirection::None, -1),
        (VoteDirection::Down, VoteAction::Down) => (VoteDirection::None, 0),
        (VoteDirection::Up, VoteAction::Down) => (VoteDirection::Down, -1),
        (VoteDirection::Down, VoteAction::Up) => (VoteDirection::Up, 1),
        (VoteDirection::None, VoteAction::Up) => (VoteDirection::Up, 1),
        (VoteDirection::None, VoteAction::Down) => (VoteDirection::Down, 0),
    };
    OptimisticPlan {
        direction,
        tally_delta,
    }
}

/// Apply a signed delta to a tally that never goes below zero.
pub fn apply_delta(tally: u64, delta: i64) -> u64 {
    if delta >= 0 {
        tally.saturating_add(delta as u64)
    } else {
        tally.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_table() {
        let cases = [
            (VoteDirection::Up, VoteAction::Up, VoteDirection::None, -1),
            (VoteDirection::Down, VoteAction::Down, VoteDirection::None, 0),
            (VoteDirection::Up, VoteAction::Down, VoteDirection::Down, -1),
            (VoteDirection::Down, VoteAction::Up, VoteDirection::Up, 1),
            (VoteDirection::None, VoteAction::Up, VoteDirection::Up, 1),
            (VoteDirection::None, VoteAction::Down, VoteDirection::Down, 0),
        ];

        for (prev, requested, direction, delta) in cases {
            let plan = plan_toggle(prev, requested);
            assert_eq!(plan.direction, direction, "{prev:?} + {requested:?}");
            assert_eq!(plan.tally_delta, delta, "{prev:?} + {requested:?}");
        }
    }

    #[test]
    fn test_apply_delta_floors_at_zero() {
        assert_eq!(apply_delta(0, -1), 0);
        assert_eq!(apply_delta(3, -1), 2);
        assert_eq!(apply_delta(3, 1), 4);
        assert_eq!(apply_delta(3, 0), 3);
    }
}
