//! Action-chain construction.
//!
//! A policy is a plain `Vec<UnitAction>` spanning a horizon. Chains carry
//! only movement intent; aim and trigger are refreshed per simulated tick by
//! whoever runs the rollout.

use sidearm_core::types::UnitAction;

/// Requested horizontal speed for a moving chain. Deliberately saturating -
/// the simulator clamps it to the unit's real maximum.
pub const RAW_CHAIN_SPEED: f64 = 100.0;

/// A constant-action chain: hold one movement intent for `ticks` ticks.
pub fn chain(ticks: usize, direction: f64, jump: bool, jump_down: bool) -> Vec<UnitAction> {
    let action = UnitAction {
        velocity: direction * RAW_CHAIN_SPEED,
        jump,
        jump_down,
        ..UnitAction::default()
    };
    vec![action; ticks]
}

/// Stand still, no jump.
pub fn neutral(ticks: usize) -> Vec<UnitAction> {
    chain(ticks, 0.0, false, false)
}

/// Append `tail` to `head` (search continuation).
pub fn concat(mut head: Vec<UnitAction>, tail: &[UnitAction]) -> Vec<UnitAction> {
    head.extend_from_slice(tail);
    head
}

/// The candidate grid used for both self- and enemy-policies:
/// {left, stay, right} x {ground move, jump, jump down}.
pub fn candidate_chains(ticks: usize) -> Vec<Vec<UnitAction>> {
    let mut chains = Vec::with_capacity(9);
    for direction in [-1.0, 0.0, 1.0] {
        chains.push(chain(ticks, direction, false, false));
        chains.push(chain(ticks, direction, true, false));
        chains.push(chain(ticks, direction, false, true));
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_repeats_one_action() {
        let actions = chain(5, -1.0, true, false);
        assert_eq!(actions.len(), 5);
        for action in &actions {
            assert_eq!(action.velocity, -RAW_CHAIN_SPEED);
            assert!(action.jump);
            assert!(!action.jump_down);
            assert!(!action.shoot);
        }
    }

    #[test]
    fn concat_preserves_order() {
        let joined = concat(chain(3, 1.0, false, false), &neutral(2));
        assert_eq!(joined.len(), 5);
        assert_eq!(joined[2].velocity, RAW_CHAIN_SPEED);
        assert_eq!(joined[3].velocity, 0.0);
    }

    #[test]
    fn candidate_grid_is_complete() {
        let chains = candidate_chains(10);
        assert_eq!(chains.len(), 9);
        assert!(chains.iter().all(|c| c.len() == 10));
        // one pure idle chain
        assert_eq!(
            chains
                .iter()
                .filter(|c| c[0].velocity == 0.0 && !c[0].jump && !c[0].jump_down)
                .count(),
            1
        );
    }
}
