use crate::linalg::fields::PseudoField;

/// Rewards attached to states and to choices (matrix rows).
#[derive(Clone, Debug, PartialEq)]
pub struct StandardRewardModel<F> {
    state_rewards: Option<Vec<F>>,
    state_action_rewards: Option<Vec<F>>,
}

impl<F: PseudoField> StandardRewardModel<F> {
    pub fn new(state_rewards: Option<Vec<F>>, state_action_rewards: Option<Vec<F>>) -> Self {
        Self {
            state_rewards,
            state_action_rewards,
        }
    }

    pub fn has_state_rewards(&self) -> bool {
        self.state_rewards.is_some()
    }

    pub fn has_state_action_rewards(&self) -> bool {
        self.state_action_rewards.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_state_rewards() && !self.has_state_action_rewards()
    }

    pub fn state_rewards(&self) -> Option<&[F]> {
        self.state_rewards.as_deref()
    }

    pub fn state_action_rewards(&self) -> Option<&[F]> {
        self.state_action_rewards.as_deref()
    }

    /// The reward of the state, zero if there are no state rewards.
    pub fn state_reward(&self, state: usize) -> F {
        self.state_rewards
            .as_ref()
            .map_or_else(F::zero, |rewards| rewards[state].clone())
    }

    /// The reward of the choice, zero if there are no state-action rewards.
    pub fn state_action_reward(&self, row: usize) -> F {
        self.state_action_rewards
            .as_ref()
            .map_or_else(F::zero, |rewards| rewards[row].clone())
    }

    /// The reward collected when taking the given row of the given state.
    pub fn total_reward(&self, state: usize, row: usize) -> F {
        let mut total = self.state_reward(state);
        total.add_assign(&self.state_action_reward(row));
        total
    }
}
