use crate::{
    error::{BuildError, BuildResult},
    linalg::fields::PseudoField,
    models::StandardRewardModel,
};

/// What kinds of rewards a reward model of a generator assigns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardModelInformation {
    pub name: String,
    pub has_state_rewards: bool,
    pub has_state_action_rewards: bool,
    pub has_transition_rewards: bool,
}

impl RewardModelInformation {
    pub fn new(
        name: impl Into<String>,
        has_state_rewards: bool,
        has_state_action_rewards: bool,
    ) -> Self {
        Self {
            name: name.into(),
            has_state_rewards,
            has_state_action_rewards,
            has_transition_rewards: false,
        }
    }
}

/// Collects the rewards of one reward model while the state space is explored.
#[derive(Debug)]
pub struct RewardModelBuilder<F> {
    information: RewardModelInformation,
    state_rewards: Vec<F>,
    state_action_rewards: Vec<F>,
}

impl<F: PseudoField> RewardModelBuilder<F> {
    pub fn new(information: RewardModelInformation) -> Self {
        Self {
            information,
            state_rewards: Vec::new(),
            state_action_rewards: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.information.name
    }

    pub fn has_state_rewards(&self) -> bool {
        self.information.has_state_rewards
    }

    pub fn has_state_action_rewards(&self) -> bool {
        self.information.has_state_action_rewards
    }

    /// Appends the reward of the next state.
    pub fn add_state_reward(&mut self, value: F) {
        self.state_rewards.push(value);
    }

    /// Appends the reward of the next choice.
    pub fn add_state_action_reward(&mut self, value: F) {
        self.state_action_rewards.push(value);
    }

    /// Builds the reward model of a model with the given dimensions.
    ///
    /// # Panics
    ///
    /// Panics if the collected rewards are not in lock-step with the states and
    /// choices of the model.
    pub fn build(
        self,
        row_count: usize,
        _column_count: usize,
        row_group_count: usize,
    ) -> BuildResult<StandardRewardModel<F>> {
        if self.information.has_transition_rewards {
            return Err(BuildError::Unsupported(format!(
                "transition rewards of reward model '{}'",
                self.information.name
            )));
        }

        let Self {
            information,
            state_rewards,
            state_action_rewards,
        } = self;
        let state_rewards = if information.has_state_rewards {
            assert!(
                state_rewards.len() == row_group_count,
                "Size of state reward vector ({}) does not match the number of states ({}).",
                state_rewards.len(),
                row_group_count
            );
            Some(state_rewards)
        } else {
            None
        };
        let state_action_rewards = if information.has_state_action_rewards {
            assert!(
                state_action_rewards.len() == row_count,
                "Size of state-action reward vector ({}) does not match the number of choices ({}).",
                state_action_rewards.len(),
                row_count
            );
            Some(state_action_rewards)
        } else {
            None
        };
        Ok(StandardRewardModel::new(state_rewards, state_action_rewards))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::float64::Float64;

    #[test]
    fn test_build() {
        let mut builder = RewardModelBuilder::new(RewardModelInformation::new("cost", true, true));
        builder.add_state_reward(Float64::from(1.0));
        builder.add_state_action_reward(Float64::from(2.0));
        builder.add_state_action_reward(Float64::from(3.0));
        let model = builder.build(2, 1, 1).unwrap();
        assert_eq!(model.state_reward(0), Float64::from(1.0));
        assert_eq!(model.state_action_reward(1), Float64::from(3.0));
    }

    #[test]
    fn test_transition_rewards_are_unsupported() {
        let mut information = RewardModelInformation::new("cost", false, false);
        information.has_transition_rewards = true;
        let builder = RewardModelBuilder::<Float64>::new(information);
        assert!(matches!(builder.build(0, 0, 0), Err(BuildError::Unsupported(_))));
    }

    #[test]
    #[should_panic(expected = "does not match the number of states")]
    fn test_lock_step() {
        let mut builder = RewardModelBuilder::new(RewardModelInformation::new("cost", true, false));
        builder.add_state_reward(Float64::from(1.0));
        let _ = builder.build(2, 2, 2);
    }
}
