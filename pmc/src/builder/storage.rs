use crate::{
    generator::StateId,
    storage::{BitVectorHashMap, StorageError},
};

/// The explored states and the ids of the special ones among them.
#[derive(Debug)]
pub struct StateStorage {
    pub state_to_id: BitVectorHashMap<StateId>,
    pub initial_state_indices: Vec<StateId>,
    pub deadlock_state_indices: Vec<StateId>,
}

impl StateStorage {
    pub fn new(
        state_size: usize,
        initial_capacity: usize,
        load_factor: f64,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            state_to_id: BitVectorHashMap::new(state_size, initial_capacity, load_factor)?,
            initial_state_indices: Vec::new(),
            deadlock_state_indices: Vec::new(),
        })
    }

    pub fn number_of_states(&self) -> usize {
        self.state_to_id.len()
    }

    /// Applies `remapping` to every stored id and keeps the id lists sorted.
    pub fn remap(&mut self, remapping: &[StateId]) {
        self.state_to_id.remap(|id| remapping[id]);
        for indices in [
            &mut self.initial_state_indices,
            &mut self.deadlock_state_indices,
        ] {
            for id in indices.iter_mut() {
                *id = remapping[*id];
            }
            indices.sort_unstable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CompressedState;

    #[test]
    fn test_remap() {
        let mut storage = StateStorage::new(64, 5, 0.75).unwrap();
        for id in 0..3u64 {
            let mut state = CompressedState::new(64);
            state.set_from_int(0, 8, id);
            storage.state_to_id.find_or_add(&state, id as usize).unwrap();
        }
        storage.initial_state_indices = vec![0, 1];
        storage.deadlock_state_indices = vec![2];

        storage.remap(&[2, 0, 1]);
        assert_eq!(storage.initial_state_indices, vec![0, 2]);
        assert_eq!(storage.deadlock_state_indices, vec![1]);
        let mut state = CompressedState::new(64);
        state.set_from_int(0, 8, 2);
        assert_eq!(storage.state_to_id.get_value(&state), 1);
        assert_eq!(storage.number_of_states(), 3);
    }
}
