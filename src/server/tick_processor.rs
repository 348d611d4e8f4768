//! One deterministic whole-world step per server tick (spec.md §4.1).

use crate::server::input_queue::InputMessage;
use crate::shared::game::Simulation;
use crate::shared::id::ClientId;
use indexmap::IndexMap;

/// Stateless: batches each connected client's pending inputs into one
/// merged input (or substitutes the idle input), then calls
/// [`Simulation::simulate`] exactly once.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickProcessor;

impl TickProcessor {
    pub fn new() -> Self {
        Self
    }

    /// `connected` must be in a stable, deterministic order (the
    /// orchestrator keeps its client table sorted by [`ClientId`]).
    /// Returns the new world and, for each client that had at least one
    /// pending input this tick, the highest input `seq` consumed.
    pub fn step<S: Simulation>(
        &self,
        sim: &S,
        world: &S::World,
        connected: &[ClientId],
        pending: &IndexMap<ClientId, Vec<InputMessage<S::Input>>>,
        dt_ms: f64,
    ) -> (S::World, IndexMap<ClientId, u32>) {
        let mut inputs: IndexMap<ClientId, S::Input> = IndexMap::new();
        let mut acks: IndexMap<ClientId, u32> = IndexMap::new();

        for client in connected {
            match pending.get(client).filter(|msgs| !msgs.is_empty()) {
                Some(msgs) => {
                    let raw: Vec<S::Input> = msgs.iter().map(|m| m.input.clone()).collect();
                    let merged = sim.merge_inputs(&raw);
                    let max_seq = msgs.iter().map(|m| m.seq).max().expect("non-empty");
                    inputs.insert(client.clone(), merged);
                    acks.insert(client.clone(), max_seq);
                }
                None => {
                    inputs.insert(client.clone(), sim.create_idle_input());
                }
            }
        }

        let new_world = sim.simulate(world, &inputs, dt_ms);
        (new_world, acks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::game::Action as ActionTrait;

    #[derive(Clone)]
    struct Counter;

    #[derive(Clone, Debug, PartialEq)]
    struct DummyAction;
    impl ActionTrait for DummyAction {
        fn client_timestamp(&self) -> f64 {
            0.0
        }
    }

    impl Simulation for Counter {
        type World = i32;
        type Input = i32;
        type Action = DummyAction;

        fn simulate(
            &self,
            world: &i32,
            inputs: &IndexMap<ClientId, i32>,
            _dt_ms: f64,
        ) -> i32 {
            world + inputs.values().sum::<i32>()
        }

        fn interpolate(&self, from: &i32, _to: &i32, _alpha: f32) -> i32 {
            *from
        }

        fn add_player(&self, world: &i32, _id: &ClientId) -> i32 {
            *world
        }

        fn remove_player(&self, world: &i32, _id: &ClientId) -> i32 {
            *world
        }

        fn create_idle_input(&self) -> i32 {
            0
        }
    }

    #[test]
    fn idle_input_substituted_for_missing_client() {
        let processor = TickProcessor::new();
        let sim = Counter;
        let a = ClientId::new("a");
        let b = ClientId::new("b");
        let mut pending = IndexMap::new();
        pending.insert(
            a.clone(),
            vec![InputMessage { seq: 0, input: 5, timestamp: 0.0 }],
        );
        let (world, acks) = processor.step(&sim, &0, &[a.clone(), b.clone()], &pending, 16.0);
        assert_eq!(world, 5);
        assert_eq!(acks.get(&a), Some(&0));
        assert_eq!(acks.get(&b), None);
    }

    #[test]
    fn highest_seq_in_burst_is_acked() {
        let processor = TickProcessor::new();
        let sim = Counter;
        let a = ClientId::new("a");
        let mut pending = IndexMap::new();
        pending.insert(
            a.clone(),
            vec![
                InputMessage { seq: 3, input: 1, timestamp: 0.0 },
                InputMessage { seq: 4, input: 2, timestamp: 0.0 },
            ],
        );
        let (_, acks) = processor.step(&sim, &0, &[a.clone()], &pending, 16.0);
        assert_eq!(acks.get(&a), Some(&4));
    }
}
