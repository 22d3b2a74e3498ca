//! Multiplayer orchestrator: drives one [`crate::plane::Plane`] per
//! remote aircraft reported by a host-specific traffic adapter.
//!
//! Concrete adapters (xPilot, TGXP, LiveTraffic) are out of scope here;
//! only the contract and the bookkeeping around it live in this crate.

use std::collections::HashMap;

use crate::plane::{Plane, PlaneInputs};
use crate::registry::Registry;
use crate::xplm_shim::XplmApi;

/// One remote-traffic source the host plugin has discovered.
pub trait MpAdapter {
    /// Stable identifier for logging and the remote-plane table.
    fn personality(&self) -> &str;

    /// Every id currently present in the adapter's live snapshot.
    fn live_ids(&self, xplm: &dyn XplmApi) -> Vec<u32>;

    /// Per-tick kinematic inputs for one remote plane, if it is still
    /// present and close enough to be worth updating.
    fn plane_inputs(&self, xplm: &dyn XplmApi, id: u32) -> Option<PlaneInputs>;
}

pub struct MpOrchestrator {
    adapters: Vec<Box<dyn MpAdapter + Send>>,
    planes: HashMap<(usize, u32), Plane>,
}

impl MpOrchestrator {
    pub fn new() -> Self {
        MpOrchestrator {
            adapters: Vec::new(),
            planes: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Box<dyn MpAdapter + Send>) {
        self.adapters.push(adapter);
    }

    /// Update every adapter's remote-plane table, destroying planes that
    /// dropped out of the upstream snapshot, and tick the rest.
    pub fn update(&mut self, xplm: &dyn XplmApi, registry: &mut Registry) -> f32 {
        let mut next_delay = f32::MAX;

        for (ai, adapter) in self.adapters.iter().enumerate() {
            let live: std::collections::HashSet<u32> = adapter.live_ids(xplm).into_iter().collect();

            self.planes.retain(|(owner, id), _| *owner != ai || live.contains(id));

            for id in live {
                let Some(inputs) = adapter.plane_inputs(xplm, id) else {
                    continue;
                };
                let plane = self.planes.entry((ai, id)).or_insert_with(|| Plane::new(false));
                let delay = plane.tick(xplm, registry, &inputs);
                if delay >= 0.0 {
                    next_delay = next_delay.min(delay);
                }
            }
        }

        if next_delay == f32::MAX {
            1.0
        } else {
            next_delay
        }
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
}

impl Default for MpOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplm_shim::MockXplm;

    struct FixedAdapter {
        ids: Vec<u32>,
    }

    impl MpAdapter for FixedAdapter {
        fn personality(&self) -> &str {
            "fixed"
        }

        fn live_ids(&self, _xplm: &dyn XplmApi) -> Vec<u32> {
            self.ids.clone()
        }

        fn plane_inputs(&self, _xplm: &dyn XplmApi, _id: u32) -> Option<PlaneInputs> {
            Some(PlaneInputs {
                on_ground: false,
                ..Default::default()
            })
        }
    }

    #[test]
    fn planes_are_created_for_live_ids() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut orch = MpOrchestrator::new();
        orch.register(Box::new(FixedAdapter { ids: vec![1, 2, 3] }));
        orch.update(&mock, &mut registry);
        assert_eq!(orch.plane_count(), 3);
    }

    #[test]
    fn planes_are_destroyed_when_dropped_from_snapshot() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut orch = MpOrchestrator::new();
        orch.register(Box::new(FixedAdapter { ids: vec![1, 2] }));
        orch.update(&mock, &mut registry);
        assert_eq!(orch.plane_count(), 2);

        orch.adapters[0] = Box::new(FixedAdapter { ids: vec![1] });
        orch.update(&mock, &mut registry);
        assert_eq!(orch.plane_count(), 1);
    }
}
