//! Per-aircraft jetway docking state machine.
//!
//! Drives zero or more [`crate::jwctrl::JwCtrl`] controllers through
//! candidate search, docking and undocking, independently for the user's
//! plane and every remote plane a multiplayer adapter reports.

use crate::jwctrl::{FindResult, JwCtrl};
use crate::registry::Registry;
use crate::xplm_shim::XplmApi;

pub const IDLE_POLL_DELAY: f32 = 0.5;
const TELEPORT_EPS: f32 = 1.0;
const STAGGER_SECONDS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disabled,
    Idle,
    Parked,
    SelectJws,
    CanDock,
    Docking,
    Docked,
    Undocking,
    CantDock,
}

/// Host-observed inputs a plane's tick needs each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneInputs {
    pub x: f32,
    pub z: f32,
    pub y: f32,
    pub psi: f32,
    pub on_ground: bool,
    pub beacon_on: bool,
    pub ref_gen: u32,
    pub now: f32,
    pub dock_requested: bool,
    pub undock_requested: bool,
    pub toggle_requested: bool,
    pub door_info: [sam_types::DoorInfo; sam_types::MAX_DOOR],
}

pub struct Plane {
    pub state: State,
    parked_x: f32,
    parked_z: f32,
    parked_ref_gen: u32,
    pub active_jws: Vec<JwCtrl>,
    auto_mode: bool,
}

impl Plane {
    pub fn new(auto_mode: bool) -> Self {
        Plane {
            state: State::Idle,
            parked_x: 0.0,
            parked_z: 0.0,
            parked_ref_gen: 0,
            active_jws: Vec::new(),
            auto_mode,
        }
    }

    fn teleported(&self, inputs: &PlaneInputs) -> bool {
        inputs.ref_gen != self.parked_ref_gen
            || (inputs.x - self.parked_x).abs() > TELEPORT_EPS
            || (inputs.z - self.parked_z).abs() > TELEPORT_EPS
    }

    fn reset_to_idle(&mut self, xplm: &dyn XplmApi, registry: &mut Registry) {
        for jw in self.active_jws.drain(..) {
            jw.release(xplm, registry);
        }
        self.state = State::Idle;
    }

    /// Advance one tick. Returns the delay in seconds before this plane
    /// should be ticked again (`-1.0` means "next frame").
    pub fn tick(&mut self, xplm: &dyn XplmApi, registry: &mut Registry, inputs: &PlaneInputs) -> f32 {
        if self.state != State::Idle && self.state != State::Disabled && self.teleported(inputs) {
            self.reset_to_idle(xplm, registry);
        }

        match self.state {
            State::Disabled => IDLE_POLL_DELAY,
            State::Idle => {
                if inputs.on_ground && !inputs.beacon_on {
                    self.parked_x = inputs.x;
                    self.parked_z = inputs.z;
                    self.parked_ref_gen = inputs.ref_gen;
                    self.state = State::Parked;
                    -1.0
                } else {
                    IDLE_POLL_DELAY
                }
            }
            State::Parked => {
                let candidates = JwCtrl::find_nearest(xplm, registry, inputs);
                if candidates.is_empty() {
                    self.state = State::CantDock;
                } else {
                    self.active_jws = candidates.into_iter().map(|c| c.into_ctrl()).collect();
                    self.state = State::SelectJws;
                }
                -1.0
            }
            State::SelectJws => self.tick_select_jws(xplm, registry, inputs),
            State::CanDock => {
                if inputs.beacon_on {
                    self.reset_to_idle(xplm, registry);
                    return -1.0;
                }
                if inputs.dock_requested || inputs.toggle_requested {
                    self.begin_docking(inputs);
                }
                IDLE_POLL_DELAY
            }
            State::Docking => self.tick_animating(xplm, registry, inputs, true),
            State::Docked => {
                if !inputs.on_ground {
                    self.reset_to_idle(xplm, registry);
                    return -1.0;
                }
                if inputs.beacon_on || inputs.undock_requested || inputs.toggle_requested {
                    self.begin_undocking(inputs);
                    return -1.0;
                }
                IDLE_POLL_DELAY
            }
            State::Undocking => self.tick_animating(xplm, registry, inputs, false),
            State::CantDock => {
                if !inputs.on_ground || inputs.beacon_on {
                    self.state = State::Idle;
                    -1.0
                } else {
                    IDLE_POLL_DELAY
                }
            }
        }
    }

    fn tick_select_jws(&mut self, xplm: &dyn XplmApi, registry: &mut Registry, inputs: &PlaneInputs) -> f32 {
        if inputs.beacon_on {
            self.reset_to_idle(xplm, registry);
            return -1.0;
        }
        let selected = if self.auto_mode {
            JwCtrl::select_jws(xplm, registry, &mut self.active_jws, inputs)
        } else {
            !self.active_jws.is_empty()
        };
        if selected {
            for (i, jw) in self.active_jws.iter_mut().enumerate() {
                jw.setup_for_door(xplm, registry, inputs, i == 0);
            }
            self.state = State::CanDock;
        } else {
            for jw in self.active_jws.drain(..) {
                jw.release(xplm, registry);
            }
            self.state = State::CantDock;
        }
        -1.0
    }

    fn begin_docking(&mut self, inputs: &PlaneInputs) {
        let n = self.active_jws.len();
        for (k, jw) in self.active_jws.iter_mut().enumerate() {
            let stagger = (n - 1 - k) as f32 * STAGGER_SECONDS;
            jw.begin_docking(inputs.now - stagger);
        }
        self.state = State::Docking;
    }

    fn begin_undocking(&mut self, inputs: &PlaneInputs) {
        let n = self.active_jws.len();
        for (k, jw) in self.active_jws.iter_mut().enumerate() {
            let stagger = k as f32 * STAGGER_SECONDS;
            jw.begin_undocking(inputs.now - stagger);
        }
        self.state = State::Undocking;
    }

    fn tick_animating(&mut self, xplm: &dyn XplmApi, registry: &mut Registry, inputs: &PlaneInputs, docking: bool) -> f32 {
        let mut all_done = true;
        let mut next_delay = f32::MAX;
        for jw in self.active_jws.iter_mut() {
            let delay = jw.drive(xplm, registry, inputs);
            if delay >= 0.0 {
                all_done = false;
                next_delay = next_delay.min(delay);
            }
        }
        if all_done {
            self.state = if docking { State::Docked } else { State::Idle };
            if !docking {
                for jw in self.active_jws.drain(..) {
                    jw.release(xplm, registry);
                }
            }
            -1.0
        } else {
            next_delay
        }
    }
}

impl Drop for Plane {
    fn drop(&mut self) {
        // jetways are reset, not released back for another plane's
        // candidate search, because the plane itself is going away too
        for jw in self.active_jws.drain(..) {
            jw.reset_only();
        }
    }
}

pub(crate) type JwFindResult = FindResult;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplm_shim::MockXplm;

    fn base_inputs() -> PlaneInputs {
        PlaneInputs {
            on_ground: true,
            beacon_on: false,
            ref_gen: 1,
            now: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn idle_goes_parked_when_on_ground_and_beacon_off() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut plane = Plane::new(true);
        let delay = plane.tick(&mock, &mut registry, &base_inputs());
        assert_eq!(plane.state, State::Parked);
        assert_eq!(delay, -1.0);
    }

    #[test]
    fn idle_stays_idle_when_airborne() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut plane = Plane::new(true);
        let mut inputs = base_inputs();
        inputs.on_ground = false;
        let delay = plane.tick(&mock, &mut registry, &inputs);
        assert_eq!(plane.state, State::Idle);
        assert_eq!(delay, IDLE_POLL_DELAY);
    }

    #[test]
    fn parked_with_no_candidates_goes_cant_dock() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut plane = Plane::new(true);
        plane.state = State::Parked;
        plane.tick(&mock, &mut registry, &base_inputs());
        assert_eq!(plane.state, State::CantDock);
    }

    #[test]
    fn teleportation_from_docked_resets_to_idle() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut plane = Plane::new(true);
        plane.state = State::Docked;
        plane.parked_x = 0.0;
        plane.parked_z = 0.0;
        plane.parked_ref_gen = 1;
        let mut inputs = base_inputs();
        inputs.x = 500.0;
        plane.tick(&mock, &mut registry, &inputs);
        assert_eq!(plane.state, State::Idle);
    }

    #[test]
    fn cant_dock_returns_to_idle_on_beacon() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        let mut plane = Plane::new(true);
        plane.state = State::CantDock;
        let mut inputs = base_inputs();
        inputs.beacon_on = true;
        plane.tick(&mock, &mut registry, &inputs);
        assert_eq!(plane.state, State::Idle);
    }
}
