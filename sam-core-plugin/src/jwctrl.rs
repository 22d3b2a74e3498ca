//! Per-jetway actor: candidate filtering, door kinematics and the
//! dock/undock animation phase machines.

use sam_types::{Jetway, Range};

use crate::geometry::{len2f, ra, segments_collide};
use crate::jetway_registry::JetwayHandle;
use crate::plane::PlaneInputs;
use crate::registry::Registry;
use crate::xplm_shim::XplmApi;

pub const K_DRIVE_SPEED: f32 = 1.0;
pub const K_TURN_SPEED: f32 = 10.0;
pub const K_HEIGHT_SPEED: f32 = 0.1;
pub const K_ANIM_TIMEOUT: f32 = 50.0;
pub const K_ALIGN_DIST: f32 = 1.0;
pub const K_ARRIVAL_EPS: f32 = 0.05;
pub const K_SOFT_MATCH_MAX_EXTRA: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockPhase {
    Parked,
    ToAp,
    AtAp,
    ToDoor,
    Docked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndockPhase {
    ToAp,
    AtAp,
    ToPark,
    Parked,
}

#[derive(Debug, Clone, Copy)]
struct DoorTarget {
    rot1: f32,
    rot2: f32,
    rot3: f32,
    extent: f32,
    ap_x: f32,
    door_x: f32,
    parked_x: f32,
    parked_z: f32,
    soft_match: bool,
}

/// A candidate produced by [`JwCtrl::find_nearest`], not yet committed.
pub struct FindResult {
    handle: JetwayHandle,
    height: f32,
    x: f32,
    z: f32,
    soft_match: bool,
}

impl FindResult {
    pub fn into_ctrl(self) -> JwCtrl {
        JwCtrl {
            handle: self.handle,
            dock_phase: DockPhase::Parked,
            undock_phase: UndockPhase::Parked,
            target: None,
            start_ts: 0.0,
            wb_rot: 0.0,
            wait_wb_rot: false,
            soft_match: self.soft_match,
        }
    }
}

pub struct JwCtrl {
    handle: JetwayHandle,
    dock_phase: DockPhase,
    undock_phase: UndockPhase,
    target: Option<DoorTarget>,
    start_ts: f32,
    wb_rot: f32,
    wait_wb_rot: bool,
    soft_match: bool,
}

impl JwCtrl {
    pub fn find_nearest(xplm: &dyn XplmApi, registry: &mut Registry, inputs: &PlaneInputs) -> Vec<FindResult> {
        let mut out = Vec::new();
        // Sceneries are pre-filtered to the plane's vicinity by the
        // scheduler before this is called; here we only walk jetways.
        for (si, scenery) in registry.sceneries.iter().enumerate() {
            for (ji, jw) in scenery.jetways.iter().enumerate() {
                if let Some(result) = evaluate_candidate(jw, inputs) {
                    out.push(FindResult {
                        handle: JetwayHandle::Scenery { scenery: si, jetway: ji },
                        height: jw.geometry.height,
                        x: result.0,
                        z: result.1,
                        soft_match: result.2,
                    });
                }
            }
        }
        let _ = xplm;
        out.sort_by(|a, b| {
            a.height
                .partial_cmp(&b.height)
                .unwrap()
                .then(a.z.partial_cmp(&b.z).unwrap())
                .then(b.x.partial_cmp(&a.x).unwrap())
        });
        out
    }

    pub fn select_jws(
        xplm: &dyn XplmApi,
        registry: &mut Registry,
        candidates: &mut Vec<JwCtrl>,
        inputs: &PlaneInputs,
    ) -> bool {
        let mut accepted: Vec<JwCtrl> = Vec::new();
        'outer: for mut cand in candidates.drain(..) {
            if !cand.setup_for_door(xplm, registry, inputs, accepted.is_empty()) {
                cand.release(xplm, registry);
                continue;
            }
            for already in &accepted {
                if JwCtrl::collides_extended(registry, already, &cand) {
                    cand.release(xplm, registry);
                    continue 'outer;
                }
            }
            if let Some(jw) = registry_jetway_mut(registry, cand.handle) {
                jw.locked = true;
            }
            accepted.push(cand);
        }
        let any = !accepted.is_empty();
        *candidates = accepted;
        any
    }

    fn collides_extended(registry: &Registry, a: &JwCtrl, b: &JwCtrl) -> bool {
        let (Some(ta), Some(tb)) = (a.target, b.target) else {
            return false;
        };
        let Some(jw_a) = registry_jetway(registry, a.handle) else {
            return false;
        };
        let Some(jw_b) = registry_jetway(registry, b.handle) else {
            return false;
        };
        segments_collide((jw_a.x, jw_a.z), (ta.door_x, 0.0), (jw_b.x, jw_b.z), (tb.door_x, 0.0))
    }

    pub fn setup_for_door(&mut self, _xplm: &dyn XplmApi, registry: &mut Registry, inputs: &PlaneInputs, is_door_zero: bool) -> bool {
        let Some(jw) = registry_jetway(registry, self.handle).cloned() else {
            return false;
        };
        let door_info = inputs.door_info[jw.door.index()];

        let (px, pz) = (jw.x - inputs.x, jw.z - inputs.z);
        let cos_p = inputs.psi.to_radians().cos();
        let sin_p = inputs.psi.to_radians().sin();
        let x = px * cos_p + pz * sin_p - door_info.x;
        let z = -px * sin_p + pz * cos_p - door_info.z;

        let door_x = -jw.geometry.cabin_length;
        let door_z = 0.0_f32;
        let d = len2f(door_x - x, door_z - z);
        let rot1_d = (door_z - z).atan2(door_x - x);
        let mut rot1 = ra(rot1_d.to_degrees() + 90.0 - jw.psi);
        let extent = d - jw.geometry.cabin_pos;
        let mut rot2 = ra(90.0 - jw.psi - rot1);
        if is_door_zero {
            rot2 += 3.0;
        }
        let net_length = d + jw.geometry.cabin_length * rot2.to_radians().cos();
        let y = (jw.y + jw.geometry.height) - (inputs.y + door_info.y);
        let rot3 = -((y / net_length.max(0.01)).clamp(-1.0, 1.0)).asin().to_degrees();

        let extent_in_range = jw.geometry.extent.contains(extent);
        let mut soft_match = false;
        if !extent_in_range {
            let overflow = extent - jw.geometry.extent.max;
            if overflow > 0.0 && overflow <= K_SOFT_MATCH_MAX_EXTRA {
                soft_match = true;
            } else {
                return false;
            }
        }
        if !jw.geometry.rot1.contains(rot1) || !jw.geometry.rot2.contains(rot2) {
            return false;
        }
        rot1 = rot1.clamp(jw.geometry.rot1.min, jw.geometry.rot1.max);

        let parked_x = (jw.geometry.initial_extent + jw.geometry.cabin_pos)
            * (jw.geometry.initial_rot1 + jw.psi - 90.0).to_radians().cos();
        let parked_z = (jw.geometry.initial_extent + jw.geometry.cabin_pos)
            * (jw.geometry.initial_rot1 + jw.psi - 90.0).to_radians().sin();

        self.target = Some(DoorTarget {
            rot1,
            rot2,
            rot3,
            extent: extent.max(jw.geometry.extent.min),
            ap_x: door_x - K_ALIGN_DIST,
            door_x,
            parked_x,
            parked_z,
            soft_match,
        });
        self.soft_match = soft_match;
        true
    }

    pub fn begin_docking(&mut self, start_ts: f32) {
        self.start_ts = start_ts;
        self.dock_phase = DockPhase::ToAp;
        self.wait_wb_rot = false;
    }

    pub fn begin_undocking(&mut self, start_ts: f32) {
        self.start_ts = start_ts;
        self.undock_phase = UndockPhase::ToAp;
    }

    /// Advance the active phase. Returns the delay before the next tick,
    /// or a negative value once this controller is fully done.
    pub fn drive(&mut self, xplm: &dyn XplmApi, registry: &mut Registry, inputs: &PlaneInputs) -> f32 {
        let docking = self.dock_phase != DockPhase::Docked && self.dock_phase != DockPhase::Parked;
        let timed_out = inputs.now > self.start_ts + K_ANIM_TIMEOUT;
        let Some(target) = self.target else { return -1.0 };
        let Some(jw) = registry_jetway_mut(registry, self.handle) else {
            return -1.0;
        };

        if docking {
            match self.dock_phase {
                DockPhase::ToAp => {
                    jw.anim.warnlight = 1;
                    step_toward(&mut jw.anim.rotate1, target.rot1, K_TURN_SPEED);
                    if timed_out || jw.anim.rotate1 == target.rot1 {
                        self.dock_phase = DockPhase::AtAp;
                    }
                }
                DockPhase::AtAp => {
                    step_toward(&mut jw.anim.rotate2, target.rot2, K_TURN_SPEED);
                    step_toward(&mut jw.anim.rotate3, target.rot3, K_TURN_SPEED);
                    if timed_out || (jw.anim.rotate2 == target.rot2 && jw.anim.rotate3 == target.rot3) {
                        self.dock_phase = DockPhase::ToDoor;
                    }
                }
                DockPhase::ToDoor => {
                    step_toward(&mut jw.anim.extent, target.extent, K_DRIVE_SPEED);
                    if timed_out || (jw.anim.extent - target.extent).abs() <= K_ARRIVAL_EPS {
                        jw.anim.extent = target.extent;
                        jw.anim.warnlight = 0;
                        self.dock_phase = DockPhase::Docked;
                        animate_wheels(jw, &mut self.wb_rot, target.rot1);
                        return -1.0;
                    }
                }
                DockPhase::Docked | DockPhase::Parked => return -1.0,
            }
            animate_wheels(jw, &mut self.wb_rot, target.rot1);
            return K_HEIGHT_SPEED.max(0.02);
        }

        match self.undock_phase {
            UndockPhase::ToAp => {
                step_toward(&mut jw.anim.extent, jw.geometry.initial_extent, K_DRIVE_SPEED * 0.5);
                if timed_out || (jw.anim.extent - jw.geometry.initial_extent).abs() <= K_ARRIVAL_EPS {
                    self.undock_phase = UndockPhase::AtAp;
                }
            }
            UndockPhase::AtAp => {
                self.undock_phase = UndockPhase::ToPark;
            }
            UndockPhase::ToPark => {
                step_toward(&mut jw.anim.rotate2, jw.geometry.initial_rot2, K_TURN_SPEED);
                step_toward(&mut jw.anim.rotate3, jw.geometry.initial_rot3, K_TURN_SPEED);
                step_toward(&mut jw.anim.rotate1, jw.geometry.initial_rot1, K_TURN_SPEED);
                let done = jw.anim.rotate1 == jw.geometry.initial_rot1
                    && jw.anim.rotate2 == jw.geometry.initial_rot2
                    && jw.anim.rotate3 == jw.geometry.initial_rot3;
                if timed_out || done {
                    jw.reset();
                    self.undock_phase = UndockPhase::Parked;
                    return -1.0;
                }
            }
            UndockPhase::Parked => return -1.0,
        }
        animate_wheels(jw, &mut self.wb_rot, jw.anim.rotate1);
        let _ = xplm;
        K_HEIGHT_SPEED.max(0.02)
    }

    pub fn release(self, _xplm: &dyn XplmApi, registry: &mut Registry) {
        if let Some(jw) = registry_jetway_mut(registry, self.handle) {
            jw.locked = false;
        }
    }

    pub fn reset_only(self) {}
}

fn step_toward(current: &mut f32, target: f32, rate: f32) {
    let delta = target - *current;
    if delta.abs() <= rate {
        *current = target;
    } else {
        *current += rate.copysign(delta);
    }
}

fn animate_wheels(jw: &mut Jetway, wb_rot: &mut f32, target_rot1: f32) {
    *wb_rot = target_rot1;
    let reverse = ra(*wb_rot - jw.anim.wheelrotatec).abs() > 90.0;
    let sign = if reverse { -1.0 } else { 1.0 };
    let ds = 0.05_f32 * sign;
    if jw.geometry.wheel_diameter > 0.0 {
        let droll = (ds / jw.geometry.wheel_diameter).to_degrees();
        jw.anim.wheelrotatec += droll;
        jw.anim.wheelrotatel += droll;
        jw.anim.wheelrotater += droll;
    }
}

fn registry_jetway(registry: &Registry, handle: JetwayHandle) -> Option<&Jetway> {
    match handle {
        JetwayHandle::Scenery { scenery, jetway } => registry.sceneries.get(scenery)?.jetways.get(jetway),
        JetwayHandle::ZeroConfig(_) => None,
    }
}

fn registry_jetway_mut(registry: &mut Registry, handle: JetwayHandle) -> Option<&mut Jetway> {
    match handle {
        JetwayHandle::Scenery { scenery, jetway } => registry.sceneries.get_mut(scenery)?.jetways.get_mut(jetway),
        JetwayHandle::ZeroConfig(_) => None,
    }
}

/// Quick-reject filter + tentative door-frame position for sorting.
/// Returns `(x, z, soft_match)` in plane-local coordinates on acceptance.
fn evaluate_candidate(jw: &Jetway, inputs: &PlaneInputs) -> Option<(f32, f32, bool)> {
    if jw.locked {
        return None;
    }
    if jw.obj_ref_gen < inputs.ref_gen {
        // stale reference frame: the jetway hasn't been reprojected
        // into the plane's current local-coordinate generation yet
        return None;
    }
    let dx = jw.x - inputs.x;
    let dz = jw.z - inputs.z;
    let cos_p = inputs.psi.to_radians().cos();
    let sin_p = inputs.psi.to_radians().sin();
    let x = dx * cos_p + dz * sin_p;
    let z = -dx * sin_p + dz * cos_p;

    if x > 1.0 {
        return None;
    }
    if x < -80.0 || z.abs() > 80.0 {
        return None;
    }
    let heading_delta = ra(inputs.psi + jw.geometry.initial_rot1);
    if !(-130.0..=20.0).contains(&heading_delta) {
        return None;
    }
    Some((x, z, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_toward_snaps_within_rate() {
        let mut v = 10.0;
        step_toward(&mut v, 10.3, 1.0);
        assert_eq!(v, 10.3);
    }

    #[test]
    fn step_toward_moves_by_rate_when_far() {
        let mut v = 0.0;
        step_toward(&mut v, 100.0, 10.0);
        assert_eq!(v, 10.0);
    }

    #[test]
    fn candidate_rejected_on_right_side() {
        let mut jw = sample_jetway();
        jw.x = 5.0;
        jw.z = 0.0;
        let inputs = PlaneInputs::default();
        assert!(evaluate_candidate(&jw, &inputs).is_none());
    }

    #[test]
    fn candidate_rejected_too_far_behind() {
        let mut jw = sample_jetway();
        jw.x = -100.0;
        let inputs = PlaneInputs::default();
        assert!(evaluate_candidate(&jw, &inputs).is_none());
    }

    #[test]
    fn candidate_rejected_when_stale_reference_frame() {
        let mut jw = sample_jetway();
        jw.obj_ref_gen = 1;
        let inputs = PlaneInputs { ref_gen: 2, ..Default::default() };
        assert!(evaluate_candidate(&jw, &inputs).is_none());
    }

    fn sample_jetway() -> Jetway {
        Jetway {
            name: "J".into(),
            library_id: None,
            lat: 0.0,
            lon: 0.0,
            heading: 0.0,
            door: sam_types::DoorSide::Lf1,
            geometry: sam_types::JwGeometry {
                rot1: Range { min: -90.0, max: 90.0 },
                rot2: Range { min: -90.0, max: 90.0 },
                rot3: Range { min: -90.0, max: 90.0 },
                extent: Range { min: 0.0, max: 10.0 },
                wheels: Range { min: -2.0, max: 2.0 },
                ..Default::default()
            },
            sound: None,
            anim: sam_types::JwAnimState::default(),
            x: -10.0,
            y: 0.0,
            z: 0.0,
            psi: 0.0,
            obj_ref_gen: 1,
            xml_x: -10.0,
            xml_z: 0.0,
            xml_ref_gen: 1,
            locked: false,
            bad: false,
            is_zero_config: false,
            stand_index: None,
        }
    }
}
