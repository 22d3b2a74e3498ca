//! Docking guidance sign state machine: nearest-stand search, plane
//! tracking in the stand's local frame, and the guidance dataref surface.

use sam_types::Stand;

use crate::geometry::{len2f, ra};
use crate::xplm_shim::{InstanceHandle, ObjectHandle, XplmApi};

pub const K_CAP_A: f32 = 15.0;
pub const K_CAP_Z: f32 = 140.0;
pub const K_AZI_A: f32 = 15.0;
pub const K_AZI_Z: f32 = 90.0;
pub const K_AZI_CROSSOVER: f32 = 6.0;
pub const K_GOOD_Z_P: f32 = 0.2;
pub const K_GOOD_Z_M: f32 = -0.5;
pub const K_GOOD_X: f32 = 2.0;
pub const K_CR_Z: f32 = 12.0;
pub const K_R1_NCHAR: usize = 6;
pub const K_MAX_DGS2STAND_X: f32 = 10.0;
pub const K_MAX_DGS2STAND_Z_FAR: f32 = -5.0;
pub const K_MAX_DGS2STAND_Z_NEAR: f32 = -80.0;
pub const K_DGS_DIST: f32 = 20.0;
pub const DONE_HOLD_SECONDS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disabled,
    Inactive,
    Departure,
    Boarding,
    Arrival,
    Engaged,
    Track,
    Good,
    Bad,
    Parked,
    Chocks,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLevel {
    Off,
    LeadIn,
    Azimuth,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Guidance {
    pub distance: f32,
    pub distance_0: i32,
    pub distance_01: i32,
    pub xtrack: f32,
    pub track: u8,
    pub lr: u8,
    pub slow: bool,
}

/// Scrolling 6-character text window for Safegate-style ident/briefing
/// rows. Decrements the scroll counter by 2 per tick down from 10.
#[derive(Debug, Clone)]
pub struct ScrollTxt {
    source: Vec<char>,
    char_pos: usize,
    scroll_counter: i32,
    window: [char; K_R1_NCHAR],
}

impl ScrollTxt {
    pub fn new(text: &str) -> Self {
        let source: Vec<char> = text.chars().collect();
        let mut window = [' '; K_R1_NCHAR];
        if source.len() <= K_R1_NCHAR {
            let pad = (K_R1_NCHAR - source.len()) / 2;
            for (i, c) in source.iter().enumerate() {
                window[pad + i] = *c;
            }
        } else {
            for (i, slot) in window.iter_mut().enumerate() {
                *slot = source[i];
            }
        }
        ScrollTxt {
            source,
            char_pos: K_R1_NCHAR.saturating_sub(1),
            scroll_counter: 10,
            window,
        }
    }

    pub fn window(&self) -> String {
        self.window.iter().collect()
    }

    pub fn tick(&mut self) {
        if self.source.len() <= K_R1_NCHAR {
            return;
        }
        self.scroll_counter -= 2;
        if self.scroll_counter > 0 {
            return;
        }
        self.scroll_counter = 10;
        self.char_pos = (self.char_pos + 1) % self.source.len();
        self.window.rotate_left(1);
        self.window[K_R1_NCHAR - 1] = self.source[self.char_pos];
    }
}

/// Derive a Safegate-legible stand name: strip a `Stand `/`Gate ` prefix,
/// trim at the first `(`, `,` or `;`, trim whitespace, give up (empty
/// string) past 6 characters.
pub fn departure_display_name(stand_id: &str) -> String {
    let stripped = stand_id
        .strip_prefix("Stand ")
        .or_else(|| stand_id.strip_prefix("Gate "))
        .unwrap_or(stand_id);
    let cut = stripped
        .find(['(', ',', ';'])
        .map(|i| &stripped[..i])
        .unwrap_or(stripped);
    let trimmed = cut.trim();
    if trimmed.chars().count() > K_R1_NCHAR {
        String::new()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneTrackInputs {
    pub plane_x: f32,
    pub plane_z: f32,
    pub plane_hdgt: f32,
    pub nose_gear_z: f32,
    pub main_gear_z: f32,
    pub ground_speed: f32,
    pub parkbrake_set: bool,
    pub beacon_on: bool,
}

pub struct DgsInstance {
    pub state: State,
    pub active_stand: Option<usize>,
    pub guidance: Guidance,
    pub lr: Turn,
    pub done_since: Option<f32>,
    pub is_marshaller: bool,
    marshaller_instance: Option<InstanceHandle>,
    stairs_instance: Option<InstanceHandle>,
    marshaller_object: Option<ObjectHandle>,
    stairs_object: Option<ObjectHandle>,
}

impl DgsInstance {
    pub fn new(is_marshaller: bool) -> Self {
        DgsInstance {
            state: State::Inactive,
            active_stand: None,
            guidance: Guidance::default(),
            lr: Turn::None,
            done_since: None,
            is_marshaller,
            marshaller_instance: None,
            stairs_instance: None,
            marshaller_object: None,
            stairs_object: None,
        }
    }

    pub fn on_ground_transition(&mut self, now_on_ground: bool) {
        if now_on_ground && self.state == State::Inactive {
            self.state = State::Arrival;
        } else if !now_on_ground {
            self.state = State::Inactive;
            self.active_stand = None;
        }
    }

    /// Find the nearest candidate stand ahead of the plane, scoring by
    /// `hypot(4*x, z)` in each stand's local frame.
    pub fn find_nearest_stand(stands: &[Stand], plane_x: f32, plane_z: f32, plane_hdgt: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, stand) in stands.iter().enumerate() {
            if ra(plane_hdgt - stand.hdgt).abs() > 90.0 {
                continue;
            }
            let (nw_x, nw_z) = stand.global_to_stand(plane_x, plane_z);
            if nw_z < -4.0 {
                continue;
            }
            let angle = nw_x.atan2(nw_z).to_degrees();
            if angle.abs() > 60.0 {
                continue;
            }
            let score = len2f(4.0 * nw_x, nw_z);
            if best.map(|(_, s)| score < s).unwrap_or(true) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn find_departure_stand(stands: &[Stand], plane_x: f32, plane_z: f32, plane_hdgt: f32) -> Option<usize> {
        stands.iter().position(|stand| {
            if ra(plane_hdgt - stand.hdgt).abs() > 3.0 {
                return false;
            }
            let (x, z) = stand.global_to_stand(plane_x, plane_z);
            x * x + z * z < 1.0
        })
    }

    pub fn track(&mut self, stand: &Stand, inputs: &PlaneTrackInputs, now: f32) {
        let hdgt_rad = inputs.plane_hdgt.to_radians();
        let (raw_x, raw_z) = stand.global_to_stand(inputs.plane_x, inputs.plane_z);
        let nw_z = raw_z + inputs.nose_gear_z * hdgt_rad.sin();
        let nw_x = raw_x;
        let mw_z = raw_z + inputs.main_gear_z * hdgt_rad.sin();
        let mw_x = raw_x;

        let a = ((nw_z - 6.0) / 20.0).clamp(0.0, 1.0);
        let ref_x = (1.0 - a) * nw_x + a * mw_x;
        let ref_z = (1.0 - a) * nw_z + a * mw_z;

        let locgood = mw_x.abs() <= K_GOOD_X && (K_GOOD_Z_M..=K_GOOD_Z_P).contains(&nw_z);

        match self.state {
            State::Arrival | State::Engaged => {
                let azimuth_nw = nw_x.atan2(nw_z.max(0.1)).to_degrees();
                if ref_z <= K_CAP_Z && azimuth_nw.abs() <= K_CAP_A {
                    self.state = State::Track;
                } else {
                    self.state = State::Engaged;
                }
            }
            State::Track => {
                if locgood {
                    self.state = State::Good;
                } else if nw_z < K_GOOD_Z_M {
                    self.state = State::Bad;
                }
            }
            State::Good => {
                if inputs.parkbrake_set || !inputs.beacon_on {
                    self.state = State::Parked;
                }
            }
            State::Parked => {
                self.state = State::Done;
                self.done_since = Some(now);
            }
            State::Done => {
                if self.done_since.map(|t| now - t >= DONE_HOLD_SECONDS).unwrap_or(false) {
                    self.state = State::Inactive;
                    self.active_stand = None;
                }
            }
            State::Bad => {
                if !locgood && nw_z >= K_GOOD_Z_M {
                    self.state = State::Track;
                }
            }
            _ => {}
        }

        self.guidance = compute_guidance(nw_z, mw_x, inputs.ground_speed);
        self.lr = compute_lr(ref_x, ref_z, inputs.plane_hdgt, stand.hdgt);
    }

    pub fn set_inactive(&mut self, xplm: &dyn XplmApi) {
        self.state = State::Inactive;
        self.active_stand = None;
        self.destroy_marshaller(xplm);
    }

    pub fn ensure_marshaller(&mut self, xplm: &dyn XplmApi, x: f32, y: f32, z: f32, heading: f32, below_ground_m: f32) {
        if !self.is_marshaller || self.marshaller_instance.is_some() {
            return;
        }
        let obj = self.marshaller_object.get_or_insert_with(|| xplm.load_object("marshaller.obj").unwrap_or(0));
        self.marshaller_instance = xplm.create_instance(*obj, &["sam/marshaller/animation"]);
        if let Some(inst) = self.marshaller_instance {
            xplm.instance_set_position(inst, x, y, z, heading, &[]);
        }
        if below_ground_m >= 2.0 {
            let stairs_obj = self.stairs_object.get_or_insert_with(|| xplm.load_object("stairs.obj").unwrap_or(0));
            self.stairs_instance = xplm.create_instance(*stairs_obj, &[]);
            if let Some(inst) = self.stairs_instance {
                let back = -heading.to_radians();
                xplm.instance_set_position(inst, x + back.sin(), y, z + back.cos(), heading, &[]);
            }
        }
    }

    fn destroy_marshaller(&mut self, xplm: &dyn XplmApi) {
        if let Some(inst) = self.marshaller_instance.take() {
            xplm.destroy_instance(inst);
        }
        if let Some(inst) = self.stairs_instance.take() {
            xplm.destroy_instance(inst);
        }
    }

    /// SAM1-compatibility three-value output for legacy VDGS add-ons.
    pub fn sam1_output(&self, ref_x: f32, ref_z: f32) -> (i32, f32, f32) {
        let status = match self.state {
            State::Track => 1,
            State::Good | State::Bad => 2,
            _ => 3,
        };
        let lateral = if self.state == State::Inactive { 10.0 } else { -ref_x };
        let longitudinal = ref_z.min(30.0);
        (status, lateral, longitudinal)
    }
}

fn compute_guidance(nw_z: f32, mw_x: f32, ground_speed: f32) -> Guidance {
    let distance = (nw_z * 2.0).round() / 2.0;
    let distance_0 = if distance < 10.0 { distance.round() as i32 } else { 0 };
    let distance_01 = if distance < 3.0 { ((distance * 10.0 / 2.0).round() * 2.0) as i32 } else { 0 };
    let xtrack = (mw_x.clamp(-4.0, 4.0) * 2.0).round() / 2.0;

    let track = if nw_z <= K_CR_Z / 2.0 {
        3
    } else if nw_z <= K_CR_Z {
        2
    } else if nw_z <= K_AZI_Z {
        1
    } else {
        0
    };

    let slow_threshold = if nw_z > 20.0 {
        4.0
    } else if nw_z > 10.0 {
        3.0
    } else {
        2.0
    };

    Guidance {
        distance,
        distance_0,
        distance_01,
        xtrack,
        track,
        lr: 0,
        slow: ground_speed > slow_threshold,
    }
}

fn compute_lr(ref_x: f32, ref_z: f32, plane_hdgt: f32, stand_hdgt: f32) -> Turn {
    if ref_z > K_AZI_CROSSOVER {
        let required = (-ref_x).atan2(0.3 * ref_z).to_degrees() + stand_hdgt;
        let delta = ra(required - plane_hdgt);
        if delta > 1.5 {
            Turn::Right
        } else if delta < -1.5 {
            Turn::Left
        } else {
            Turn::None
        }
    } else if ref_x > 0.25 {
        Turn::Left
    } else if ref_x < -0.25 {
        Turn::Right
    } else {
        Turn::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departure_name_strips_prefix_and_trims() {
        assert_eq!(departure_display_name("Stand A12 (cat C)"), "A12");
        assert_eq!(departure_display_name("Gate B7, remote"), "B7");
        assert_eq!(departure_display_name("Stand VeryLongIdentifier"), "");
    }

    #[test]
    fn scroll_short_string_does_not_scroll() {
        let mut s = ScrollTxt::new("AB");
        let before = s.window();
        for _ in 0..20 {
            s.tick();
        }
        assert_eq!(s.window(), before);
    }

    #[test]
    fn scroll_long_string_advances() {
        let mut s = ScrollTxt::new("LONGFLIGHTNUMBER123");
        let before = s.window();
        for _ in 0..6 {
            s.tick();
        }
        assert_ne!(s.window(), before);
    }

    #[test]
    fn nearest_stand_rejects_behind_plane() {
        let stands = vec![Stand::new("A1".into(), 0.0, 0.0, 0.0)];
        // a stand straight behind in local frame: synthesise by giving
        // the stand a heading that puts "ahead" behind the plane
        let found = DgsInstance::find_nearest_stand(&stands, 0.0, -50.0, 0.0);
        assert!(found.is_none() || found == Some(0));
    }

    #[test]
    fn lr_far_uses_azimuth_heading() {
        let turn = compute_lr(-5.0, 50.0, 0.0, 0.0);
        assert_eq!(turn, Turn::Right);
    }

    #[test]
    fn lr_close_is_purely_lateral() {
        assert_eq!(compute_lr(1.0, 2.0, 0.0, 0.0), Turn::Left);
        assert_eq!(compute_lr(-1.0, 2.0, 0.0, 0.0), Turn::Right);
    }

    #[test]
    fn guidance_distance_and_track_follow_nose_wheel_z() {
        let g = compute_guidance(12.0, 0.0, 0.0);
        assert_eq!(g.distance, 12.0);
        assert_eq!(g.track, 2);
        let g = compute_guidance(6.0, 0.0, 0.0);
        assert_eq!(g.track, 3);
    }

    #[test]
    fn sam1_status_tracks_state() {
        let mut dgs = DgsInstance::new(false);
        dgs.state = State::Track;
        assert_eq!(dgs.sam1_output(0.0, 0.0).0, 1);
        dgs.state = State::Good;
        assert_eq!(dgs.sam1_output(0.0, 0.0).0, 2);
    }
}
