//! Shared data model for the scenery animation manager.
//!
//! These types are owned by the scenery registry and mutated by the jetway
//! and DGS state machines. They carry `serde` derives so the manifest tool
//! can dump a parsed scenery pack to JSON without duplicating field lists.

use serde::{Deserialize, Serialize};

/// Side of the aircraft a jetway's manifest entry was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorSide {
    Lf1,
    Lf2,
    Lu1,
}

impl Default for DoorSide {
    fn default() -> Self {
        DoorSide::Lf1
    }
}

impl DoorSide {
    /// Index into a plane's `[DoorInfo; MAX_DOOR]` table.
    pub fn index(self) -> usize {
        match self {
            DoorSide::Lf1 => 0,
            DoorSide::Lf2 => 1,
            DoorSide::Lu1 => 2,
        }
    }
}

/// Axis-aligned bounding box in geodetic coordinates, inflated so the
/// cheap first-cut filter (`in_bbox`) never false-negatives a candidate
/// that a later, precise check would have accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoBBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoBBox {
    /// metres per degree of latitude, used to size bbox inflation.
    pub const LAT2M: f64 = 111_120.0;

    pub fn empty() -> Self {
        GeoBBox {
            lat_min: f64::MAX,
            lat_max: f64::MIN,
            lon_min: f64::MAX,
            lon_max: f64::MIN,
        }
    }

    pub fn grow(&mut self, lat: f64, lon: f64, pad_m: f64) {
        let dlat = pad_m / Self::LAT2M;
        let lat_rad = lat.to_radians();
        let dlon = if lat_rad.cos().abs() > 1e-6 {
            pad_m / (Self::LAT2M * lat_rad.cos())
        } else {
            180.0
        };
        self.lat_min = self.lat_min.min(lat - dlat);
        self.lat_max = self.lat_max.max(lat + dlat);
        self.lon_min = self.lon_min.min(lon - dlon);
        self.lon_max = self.lon_max.max(lon + dlon);
    }

    /// Anti-meridian-safe containment test; longitude compares via a
    /// relative-angle normalisation so a pack straddling +/-180 degrees
    /// still matches.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        crate::geometry::ra64(lon - self.lon_min) >= 0.0
            && crate::geometry::ra64(lon - self.lon_max) <= 0.0
    }
}

/// Minimal geometry helpers shared by every consumer of lat/lon deltas.
/// Most of the 2D vector math used by jetway kinematics lives in the
/// plugin crate (it operates on live state, not the data model), but the
/// relative-angle normalisation is needed by `GeoBBox` too, so it lives
/// here and is re-exported.
pub mod geometry {
    /// Normalise an angle in degrees to `(-180, 180]`.
    pub fn ra64(mut a: f64) -> f64 {
        while a > 180.0 {
            a -= 360.0;
        }
        while a <= -180.0 {
            a += 360.0;
        }
        a
    }

    pub fn ra(mut a: f32) -> f32 {
        while a > 180.0 {
            a -= 360.0;
        }
        while a <= -180.0 {
            a += 360.0;
        }
        a
    }
}

/// One aircraft parking position on an apron.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stand {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// heading in `(-180, 180]` degrees
    pub hdgt: f32,
    pub sin_hdgt: f32,
    pub cos_hdgt: f32,

    /// local-frame cache, valid only while `ref_gen == Registry::ref_gen()`
    #[serde(skip)]
    pub stand_x: f32,
    #[serde(skip)]
    pub stand_y: f32,
    #[serde(skip)]
    pub stand_z: f32,
    #[serde(skip)]
    pub ref_gen: u32,
}

impl Stand {
    pub fn new(id: String, lat: f64, lon: f64, hdgt: f32) -> Self {
        let hdgt = geometry::ra(hdgt);
        Stand {
            id,
            lat,
            lon,
            hdgt,
            sin_hdgt: hdgt.to_radians().sin(),
            cos_hdgt: hdgt.to_radians().cos(),
            stand_x: 0.0,
            stand_y: 0.0,
            stand_z: 0.0,
            ref_gen: 0,
        }
    }

    /// Transform a global local-frame point into this stand's frame.
    pub fn global_to_stand(&self, x: f32, z: f32) -> (f32, f32) {
        let dx = x - self.stand_x;
        let dz = z - self.stand_z;
        let x_l = dx * self.cos_hdgt + dz * self.sin_hdgt;
        let z_l = -dx * self.sin_hdgt + dz * self.cos_hdgt;
        (x_l, z_l)
    }
}

/// Motion-limit pair used throughout [`Jetway`] and [`LibJw`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Geometric parameters and motion limits shared between a manifest
/// `<jetway>` entry and a library `<set>` template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwGeometry {
    pub height: f32,
    pub wheel_pos: f32,
    pub cabin_pos: f32,
    pub cabin_length: f32,
    pub wheel_diameter: f32,
    pub wheel_distance: f32,
    pub rot1: Range,
    pub rot2: Range,
    pub rot3: Range,
    pub extent: Range,
    pub wheels: Range,
    pub initial_rot1: f32,
    pub initial_rot2: f32,
    pub initial_rot3: f32,
    pub initial_extent: f32,
}

/// A library jetway template, looked up by id and back-filled onto a
/// [`Jetway`] that declares a `library_id` but has no manifest geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibJw {
    pub id: i32,
    pub geometry: JwGeometry,
}

/// Current, per-frame animation outputs served to the host's dataref
/// accessors while drawing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JwAnimState {
    pub rotate1: f32,
    pub rotate2: f32,
    pub rotate3: f32,
    pub extent: f32,
    pub wheels: f32,
    pub wheelrotatec: f32,
    pub wheelrotatel: f32,
    pub wheelrotater: f32,
    pub warnlight: i32,
}

/// The abstract jetway entity: manifest-declared geometry plus the
/// mutable, host-frame-relative state two state machines collaborate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jetway {
    pub name: String,
    pub library_id: Option<i32>,
    pub lat: f64,
    pub lon: f64,
    pub heading: f32,
    pub door: DoorSide,
    pub geometry: JwGeometry,
    pub sound: Option<String>,

    pub anim: JwAnimState,

    /// local-frame draw coordinates, valid only while `obj_ref_gen == ref_gen`
    #[serde(skip)]
    pub x: f32,
    #[serde(skip)]
    pub y: f32,
    #[serde(skip)]
    pub z: f32,
    #[serde(skip)]
    pub psi: f32,
    #[serde(skip)]
    pub obj_ref_gen: u32,

    /// world-probed rest coordinates cached on first successful terrain probe
    #[serde(skip)]
    pub xml_x: f32,
    #[serde(skip)]
    pub xml_z: f32,
    #[serde(skip)]
    pub xml_ref_gen: u32,

    /// at most one `JwCtrl` may hold this true at a time
    #[serde(skip)]
    pub locked: bool,
    /// terrain probe failed permanently; never matched again
    #[serde(skip)]
    pub bad: bool,
    /// true for jetways synthesised at draw time for unrecognised instances
    #[serde(skip)]
    pub is_zero_config: bool,
    /// non-owning index into the owning scenery's `stands`, set for
    /// zero-config jetways snapped to a stand at creation
    #[serde(skip)]
    pub stand_index: Option<usize>,
}

impl Jetway {
    /// Reset animation state to the manifest rest pose.
    pub fn reset(&mut self) {
        self.anim.rotate1 = self.geometry.initial_rot1;
        self.anim.rotate2 = self.geometry.initial_rot2;
        self.anim.rotate3 = self.geometry.initial_rot3;
        self.anim.extent = self.geometry.initial_extent;
        self.anim.wheels =
            self.anim.rotate3.to_radians().tan() * (self.geometry.wheel_pos + self.anim.extent);
        self.anim.warnlight = 0;
        self.locked = false;
    }
}

/// One (t, v) sample of an animation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimKey {
    pub t: f32,
    pub v: f32,
}

/// A piecewise-linear animation curve bound to a named host dataref.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Animation {
    pub dataref: String,
    pub autoplay: bool,
    pub randomize_phase: bool,
    pub augment_wind_speed: bool,
    pub keys: Vec<AnimKey>,
}

impl Animation {
    /// Linear-interpolate the curve at `t`, clamping to the end segments.
    pub fn sample(&self, t: f32) -> f32 {
        let keys = &self.keys;
        if keys.is_empty() {
            return 0.0;
        }
        if t <= keys[0].t {
            return keys[0].v;
        }
        if t >= keys[keys.len() - 1].t {
            return keys[keys.len() - 1].v;
        }
        for w in keys.windows(2) {
            let (a, b) = (w[0], w[1]);
            if t >= a.t && t <= b.t {
                let span = b.t - a.t;
                if span.abs() < f32::EPSILON {
                    return b.v;
                }
                let f = (t - a.t) / span;
                return a.v + f * (b.v - a.v);
            }
        }
        keys[keys.len() - 1].v
    }
}

/// A scenery-placed static/animated instance (`<objects><instance .../>`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimatedObject {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub elevation: f32,
    pub heading: f32,
}

/// A single parsed `sam.xml` + `apt.dat` manifest for one scenery pack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenery {
    pub name: String,
    pub arpt_icao: Option<String>,
    pub bbox: GeoBBox,
    pub jetways: Vec<Jetway>,
    pub stands: Vec<Stand>,
    pub objects: Vec<AnimatedObject>,
    pub animations: Vec<Animation>,
}

impl Scenery {
    pub fn is_empty(&self) -> bool {
        self.jetways.is_empty() && self.stands.is_empty() && self.objects.is_empty()
    }

    pub fn recompute_bbox(&mut self, pad_m: f64) {
        let mut bbox = GeoBBox::empty();
        for jw in &self.jetways {
            bbox.grow(jw.lat, jw.lon, pad_m);
        }
        for st in &self.stands {
            bbox.grow(st.lat, st.lon, pad_m);
        }
        self.bbox = bbox;
    }
}

/// Up to `MAX_DOOR` door offsets `(x, y, z)` in the plane's local frame,
/// one per `DoorSide`.
pub const MAX_DOOR: usize = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DoorInfo {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_anti_meridian() {
        let mut bbox = GeoBBox::empty();
        bbox.grow(10.0, 179.9, 1000.0);
        assert!(bbox.contains(10.0, 179.99));
        assert!(bbox.contains(10.0, -179.99));
        assert!(!bbox.contains(10.0, 170.0));
    }

    #[test]
    fn jetway_reset_matches_invariants() {
        let mut jw = Jetway {
            name: "A1".into(),
            library_id: None,
            lat: 0.0,
            lon: 0.0,
            heading: 0.0,
            door: DoorSide::Lf1,
            geometry: JwGeometry {
                wheel_pos: 5.0,
                initial_rot1: 10.0,
                initial_rot2: -5.0,
                initial_rot3: 0.0,
                initial_extent: 2.0,
                ..Default::default()
            },
            sound: None,
            anim: JwAnimState::default(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            psi: 0.0,
            obj_ref_gen: 0,
            xml_x: 0.0,
            xml_z: 0.0,
            xml_ref_gen: 0,
            locked: true,
            bad: false,
            is_zero_config: false,
            stand_index: None,
        };
        jw.reset();
        assert_eq!(jw.anim.rotate1, 10.0);
        assert_eq!(jw.anim.extent, 2.0);
        assert_eq!(jw.anim.warnlight, 0);
        assert!(!jw.locked);
        assert!((jw.anim.wheels - 0.0_f32.tan() * 7.0).abs() < 1e-6);
    }

    #[test]
    fn animation_sample_interpolates() {
        let anim = Animation {
            dataref: "d".into(),
            autoplay: true,
            randomize_phase: false,
            augment_wind_speed: false,
            keys: vec![
                AnimKey { t: 0.0, v: 0.0 },
                AnimKey { t: 10.0, v: 1.0 },
            ],
        };
        assert_eq!(anim.sample(-1.0), 0.0);
        assert_eq!(anim.sample(5.0), 0.5);
        assert_eq!(anim.sample(20.0), 1.0);
    }

    #[test]
    fn stand_roundtrips_through_json() {
        let stand = Stand::new("A1".into(), 10.0, 20.0, 90.0);
        let s = serde_json::to_string(&stand).unwrap();
        let back: Stand = serde_json::from_str(&s).unwrap();
        assert_eq!(back.id, "A1");
        assert!((back.hdgt - 90.0).abs() < 1e-6);
    }
}
