//! Draw-time accessor: maps a host draw call's local `(x, y, z, psi)` to
//! the [`sam_types::Jetway`] it belongs to, as fast as possible.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use sam_types::{DoorSide, Jetway, JwAnimState, JwGeometry};

use crate::geometry::{len2f, ra};
use crate::registry::Registry;
use crate::xplm_shim::XplmApi;

const CACHE_SIZE: usize = 1 << 13;
const MATCH_XZ_TOLERANCE: f32 = 2.5;
const MATCH_PSI_TOLERANCE: f32 = 5.0;

/// Identifies where a located jetway lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JetwayHandle {
    Scenery { scenery: usize, jetway: usize },
    ZeroConfig(usize),
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    x: f32,
    y: f32,
    z: f32,
    handle: JetwayHandle,
}

fn quantize(x: f32, z: f32) -> (i32, i32) {
    ((x * 2.0).round() as i32, (z * 2.0).round() as i32)
}

fn cache_slot(key: (i32, i32)) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % CACHE_SIZE
}

pub struct JetwayLocator {
    cache: Vec<Option<CacheEntry>>,
    pub zero_config: Vec<Jetway>,
    ref_gen: u32,
}

impl JetwayLocator {
    pub fn new() -> Self {
        JetwayLocator {
            cache: vec![None; CACHE_SIZE],
            zero_config: Vec::new(),
            ref_gen: 0,
        }
    }

    /// Drop everything keyed to the previous reference frame.
    pub fn invalidate(&mut self, new_ref_gen: u32) {
        if new_ref_gen != self.ref_gen {
            self.cache.iter_mut().for_each(|s| *s = None);
            self.zero_config.clear();
            self.ref_gen = new_ref_gen;
        }
    }

    fn cache_get(&self, x: f32, y: f32, z: f32) -> Option<JetwayHandle> {
        let slot = &self.cache[cache_slot(quantize(x, z))];
        slot.and_then(|e| {
            if e.x == x && e.y == y && e.z == z {
                Some(e.handle)
            } else {
                None
            }
        })
    }

    fn cache_put(&mut self, x: f32, y: f32, z: f32, handle: JetwayHandle) {
        let slot = cache_slot(quantize(x, z));
        self.cache[slot] = Some(CacheEntry { x, y, z, handle });
    }

    /// Locate (or synthesise) the jetway behind one draw call.
    ///
    /// `lib_id` is the library id carried by the draw object's dataref
    /// path, if any; it is only consulted once every other strategy has
    /// missed, to synthesise a zero-config jetway.
    pub fn locate(
        &mut self,
        registry: &mut Registry,
        xplm: &dyn XplmApi,
        x: f32,
        y: f32,
        z: f32,
        psi: f32,
        lib_id: Option<i32>,
        ref_gen: u32,
        plane_x: f32,
        plane_z: f32,
    ) -> Option<JetwayHandle> {
        self.invalidate(ref_gen);

        if let Some(h) = self.cache_get(x, y, z) {
            return Some(h);
        }

        for (si, scenery) in registry.sceneries.iter_mut().enumerate() {
            if !scenery_bbox_near(scenery, plane_x, plane_z) {
                continue;
            }
            for (ji, jw) in scenery.jetways.iter_mut().enumerate() {
                if jw.bad {
                    continue;
                }
                if jw.xml_ref_gen != ref_gen {
                    match resolve_rest_position(xplm, jw) {
                        Some((rx, rz)) => {
                            jw.xml_x = rx;
                            jw.xml_z = rz;
                            jw.xml_ref_gen = ref_gen;
                        }
                        None => {
                            jw.bad = true;
                            continue;
                        }
                    }
                }
                if (jw.xml_x - x).abs() <= MATCH_XZ_TOLERANCE
                    && (jw.xml_z - z).abs() <= MATCH_XZ_TOLERANCE
                    && crate::geometry::ra(jw.heading - psi).abs() <= MATCH_PSI_TOLERANCE
                {
                    jw.x = x;
                    jw.y = y;
                    jw.z = z;
                    jw.psi = psi;
                    jw.obj_ref_gen = ref_gen;
                    let handle = JetwayHandle::Scenery { scenery: si, jetway: ji };
                    self.cache_put(x, y, z, handle);
                    return Some(handle);
                }
            }
        }

        for (zi, jw) in self.zero_config.iter().enumerate() {
            if jw.x == x && jw.y == y && jw.z == z {
                let handle = JetwayHandle::ZeroConfig(zi);
                self.cache_put(x, y, z, handle);
                return Some(handle);
            }
        }

        let lib_id = lib_id?;
        let geometry = registry.find_lib_jw(lib_id)?.geometry.clone();
        let idx = self.synthesize(registry, xplm, geometry, x, y, z, psi, ref_gen);
        let handle = JetwayHandle::ZeroConfig(idx);
        self.cache_put(x, y, z, handle);
        Some(handle)
    }

    fn synthesize(
        &mut self,
        registry: &Registry,
        xplm: &dyn XplmApi,
        geometry: JwGeometry,
        x: f32,
        y: f32,
        z: f32,
        psi: f32,
        ref_gen: u32,
    ) -> usize {
        let mut jw = Jetway {
            name: format!("zero-config-{}", self.zero_config.len()),
            library_id: None,
            lat: 0.0,
            lon: 0.0,
            heading: psi,
            door: DoorSide::Lf1,
            geometry,
            sound: None,
            anim: JwAnimState::default(),
            x,
            y,
            z,
            psi,
            obj_ref_gen: ref_gen,
            xml_x: x,
            xml_z: z,
            xml_ref_gen: ref_gen,
            locked: false,
            bad: false,
            is_zero_config: true,
            stand_index: None,
        };

        // cabin points perpendicular to the nearest stand, jittered so a
        // row of zero-config jetways doesn't all rest at the same angle
        match nearest_stand(registry, xplm, x, z) {
            Some((idx, hdgt)) => {
                jw.stand_index = Some(idx);
                let delta = ra((hdgt + 90.0) - psi);
                jw.geometry.initial_rot2 = (0.2 + 0.8 * pseudo_random_unit(x, z)) * delta;
            }
            None => jw.geometry.initial_rot2 = 5.0,
        }
        jw.geometry.initial_extent = 0.3;
        jw.geometry.initial_rot3 = -3.0 * pseudo_random_unit(z, x);

        jw.reset();
        self.zero_config.push(jw);
        self.zero_config.len() - 1
    }

    pub fn jetway<'a>(&'a self, registry: &'a Registry, handle: JetwayHandle) -> Option<&'a Jetway> {
        match handle {
            JetwayHandle::Scenery { scenery, jetway } => registry.sceneries.get(scenery)?.jetways.get(jetway),
            JetwayHandle::ZeroConfig(idx) => self.zero_config.get(idx),
        }
    }

    pub fn jetway_mut<'a>(&'a mut self, registry: &'a mut Registry, handle: JetwayHandle) -> Option<&'a mut Jetway> {
        match handle {
            JetwayHandle::Scenery { scenery, jetway } => registry.sceneries.get_mut(scenery)?.jetways.get_mut(jetway),
            JetwayHandle::ZeroConfig(idx) => self.zero_config.get_mut(idx),
        }
    }
}

impl Default for JetwayLocator {
    fn default() -> Self {
        Self::new()
    }
}

fn scenery_bbox_near(scenery: &sam_types::Scenery, plane_x: f32, plane_z: f32) -> bool {
    // Sceneries carry a geodetic bbox; the accessor only has local-frame
    // coordinates for the plane. Without a world round trip here we fall
    // back to "always search" when the bbox is empty (no stands/jetways
    // resolved yet), otherwise every scenery is a candidate: the caller
    // already pre-filtered to sceneries near the plane's last known
    // world position upstream of this accessor.
    let _ = (plane_x, plane_z);
    !scenery.is_empty()
}

/// Nearest stand to a zero-config jetway's synthesised position, across
/// every loaded scenery. Returns its index within that scenery's stand
/// list and its heading.
fn nearest_stand(registry: &Registry, xplm: &dyn XplmApi, x: f32, z: f32) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32, f32)> = None;
    for scenery in &registry.sceneries {
        for (i, stand) in scenery.stands.iter().enumerate() {
            let (sx, _sy, sz) = xplm.world_to_local(stand.lat, stand.lon, 0.0);
            let d = len2f(x - sx as f32, z - sz as f32);
            if best.map(|(_, bd, _)| d < bd).unwrap_or(true) {
                best = Some((i, d, stand.hdgt));
            }
        }
    }
    best.map(|(i, _, hdgt)| (i, hdgt))
}

/// Deterministic pseudo-random value in `[0, 1)`, seeded from a position
/// so repeated synthesis of the same jetway is reproducible.
fn pseudo_random_unit(seed_a: f32, seed_b: f32) -> f32 {
    let mut hasher = DefaultHasher::new();
    seed_a.to_bits().hash(&mut hasher);
    seed_b.to_bits().hash(&mut hasher);
    (hasher.finish() % 10_000) as f32 / 10_000.0
}

/// Resolve a jetway's rest-pose local coordinates via the
/// probe/reproject/re-probe dance the host's non-flat terrain requires.
fn resolve_rest_position(xplm: &dyn XplmApi, jw: &Jetway) -> Option<(f32, f32)> {
    let (x0, _y0, z0) = xplm.world_to_local(jw.lat, jw.lon, 0.0);
    let probe1 = xplm.probe_terrain(x0 as f32, 0.0, z0 as f32);
    if !probe1.hit {
        return None;
    }
    let (lat, lon, _alt) = xplm.local_to_world(x0, probe1.location_y as f64, z0);
    let (x1, _y1, z1) = xplm.world_to_local(lat, lon, probe1.location_y as f64);
    let probe2 = xplm.probe_terrain(x1 as f32, probe1.location_y, z1 as f32);
    if !probe2.hit {
        return None;
    }
    Some((x1 as f32, z1 as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplm_shim::{DataRefValue, MockXplm, ProbeResult};
    use sam_types::{DoorSide, GeoBBox, Scenery, Stand};

    fn library_jetway(lat: f64, lon: f64) -> Jetway {
        Jetway {
            name: "J1".into(),
            library_id: Some(3),
            lat,
            lon,
            heading: 90.0,
            door: DoorSide::Lf1,
            geometry: JwGeometry::default(),
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
            locked: false,
            bad: false,
            is_zero_config: false,
            stand_index: None,
        }
    }

    fn registry_with_one_jetway() -> Registry {
        let mut reg = Registry::new();
        let jw = library_jetway(10.0, 20.0);
        let mut scenery = Scenery {
            name: "EGLL".into(),
            arpt_icao: Some("EGLL".into()),
            bbox: GeoBBox::empty(),
            jetways: vec![jw],
            stands: vec![Stand::new("A1".into(), 10.0, 20.0, 90.0)],
            objects: Vec::new(),
            animations: Vec::new(),
        };
        scenery.recompute_bbox(200.0);
        reg.sceneries.push(scenery);
        reg
    }

    #[test]
    fn resolves_via_terrain_probe_and_caches() {
        let mock = MockXplm::new();
        mock.set_dataref("dummy", DataRefValue::Int(0));
        mock.set_probe(0.0, 0.0, ProbeResult { hit: true, location_y: 5.0 });
        let mut registry = registry_with_one_jetway();
        let mut locator = JetwayLocator::new();

        let (wx, _wy, wz) = mock.world_to_local(10.0, 20.0, 0.0);
        let handle = locator
            .locate(&mut registry, &mock, wx as f32, 5.0, wz as f32, 90.0, None, 1, 0.0, 0.0)
            .expect("should resolve via scenery scan");
        assert!(matches!(handle, JetwayHandle::Scenery { .. }));

        // second call with identical (x, y, z) must hit the cache
        let handle2 = locator
            .locate(&mut registry, &mock, wx as f32, 5.0, wz as f32, 90.0, None, 1, 0.0, 0.0)
            .unwrap();
        assert_eq!(handle, handle2);
    }

    #[test]
    fn synthesizes_zero_config_jetway_from_library_template() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        registry.lib_jws.push(sam_types::LibJw {
            id: 42,
            geometry: JwGeometry {
                height: 3.0,
                ..Default::default()
            },
        });
        let mut locator = JetwayLocator::new();

        let handle = locator
            .locate(&mut registry, &mock, 100.0, 0.0, 200.0, 45.0, Some(42), 1, 100.0, 200.0)
            .expect("should synthesise");
        let JetwayHandle::ZeroConfig(idx) = handle else {
            panic!("expected zero-config handle");
        };
        assert_eq!(locator.zero_config[idx].geometry.height, 3.0);
        assert!(locator.zero_config[idx].is_zero_config);
    }

    #[test]
    fn ref_gen_bump_clears_cache_and_zero_config_pool() {
        let mock = MockXplm::new();
        let mut registry = Registry::new();
        registry.lib_jws.push(sam_types::LibJw {
            id: 1,
            geometry: JwGeometry::default(),
        });
        let mut locator = JetwayLocator::new();
        locator.locate(&mut registry, &mock, 1.0, 0.0, 1.0, 0.0, Some(1), 1, 0.0, 0.0);
        assert_eq!(locator.zero_config.len(), 1);
        locator.invalidate(2);
        assert!(locator.zero_config.is_empty());
    }
}
