//! Scenery enumeration and manifest parsing.
//!
//! Walks `scenery_packs.ini`, then for every non-skipped pack parses
//! `sam.xml` and `Earth nav data/apt.dat` into a [`Scenery`]. Per-entity
//! errors are logged and the offending entry is dropped; only a missing
//! library pack or an unparseable manifest root aborts the whole load.

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use sam_types::{AnimKey, Animation, AnimatedObject, DoorSide, GeoBBox, Jetway, JwAnimState, JwGeometry, LibJw, Range, Scenery, Stand};

use crate::errors::OsError;

/// A rejected manifest entry, surfaced to the offline tool and logged by
/// the plugin.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub reason: String,
    pub detail: String,
}

pub struct Registry {
    pub sceneries: Vec<Scenery>,
    pub lib_jws: Vec<LibJw>,
    pub sam_library_installed: bool,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            sceneries: Vec::new(),
            lib_jws: Vec::new(),
            sam_library_installed: false,
        }
    }

    pub fn find_lib_jw(&self, id: i32) -> Option<&LibJw> {
        self.lib_jws.iter().find(|l| l.id == id)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry parsed out of `scenery_packs.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackKind {
    Library,
    CompatLibrary,
    Regular,
}

pub fn parse_scenery_packs_ini(contents: &str) -> Vec<(PathBuf, PackKind)> {
    let mut packs = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("SCENERY_PACK") else {
            continue;
        };
        let path = rest.trim();
        if path.contains("*GLOBAL_AIRPORTS*") || path.contains("/z_ao_") {
            continue;
        }
        let kind = if path.contains("/openSAM_Library/") {
            PackKind::Library
        } else if path.contains("/SAM_Library/") {
            PackKind::CompatLibrary
        } else {
            PackKind::Regular
        };
        packs.push((PathBuf::from(path), kind));
    }
    packs
}

/// Load every scenery pack named by `scenery_packs.ini` under `xp_root`.
///
/// Returns an error only for a missing mandatory library pack; per-pack
/// and per-entity failures are accumulated into `rejections` and logged
/// by the caller.
pub fn load_all(
    xp_root: &Path,
    rejections: &mut Vec<Rejection>,
) -> Result<Registry, OsError> {
    let ini_path = xp_root.join("Custom Scenery/scenery_packs.ini");
    let ini = std::fs::read_to_string(&ini_path).map_err(|e| OsError::Io {
        path: ini_path.display().to_string(),
        source: e,
    })?;

    let packs = parse_scenery_packs_ini(&ini);
    if !packs.iter().any(|(_, k)| *k == PackKind::Library) {
        return Err(OsError::MissingLibraryPack);
    }

    let mut registry = Registry::new();
    registry.sam_library_installed = packs.iter().any(|(_, k)| *k == PackKind::CompatLibrary);

    for (rel, kind) in &packs {
        let pack_dir = xp_root.join(rel);

        // libraryjetways.xml supplies extra library templates and is read
        // for every pack, independent of whether that pack also has its
        // own sam.xml.
        let lib_jw_path = pack_dir.join("libraryjetways.xml");
        if let Ok(xml) = std::fs::read_to_string(&lib_jw_path) {
            match parse_sam_xml(&xml, rejections) {
                Ok((_, lib_jws)) => registry.lib_jws.extend(lib_jws),
                Err(reason) => rejections.push(Rejection {
                    reason: "unparseable manifest root".into(),
                    detail: format!("{}: {reason}", lib_jw_path.display()),
                }),
            }
        }

        let xml_path = pack_dir.join("sam.xml");
        let Ok(xml) = std::fs::read_to_string(&xml_path) else {
            continue; // packs with no sam.xml are ordinary non-SAM scenery
        };

        let (mut scenery, lib_jws) = match parse_sam_xml(&xml, rejections) {
            Ok(v) => v,
            Err(reason) => {
                rejections.push(Rejection {
                    reason: "unparseable manifest root".into(),
                    detail: format!("{}: {reason}", xml_path.display()),
                });
                continue;
            }
        };
        registry.lib_jws.extend(lib_jws);

        if *kind == PackKind::Library {
            continue;
        }

        let apt_path = pack_dir.join("Earth nav data/apt.dat");
        if let Ok(apt) = std::fs::read_to_string(&apt_path) {
            parse_apt_dat(&apt, &mut scenery);
        }

        scenery.recompute_bbox(200.0);
        if !scenery.is_empty() {
            registry.sceneries.push(scenery);
        }
    }

    Ok(registry)
}

fn attr_str(e: &quick_xml::events::BytesStart, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == key.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn attr_f32(e: &quick_xml::events::BytesStart, key: &str) -> Option<f32> {
    attr_str(e, key)?.parse().ok()
}

fn attr_f64(e: &quick_xml::events::BytesStart, key: &str) -> Option<f64> {
    attr_str(e, key)?.parse().ok()
}

fn attr_i32(e: &quick_xml::events::BytesStart, key: &str) -> Option<i32> {
    attr_str(e, key)?.parse().ok()
}

fn attr_bool(e: &quick_xml::events::BytesStart, key: &str) -> bool {
    matches!(attr_str(e, key).as_deref(), Some("true") | Some("1"))
}

fn door_side(raw: Option<String>) -> DoorSide {
    match raw.as_deref() {
        Some("LF2") => DoorSide::Lf2,
        Some("LU1") => DoorSide::Lu1,
        _ => DoorSide::Lf1,
    }
}

fn geometry_from_attrs(e: &quick_xml::events::BytesStart) -> JwGeometry {
    JwGeometry {
        height: attr_f32(e, "height").unwrap_or(0.0),
        wheel_pos: attr_f32(e, "wheelPos").unwrap_or(0.0),
        cabin_pos: attr_f32(e, "cabinPos").unwrap_or(0.0),
        cabin_length: attr_f32(e, "cabinLength").unwrap_or(0.0),
        wheel_diameter: attr_f32(e, "wheelDiameter").unwrap_or(0.0),
        wheel_distance: attr_f32(e, "wheelDistance").unwrap_or(0.0),
        rot1: Range {
            min: attr_f32(e, "minRot1").unwrap_or(-90.0),
            max: attr_f32(e, "maxRot1").unwrap_or(90.0),
        },
        rot2: Range {
            min: attr_f32(e, "minRot2").unwrap_or(-90.0),
            max: attr_f32(e, "maxRot2").unwrap_or(90.0),
        },
        rot3: Range {
            min: attr_f32(e, "minRot3").unwrap_or(-90.0),
            max: attr_f32(e, "maxRot3").unwrap_or(90.0),
        },
        extent: Range {
            min: attr_f32(e, "minExtent").unwrap_or(0.0),
            max: attr_f32(e, "maxExtent").unwrap_or(0.0),
        },
        wheels: Range {
            min: attr_f32(e, "minWheels").unwrap_or(-2.0),
            max: attr_f32(e, "maxWheels").unwrap_or(2.0),
        },
        initial_rot1: attr_f32(e, "initialRot1").unwrap_or(0.0),
        initial_rot2: attr_f32(e, "initialRot2").unwrap_or(0.0),
        initial_rot3: attr_f32(e, "initialRot3").unwrap_or(0.0),
        initial_extent: attr_f32(e, "initialExtent").unwrap_or(0.0),
    }
}

/// Parse one `sam.xml` document. Returns `(scenery-without-stands,
/// library-templates-declared-in-this-file)`, or `Err(reason)` if the
/// document root can't be walked at all (not well-formed XML).
pub fn parse_sam_xml(xml: &str, rejections: &mut Vec<Rejection>) -> Result<(Scenery, Vec<LibJw>), String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut scenery = Scenery::default();
    let mut lib_jws: Vec<LibJw> = Vec::new();
    let mut current_dataref: Option<Animation> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"jetway" => match build_jetway(&e) {
                        Ok(jw) => scenery.jetways.push(jw),
                        Err(reason) => rejections.push(Rejection {
                            reason,
                            detail: attr_str(&e, "name").unwrap_or_default(),
                        }),
                    },
                    b"set" => {
                        let Some(id) = attr_i32(&e, "id") else {
                            rejections.push(Rejection {
                                reason: "library set missing id".into(),
                                detail: String::new(),
                            });
                            continue;
                        };
                        if lib_jws.iter().any(|l| l.id == id) {
                            rejections.push(Rejection {
                                reason: "duplicate library template id".into(),
                                detail: id.to_string(),
                            });
                            continue;
                        }
                        lib_jws.push(LibJw {
                            id,
                            geometry: geometry_from_attrs(&e),
                        });
                    }
                    b"dataref" => {
                        if let Some(name) = attr_str(&e, "name") {
                            current_dataref = Some(Animation {
                                dataref: name,
                                autoplay: attr_bool(&e, "autoplay"),
                                randomize_phase: attr_bool(&e, "randomize_phase"),
                                augment_wind_speed: attr_bool(&e, "augment_wind_speed"),
                                keys: Vec::new(),
                            });
                        }
                    }
                    b"animation" => {
                        if let Some(anim) = current_dataref.as_mut() {
                            if let (Some(t), Some(v)) = (attr_f32(&e, "t"), attr_f32(&e, "v")) {
                                if let Some(existing) = anim.keys.iter_mut().find(|k| k.t == t) {
                                    existing.v = v;
                                } else {
                                    anim.keys.push(AnimKey { t, v });
                                }
                            }
                        }
                    }
                    b"instance" => {
                        if let (Some(lat), Some(lon)) = (attr_f64(&e, "latitude"), attr_f64(&e, "longitude")) {
                            scenery.objects.push(AnimatedObject {
                                id: attr_str(&e, "id").unwrap_or_default(),
                                lat,
                                lon,
                                elevation: attr_f32(&e, "elevation").unwrap_or(0.0),
                                heading: attr_f32(&e, "heading").unwrap_or(0.0),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"dataref" {
                    if let Some(anim) = current_dataref.take() {
                        if anim.keys.len() >= 2 {
                            scenery.animations.push(anim);
                        } else {
                            rejections.push(Rejection {
                                reason: "animation curve needs at least 2 points".into(),
                                detail: anim.dataref,
                            });
                        }
                    }
                }
            }
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok((scenery, lib_jws))
}

fn build_jetway(e: &quick_xml::events::BytesStart) -> Result<Jetway, String> {
    let lat = attr_f64(e, "latitude").ok_or("missing latitude")?;
    let lon = attr_f64(e, "longitude").ok_or("missing longitude")?;
    if !(-85.0..=85.0).contains(&lat) {
        return Err("latitude out of range".into());
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err("longitude out of range".into());
    }

    let geometry = geometry_from_attrs(e);
    Ok(Jetway {
        name: attr_str(e, "name").unwrap_or_default(),
        library_id: attr_i32(e, "id"),
        lat,
        lon,
        heading: attr_f32(e, "heading").unwrap_or(0.0),
        door: door_side(attr_str(e, "forDoorLocation")),
        geometry,
        sound: attr_str(e, "sound"),
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
    })
}

pub fn parse_apt_dat(apt: &str, scenery: &mut Scenery) {
    for line in apt.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("1302 icao_code ") {
            scenery.arpt_icao = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("1300 ") {
            let mut parts = rest.splitn(6, char::is_whitespace);
            let (Some(lat), Some(lon), Some(hdg)) = (
                parts.next().and_then(|s| s.parse::<f64>().ok()),
                parts.next().and_then(|s| s.parse::<f64>().ok()),
                parts.next().and_then(|s| s.parse::<f32>().ok()),
            ) else {
                continue;
            };
            // skip <role> <type>, keep the remaining text (may contain spaces) as id
            let _role = parts.next();
            let _type = parts.next();
            let id = parts.next().unwrap_or("").trim().to_string();
            scenery.stands.push(Stand::new(id, lat, lon, hdg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ini_filters_global_airports_and_ortho() {
        let ini = "\
SCENERY_PACK Custom Scenery/openSAM_Library/
SCENERY_PACK Custom Scenery/*GLOBAL_AIRPORTS*/
SCENERY_PACK Custom Scenery/z_ao_na/
SCENERY_PACK Custom Scenery/EGLL/
";
        let packs = parse_scenery_packs_ini(ini);
        assert_eq!(packs.len(), 2);
        assert_eq!(packs[0].1, PackKind::Library);
        assert_eq!(packs[1].1, PackKind::Regular);
    }

    #[test]
    fn rejects_jetway_out_of_lat_range() {
        let xml = r#"<sam><jetways><jetway name="J1" latitude="89.0" longitude="1.0" heading="0"/></jetways></sam>"#;
        let mut rejections = Vec::new();
        let (scenery, _) = parse_sam_xml(xml, &mut rejections).unwrap();
        assert!(scenery.jetways.is_empty());
        assert_eq!(rejections.len(), 1);
    }

    #[test]
    fn parses_jetway_and_library_set() {
        let xml = r#"<sam>
            <jetways><jetway name="J1" latitude="10.0" longitude="20.0" heading="90" forDoorLocation="LF2"/></jetways>
            <sets><set id="7" height="5.0"/></sets>
        </sam>"#;
        let mut rejections = Vec::new();
        let (scenery, lib_jws) = parse_sam_xml(xml, &mut rejections).unwrap();
        assert_eq!(scenery.jetways.len(), 1);
        assert_eq!(scenery.jetways[0].door, DoorSide::Lf2);
        assert_eq!(lib_jws.len(), 1);
        assert_eq!(lib_jws[0].geometry.height, 5.0);
    }

    #[test]
    fn duplicate_template_id_rejected_later_wins() {
        let xml = r#"<sam><sets>
            <set id="1" height="1.0"/>
            <set id="1" height="2.0"/>
        </sets></sam>"#;
        let mut rejections = Vec::new();
        let (_, lib_jws) = parse_sam_xml(xml, &mut rejections).unwrap();
        assert_eq!(lib_jws.len(), 1);
        assert_eq!(lib_jws[0].geometry.height, 1.0);
        assert_eq!(rejections.len(), 1);
    }

    #[test]
    fn animation_curve_needs_two_points() {
        let xml = r#"<sam><datarefs><dataref name="d"><animation t="0" v="0"/></dataref></datarefs></sam>"#;
        let mut rejections = Vec::new();
        let (scenery, _) = parse_sam_xml(xml, &mut rejections).unwrap();
        assert!(scenery.animations.is_empty());
        assert_eq!(rejections.len(), 1);
    }

    #[test]
    fn animation_curve_duplicate_t_replaces() {
        let xml = r#"<sam><datarefs><dataref name="d">
            <animation t="0" v="0"/><animation t="1" v="5"/><animation t="0" v="9"/>
        </dataref></datarefs></sam>"#;
        let mut rejections = Vec::new();
        let (scenery, _) = parse_sam_xml(xml, &mut rejections).unwrap();
        assert_eq!(scenery.animations.len(), 1);
        assert_eq!(scenery.animations[0].keys.len(), 2);
        assert_eq!(scenery.animations[0].keys[0].v, 9.0);
    }

    #[test]
    fn apt_dat_parses_stand_and_icao() {
        let apt = "1302 icao_code EGLL\n1300 51.4700 -0.4543 270.0 traffic ramp Stand A1\n";
        let mut scenery = Scenery::default();
        parse_apt_dat(apt, &mut scenery);
        assert_eq!(scenery.arpt_icao.as_deref(), Some("EGLL"));
        assert_eq!(scenery.stands.len(), 1);
        assert_eq!(scenery.stands[0].id, "Stand A1");
    }
}
