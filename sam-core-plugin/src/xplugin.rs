//! `XPluginStart`/`XPluginStop`/`XPluginEnable`/`XPluginDisable` glue.
//!
//! Thin `#[no_mangle] extern "C"` exports the host loads from the
//! compiled `cdylib`; everything behind them is safe Rust.

#![cfg(not(test))]

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Mutex;

use crate::dgs::State as DgsState;
use crate::plane::State as PlaneState;
use crate::plugin::SceneryAnimationManager;
use crate::prefs::Preferences;
use crate::xplm_shim::{CommandHandlerFn, DataRefHandle, FloatAccessor, IntAccessor, RealXplm, XplmApi};

struct PluginState {
    xplm: RealXplm,
    manager: SceneryAnimationManager,
    lat_ref_dr: Option<DataRefHandle>,
    lon_ref_dr: Option<DataRefHandle>,
    now_dr: Option<DataRefHandle>,
}

static MANAGER: Mutex<Option<PluginState>> = Mutex::new(None);

fn write_name(buf: *mut c_char, text: &str) {
    if let Ok(c) = CString::new(text) {
        let bytes = c.as_bytes_with_nul();
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, bytes.len());
        }
    }
}

/// # Safety
/// Called by the host with writable 256-byte buffers, per the XPLM ABI.
#[no_mangle]
pub unsafe extern "C" fn XPluginStart(out_name: *mut c_char, out_sig: *mut c_char, out_desc: *mut c_char) -> c_int {
    write_name(out_name, "Scenery Animation Manager");
    write_name(out_sig, "opensam.scenery.animation");
    write_name(out_desc, "Drives jetway docking and DGS animation");

    let xplm = RealXplm::new();
    let manager = SceneryAnimationManager::new(Preferences::default());
    *MANAGER.lock().unwrap() = Some(PluginState {
        xplm,
        manager,
        lat_ref_dr: None,
        lon_ref_dr: None,
        now_dr: None,
    });
    1
}

#[no_mangle]
pub extern "C" fn XPluginStop() {
    *MANAGER.lock().unwrap() = None;
}

#[no_mangle]
pub extern "C" fn XPluginEnable() -> c_int {
    let mut guard = MANAGER.lock().unwrap();
    let Some(state) = guard.as_mut() else {
        return 0;
    };

    let xp_root = std::path::PathBuf::from(state.xplm.system_path());
    if state.manager.load_scenery(&xp_root).is_err() {
        return 0;
    }

    state.lat_ref_dr = state.xplm.find_dataref("sim/flightmodel/position/lat_ref");
    state.lon_ref_dr = state.xplm.find_dataref("sim/flightmodel/position/lon_ref");
    state.now_dr = state.xplm.find_dataref("sim/time/total_running_time_sec");

    state.xplm.register_flight_loop_callback(flight_loop_cb, -1.0, std::ptr::null_mut());

    state.xplm.register_int_accessor(
        "opensam/jetway/number",
        IntAccessor { read: get_jetway_number, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/jetway/status",
        IntAccessor { read: get_jetway_status, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/SAM_Library_installed",
        IntAccessor { read: get_sam_library_installed, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/dgs/status",
        IntAccessor { read: get_dgs_status, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/dgs/track",
        IntAccessor { read: get_dgs_track, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/dgs/lr",
        IntAccessor { read: get_dgs_lr, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/dgs/distance_0",
        IntAccessor { read: get_dgs_distance_0, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_int_accessor(
        "opensam/dgs/distance_01",
        IntAccessor { read: get_dgs_distance_01, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_float_accessor(
        "opensam/dgs/distance",
        FloatAccessor { read: get_dgs_distance, write: None },
        std::ptr::null_mut(),
    );
    state.xplm.register_float_accessor(
        "opensam/dgs/xtrack",
        FloatAccessor { read: get_dgs_xtrack, write: None },
        std::ptr::null_mut(),
    );

    register_command(&state.xplm, "openSAM/dock_jwy", "Dock jetway", cmd_dock_jwy);
    register_command(&state.xplm, "openSAM/undock_jwy", "Undock jetway", cmd_undock_jwy);
    register_command(&state.xplm, "openSAM/toggle_jwy", "Toggle jetway", cmd_toggle_jwy);
    register_command(&state.xplm, "openSAM/activate", "Activate DGS", cmd_activate);
    register_command(&state.xplm, "openSAM/ToggleUI", "Toggle openSAM UI", cmd_toggle_ui);
    register_command(&state.xplm, "openSAM/toggle_multiplayer", "Toggle multiplayer adapter", cmd_toggle_mp);

    1
}

fn register_command(xplm: &RealXplm, name: &str, description: &str, handler: CommandHandlerFn) {
    xplm.register_command_handler(name, description, handler, std::ptr::null_mut());
}

#[no_mangle]
pub extern "C" fn XPluginDisable() {}

#[no_mangle]
pub extern "C" fn XPluginReceiveMessage(_from: c_int, _msg: c_int, _param: *mut c_void) {}

unsafe extern "C" fn flight_loop_cb(_since_last_call: f32, _since_last_floop: f32, _counter: c_int, _refcon: *mut c_void) -> f32 {
    let mut guard = MANAGER.lock().unwrap();
    let Some(state) = guard.as_mut() else {
        return -1.0;
    };
    let lat_ref = state.lat_ref_dr.map(|h| state.xplm.get_float(h) as f64).unwrap_or(-1000.0);
    let lon_ref = state.lon_ref_dr.map(|h| state.xplm.get_float(h) as f64).unwrap_or(-1000.0);
    let now = state.now_dr.map(|h| state.xplm.get_float(h)).unwrap_or(0.0);
    state.manager.tick(&state.xplm, now, lat_ref, lon_ref)
}

unsafe extern "C" fn get_jetway_number(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.my_plane.active_jws.len() as c_int).unwrap_or(0)
}

unsafe extern "C" fn get_jetway_status(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    match guard.as_ref().map(|s| s.manager.my_plane.state) {
        Some(PlaneState::Docked) => 2,
        Some(PlaneState::CanDock) => 1,
        Some(PlaneState::Docking) | Some(PlaneState::Undocking) | Some(PlaneState::SelectJws) => -1,
        _ => 0,
    }
}

unsafe extern "C" fn get_sam_library_installed(_refcon: *mut c_void) -> c_int {
    1
}

unsafe extern "C" fn get_dgs_status(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    match guard.as_ref().map(|s| s.manager.dgs.state) {
        Some(DgsState::Disabled) | Some(DgsState::Inactive) => 0,
        Some(DgsState::Arrival) | Some(DgsState::Engaged) | Some(DgsState::Track) => 1,
        Some(DgsState::Good) | Some(DgsState::Bad) => 2,
        Some(DgsState::Parked) | Some(DgsState::Chocks) | Some(DgsState::Done) => 3,
        Some(DgsState::Departure) | Some(DgsState::Boarding) => 4,
        None => 0,
    }
}

unsafe extern "C" fn get_dgs_track(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.dgs.guidance.track as c_int).unwrap_or(0)
}

unsafe extern "C" fn get_dgs_lr(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.dgs.guidance.lr as c_int).unwrap_or(0)
}

unsafe extern "C" fn get_dgs_distance_0(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.dgs.guidance.distance_0).unwrap_or(0)
}

unsafe extern "C" fn get_dgs_distance_01(_refcon: *mut c_void) -> c_int {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.dgs.guidance.distance_01).unwrap_or(0)
}

unsafe extern "C" fn get_dgs_distance(_refcon: *mut c_void) -> f32 {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.dgs.guidance.distance).unwrap_or(0.0)
}

unsafe extern "C" fn get_dgs_xtrack(_refcon: *mut c_void) -> f32 {
    let guard = MANAGER.lock().unwrap();
    guard.as_ref().map(|s| s.manager.dgs.guidance.xtrack).unwrap_or(0.0)
}

unsafe extern "C" fn cmd_dock_jwy(_cmd: *mut c_void, phase: c_int, _refcon: *mut c_void) -> c_int {
    if phase == 0 {
        if let Some(state) = MANAGER.lock().unwrap().as_ref() {
            state.manager.commands.request_dock();
        }
    }
    1
}

unsafe extern "C" fn cmd_undock_jwy(_cmd: *mut c_void, phase: c_int, _refcon: *mut c_void) -> c_int {
    if phase == 0 {
        if let Some(state) = MANAGER.lock().unwrap().as_ref() {
            state.manager.commands.request_undock();
        }
    }
    1
}

unsafe extern "C" fn cmd_toggle_jwy(_cmd: *mut c_void, phase: c_int, _refcon: *mut c_void) -> c_int {
    if phase == 0 {
        if let Some(state) = MANAGER.lock().unwrap().as_ref() {
            state.manager.commands.request_toggle();
        }
    }
    1
}

unsafe extern "C" fn cmd_activate(_cmd: *mut c_void, phase: c_int, _refcon: *mut c_void) -> c_int {
    if phase == 0 {
        if let Some(state) = MANAGER.lock().unwrap().as_ref() {
            state.manager.commands.request_activate();
        }
    }
    1
}

unsafe extern "C" fn cmd_toggle_ui(_cmd: *mut c_void, phase: c_int, _refcon: *mut c_void) -> c_int {
    if phase == 0 {
        if let Some(state) = MANAGER.lock().unwrap().as_ref() {
            state.manager.commands.request_toggle_ui();
        }
    }
    1
}

unsafe extern "C" fn cmd_toggle_mp(_cmd: *mut c_void, phase: c_int, _refcon: *mut c_void) -> c_int {
    if phase == 0 {
        if let Some(state) = MANAGER.lock().unwrap().as_ref() {
            state.manager.commands.request_toggle_mp();
        }
    }
    1
}
