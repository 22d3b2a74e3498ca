//! XPLM abstraction layer.
//!
//! Every X-Plane SDK call the core needs goes through the `XplmApi` trait
//! so the registries and state machines can be driven by `MockXplm`
//! without a running simulator.

use std::collections::HashMap;
use std::sync::Mutex;

pub type DataRefHandle = usize;

#[derive(Debug, Clone)]
pub enum DataRefValue {
    Float(f32),
    Double(f64),
    Int(i32),
    FloatArray(Vec<f32>),
}

/// Result of a terrain probe at a given local-frame point.
#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub hit: bool,
    pub location_y: f32,
}

/// Opaque handle to a loaded `.obj`.
pub type ObjectHandle = usize;
/// Opaque handle to an instanced placement of an object.
pub type InstanceHandle = usize;

pub type FlightLoopFn = unsafe extern "C" fn(f32, f32, i32, *mut std::os::raw::c_void) -> f32;
pub type GetFloatFn = unsafe extern "C" fn(*mut std::os::raw::c_void) -> f32;
pub type SetFloatFn = unsafe extern "C" fn(*mut std::os::raw::c_void, f32);
pub type GetIntFn = unsafe extern "C" fn(*mut std::os::raw::c_void) -> i32;
pub type SetIntFn = unsafe extern "C" fn(*mut std::os::raw::c_void, i32);
pub type CommandHandlerFn = unsafe extern "C" fn(*mut std::os::raw::c_void, i32, *mut std::os::raw::c_void) -> i32;

/// A registered float dataref's get/set pair; `write` is `None` for a
/// read-only accessor.
#[derive(Clone, Copy)]
pub struct FloatAccessor {
    pub read: GetFloatFn,
    pub write: Option<SetFloatFn>,
}

/// A registered int dataref's get/set pair; `write` is `None` for a
/// read-only accessor.
#[derive(Clone, Copy)]
pub struct IntAccessor {
    pub read: GetIntFn,
    pub write: Option<SetIntFn>,
}

pub trait XplmApi: Send + Sync {
    fn find_dataref(&self, path: &str) -> Option<DataRefHandle>;
    fn get_float(&self, handle: DataRefHandle) -> f32;
    fn get_double(&self, handle: DataRefHandle) -> f64;
    fn get_int(&self, handle: DataRefHandle) -> i32;
    fn get_float_array(&self, handle: DataRefHandle, offset: usize, out: &mut [f32]);
    fn set_float(&self, handle: DataRefHandle, value: f32);
    fn set_int(&self, handle: DataRefHandle, value: i32);

    /// Convert geodetic coordinates into the host's current local frame.
    fn world_to_local(&self, lat: f64, lon: f64, elevation: f64) -> (f64, f64, f64);
    /// Convert a local-frame point back to geodetic coordinates.
    fn local_to_world(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64);

    /// Probe terrain elevation below a local-frame point.
    fn probe_terrain(&self, x: f32, y: f32, z: f32) -> ProbeResult;

    fn load_object(&self, path: &str) -> Option<ObjectHandle>;
    fn create_instance(&self, obj: ObjectHandle, datarefs: &[&str]) -> Option<InstanceHandle>;
    fn destroy_instance(&self, instance: InstanceHandle);
    fn instance_set_position(&self, instance: InstanceHandle, x: f32, y: f32, z: f32, heading: f32, values: &[f32]);

    fn find_command(&self, name: &str) -> Option<DataRefHandle>;
    fn command_once(&self, handle: DataRefHandle);

    /// The X-Plane installation root, as `XPLMGetSystemPath` reports it.
    fn system_path(&self) -> String;

    /// Register the plugin's flight-loop callback, called back after
    /// `interval` seconds (negative means "next frame").
    fn register_flight_loop_callback(&self, callback: FlightLoopFn, interval: f32, refcon: *mut std::os::raw::c_void);
    /// Register a `sam/*`/`opensam/*` float dataref.
    fn register_float_accessor(&self, name: &str, accessor: FloatAccessor, refcon: *mut std::os::raw::c_void);
    /// Register a `sam/*`/`opensam/*` int dataref.
    fn register_int_accessor(&self, name: &str, accessor: IntAccessor, refcon: *mut std::os::raw::c_void);
    /// Create (if needed) and register a handler for an `openSAM/*` command.
    fn register_command_handler(
        &self,
        name: &str,
        description: &str,
        callback: CommandHandlerFn,
        refcon: *mut std::os::raw::c_void,
    ) -> Option<DataRefHandle>;

    fn log(&self, message: &str);
}

// ── MockXplm ─────────────────────────────────────────────────────────────────

struct MockInner {
    datarefs: HashMap<String, DataRefValue>,
    handles: Vec<String>,
    set_float_log: Vec<(String, f32)>,
    set_int_log: Vec<(String, i32)>,
    log_messages: Vec<String>,
    world_to_local: Box<dyn Fn(f64, f64, f64) -> (f64, f64, f64) + Send>,
    probes: HashMap<(i32, i32), ProbeResult>,
    objects: Vec<String>,
    instances: Vec<(ObjectHandle, bool)>,
    commands_fired: Vec<String>,
    flight_loop_registered: bool,
    float_accessors: Vec<String>,
    int_accessors: Vec<String>,
    command_handlers: Vec<String>,
    system_path: String,
}

pub struct MockXplm {
    inner: Mutex<MockInner>,
}

impl MockXplm {
    pub fn new() -> Self {
        MockXplm {
            inner: Mutex::new(MockInner {
                datarefs: HashMap::new(),
                handles: Vec::new(),
                set_float_log: Vec::new(),
                set_int_log: Vec::new(),
                log_messages: Vec::new(),
                world_to_local: Box::new(|lat, lon, alt| (lat * 111_120.0, alt, lon * 111_120.0)),
                probes: HashMap::new(),
                objects: Vec::new(),
                instances: Vec::new(),
                commands_fired: Vec::new(),
                flight_loop_registered: false,
                float_accessors: Vec::new(),
                int_accessors: Vec::new(),
                command_handlers: Vec::new(),
                system_path: String::new(),
            }),
        }
    }

    pub fn set_system_path(&self, path: &str) {
        self.inner.lock().unwrap().system_path = path.to_string();
    }

    pub fn set_dataref(&self, path: &str, value: DataRefValue) {
        self.inner.lock().unwrap().datarefs.insert(path.to_string(), value);
    }

    pub fn set_float_calls(&self) -> Vec<(String, f32)> {
        self.inner.lock().unwrap().set_float_log.clone()
    }

    pub fn set_int_calls(&self) -> Vec<(String, i32)> {
        self.inner.lock().unwrap().set_int_log.clone()
    }

    pub fn log_messages(&self) -> Vec<String> {
        self.inner.lock().unwrap().log_messages.clone()
    }

    pub fn commands_fired(&self) -> Vec<String> {
        self.inner.lock().unwrap().commands_fired.clone()
    }

    pub fn flight_loop_registered(&self) -> bool {
        self.inner.lock().unwrap().flight_loop_registered
    }

    pub fn float_accessors(&self) -> Vec<String> {
        self.inner.lock().unwrap().float_accessors.clone()
    }

    pub fn int_accessors(&self) -> Vec<String> {
        self.inner.lock().unwrap().int_accessors.clone()
    }

    pub fn command_handlers(&self) -> Vec<String> {
        self.inner.lock().unwrap().command_handlers.clone()
    }

    /// Pre-load a canned probe result keyed by 0.5m-quantized (x, z).
    pub fn set_probe(&self, x: f32, z: f32, result: ProbeResult) {
        let key = ((x * 2.0).round() as i32, (z * 2.0).round() as i32);
        self.inner.lock().unwrap().probes.insert(key, result);
    }
}

impl Default for MockXplm {
    fn default() -> Self {
        Self::new()
    }
}

impl XplmApi for MockXplm {
    fn find_dataref(&self, path: &str) -> Option<DataRefHandle> {
        let mut g = self.inner.lock().unwrap();
        if !g.datarefs.contains_key(path) {
            return None;
        }
        if let Some(idx) = g.handles.iter().position(|p| p == path) {
            return Some(idx);
        }
        let idx = g.handles.len();
        g.handles.push(path.to_string());
        Some(idx)
    }

    fn get_float(&self, handle: DataRefHandle) -> f32 {
        let g = self.inner.lock().unwrap();
        let path = g.handles.get(handle).cloned().unwrap_or_default();
        match g.datarefs.get(&path) {
            Some(DataRefValue::Float(v)) => *v,
            Some(DataRefValue::Double(v)) => *v as f32,
            Some(DataRefValue::Int(v)) => *v as f32,
            _ => 0.0,
        }
    }

    fn get_double(&self, handle: DataRefHandle) -> f64 {
        let g = self.inner.lock().unwrap();
        let path = g.handles.get(handle).cloned().unwrap_or_default();
        match g.datarefs.get(&path) {
            Some(DataRefValue::Double(v)) => *v,
            Some(DataRefValue::Float(v)) => *v as f64,
            Some(DataRefValue::Int(v)) => *v as f64,
            _ => 0.0,
        }
    }

    fn get_int(&self, handle: DataRefHandle) -> i32 {
        let g = self.inner.lock().unwrap();
        let path = g.handles.get(handle).cloned().unwrap_or_default();
        match g.datarefs.get(&path) {
            Some(DataRefValue::Int(v)) => *v,
            Some(DataRefValue::Float(v)) => *v as i32,
            _ => 0,
        }
    }

    fn get_float_array(&self, handle: DataRefHandle, offset: usize, out: &mut [f32]) {
        let g = self.inner.lock().unwrap();
        let path = g.handles.get(handle).cloned().unwrap_or_default();
        if let Some(DataRefValue::FloatArray(arr)) = g.datarefs.get(&path) {
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = arr.get(offset + i).copied().unwrap_or(0.0);
            }
        }
    }

    fn set_float(&self, handle: DataRefHandle, value: f32) {
        let mut g = self.inner.lock().unwrap();
        let path = g.handles.get(handle).cloned().unwrap_or_default();
        g.datarefs.insert(path.clone(), DataRefValue::Float(value));
        g.set_float_log.push((path, value));
    }

    fn set_int(&self, handle: DataRefHandle, value: i32) {
        let mut g = self.inner.lock().unwrap();
        let path = g.handles.get(handle).cloned().unwrap_or_default();
        g.datarefs.insert(path.clone(), DataRefValue::Int(value));
        g.set_int_log.push((path, value));
    }

    fn world_to_local(&self, lat: f64, lon: f64, elevation: f64) -> (f64, f64, f64) {
        (self.inner.lock().unwrap().world_to_local)(lat, lon, elevation)
    }

    fn local_to_world(&self, x: f64, _y: f64, z: f64) -> (f64, f64, f64) {
        (x / 111_120.0, z / 111_120.0, 0.0)
    }

    fn probe_terrain(&self, x: f32, _y: f32, z: f32) -> ProbeResult {
        let key = ((x * 2.0).round() as i32, (z * 2.0).round() as i32);
        self.inner
            .lock()
            .unwrap()
            .probes
            .get(&key)
            .copied()
            .unwrap_or(ProbeResult { hit: true, location_y: 0.0 })
    }

    fn load_object(&self, path: &str) -> Option<ObjectHandle> {
        let mut g = self.inner.lock().unwrap();
        g.objects.push(path.to_string());
        Some(g.objects.len() - 1)
    }

    fn create_instance(&self, obj: ObjectHandle, _datarefs: &[&str]) -> Option<InstanceHandle> {
        let mut g = self.inner.lock().unwrap();
        g.instances.push((obj, true));
        Some(g.instances.len() - 1)
    }

    fn destroy_instance(&self, instance: InstanceHandle) {
        let mut g = self.inner.lock().unwrap();
        if let Some(slot) = g.instances.get_mut(instance) {
            slot.1 = false;
        }
    }

    fn instance_set_position(&self, _instance: InstanceHandle, _x: f32, _y: f32, _z: f32, _heading: f32, _values: &[f32]) {}

    fn find_command(&self, name: &str) -> Option<DataRefHandle> {
        self.find_dataref(name).or_else(|| {
            self.set_dataref(name, DataRefValue::Int(0));
            self.find_dataref(name)
        })
    }

    fn command_once(&self, handle: DataRefHandle) {
        let mut g = self.inner.lock().unwrap();
        if let Some(path) = g.handles.get(handle).cloned() {
            g.commands_fired.push(path);
        }
    }

    fn system_path(&self) -> String {
        self.inner.lock().unwrap().system_path.clone()
    }

    fn register_flight_loop_callback(&self, _callback: FlightLoopFn, _interval: f32, _refcon: *mut std::os::raw::c_void) {
        self.inner.lock().unwrap().flight_loop_registered = true;
    }

    fn register_float_accessor(&self, name: &str, _accessor: FloatAccessor, _refcon: *mut std::os::raw::c_void) {
        self.inner.lock().unwrap().float_accessors.push(name.to_string());
    }

    fn register_int_accessor(&self, name: &str, _accessor: IntAccessor, _refcon: *mut std::os::raw::c_void) {
        self.inner.lock().unwrap().int_accessors.push(name.to_string());
    }

    fn register_command_handler(
        &self,
        name: &str,
        _description: &str,
        _callback: CommandHandlerFn,
        _refcon: *mut std::os::raw::c_void,
    ) -> Option<DataRefHandle> {
        self.inner.lock().unwrap().command_handlers.push(name.to_string());
        self.find_command(name)
    }

    fn log(&self, message: &str) {
        self.inner.lock().unwrap().log_messages.push(message.to_string());
    }
}

// ── RealXplm — only compiled in production (not test) builds ─────────────────

#[cfg(not(test))]
pub use real::RealXplm;

#[cfg(not(test))]
mod real {
    use super::{
        CommandHandlerFn, DataRefHandle, FloatAccessor, FlightLoopFn, InstanceHandle, IntAccessor, ObjectHandle,
        ProbeResult, XplmApi,
    };
    use crate::xplm_sys as sys;
    use std::ffi::CString;
    use std::os::raw::{c_int, c_void};

    pub struct RealXplm {
        probe: sys::XPLMProbeRef,
    }

    impl RealXplm {
        /// # Safety
        /// Must be called after the host has initialised the SDK
        /// (i.e. from `XPluginStart` or later).
        pub unsafe fn new() -> Self {
            RealXplm {
                probe: sys::XPLMCreateProbe(0),
            }
        }
    }

    impl Drop for RealXplm {
        fn drop(&mut self) {
            unsafe { sys::XPLMDestroyProbe(self.probe) }
        }
    }

    // All XPLM calls happen on the host's single sim thread.
    unsafe impl Send for RealXplm {}
    unsafe impl Sync for RealXplm {}

    impl XplmApi for RealXplm {
        fn find_dataref(&self, path: &str) -> Option<DataRefHandle> {
            let c = CString::new(path).ok()?;
            let h = unsafe { sys::XPLMFindDataRef(c.as_ptr()) };
            if h.is_null() {
                None
            } else {
                Some(h as usize)
            }
        }

        fn get_float(&self, handle: DataRefHandle) -> f32 {
            unsafe { sys::XPLMGetDataf(handle as _) }
        }

        fn get_double(&self, handle: DataRefHandle) -> f64 {
            unsafe { sys::XPLMGetDatad(handle as _) }
        }

        fn get_int(&self, handle: DataRefHandle) -> i32 {
            unsafe { sys::XPLMGetDatai(handle as _) }
        }

        fn get_float_array(&self, handle: DataRefHandle, offset: usize, out: &mut [f32]) {
            unsafe {
                sys::XPLMGetDatavf(handle as _, out.as_mut_ptr(), offset as i32, out.len() as i32);
            }
        }

        fn set_float(&self, handle: DataRefHandle, value: f32) {
            unsafe { sys::XPLMSetDataf(handle as _, value) }
        }

        fn set_int(&self, handle: DataRefHandle, value: i32) {
            unsafe { sys::XPLMSetDatai(handle as _, value) }
        }

        fn world_to_local(&self, lat: f64, lon: f64, elevation: f64) -> (f64, f64, f64) {
            let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
            unsafe { sys::XPLMWorldToLocal(lat, lon, elevation, &mut x, &mut y, &mut z) };
            (x, y, z)
        }

        fn local_to_world(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
            let (mut lat, mut lon, mut alt) = (0.0, 0.0, 0.0);
            unsafe { sys::XPLMLocalToWorld(x, y, z, &mut lat, &mut lon, &mut alt) };
            (lat, lon, alt)
        }

        fn probe_terrain(&self, x: f32, y: f32, z: f32) -> ProbeResult {
            let mut info = sys::XPLMProbeInfo_t {
                struct_size: std::mem::size_of::<sys::XPLMProbeInfo_t>() as i32,
                location_x: 0.0,
                location_y: 0.0,
                location_z: 0.0,
                normal_x: 0.0,
                normal_y: 0.0,
                normal_z: 0.0,
                velocity_x: 0.0,
                velocity_y: 0.0,
                velocity_z: 0.0,
                is_wet: 0,
            };
            const HIT: i32 = 0;
            let result = unsafe { sys::XPLMProbeTerrainXYZ(self.probe, x, y, z, &mut info) };
            ProbeResult {
                hit: result == HIT,
                location_y: info.location_y,
            }
        }

        fn load_object(&self, path: &str) -> Option<ObjectHandle> {
            let c = CString::new(path).ok()?;
            let obj = unsafe { sys::XPLMLoadObject(c.as_ptr()) };
            if obj.is_null() {
                None
            } else {
                Some(obj as usize)
            }
        }

        fn create_instance(&self, obj: ObjectHandle, datarefs: &[&str]) -> Option<InstanceHandle> {
            let cstrs: Vec<CString> = datarefs.iter().map(|s| CString::new(*s).unwrap()).collect();
            let mut ptrs: Vec<*const std::os::raw::c_char> = cstrs.iter().map(|c| c.as_ptr()).collect();
            ptrs.push(std::ptr::null());
            let inst = unsafe { sys::XPLMCreateInstance(obj as sys::XPLMObjectRef, ptrs.as_ptr()) };
            if inst.is_null() {
                None
            } else {
                Some(inst as usize)
            }
        }

        fn destroy_instance(&self, instance: InstanceHandle) {
            unsafe { sys::XPLMDestroyInstance(instance as sys::XPLMInstanceRef) }
        }

        fn instance_set_position(&self, instance: InstanceHandle, x: f32, y: f32, z: f32, heading: f32, values: &[f32]) {
            let draw_info = sys::XPLMDrawInfo_t {
                struct_size: std::mem::size_of::<sys::XPLMDrawInfo_t>() as i32,
                x,
                y,
                z,
                pitch: 0.0,
                heading,
                roll: 0.0,
            };
            unsafe {
                sys::XPLMInstanceSetPosition(instance as sys::XPLMInstanceRef, &draw_info, values.as_ptr());
            }
        }

        fn find_command(&self, name: &str) -> Option<DataRefHandle> {
            let c = CString::new(name).ok()?;
            let h = unsafe { sys::XPLMFindCommand(c.as_ptr()) };
            if h.is_null() {
                None
            } else {
                Some(h as usize)
            }
        }

        fn command_once(&self, handle: DataRefHandle) {
            unsafe { sys::XPLMCommandOnce(handle as sys::XPLMCommandRef) }
        }

        fn system_path(&self) -> String {
            let mut buf = vec![0 as std::os::raw::c_char; 1024];
            unsafe { sys::XPLMGetSystemPath(buf.as_mut_ptr()) };
            let c = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
            c.to_string_lossy().into_owned()
        }

        fn register_flight_loop_callback(&self, callback: FlightLoopFn, interval: f32, refcon: *mut c_void) {
            unsafe {
                let cb: sys::XPLMFlightLoop_f = std::mem::transmute(callback);
                sys::XPLMRegisterFlightLoopCallback(cb, interval, refcon);
            }
        }

        fn register_float_accessor(&self, name: &str, accessor: FloatAccessor, refcon: *mut c_void) {
            let Ok(c) = CString::new(name) else { return };
            unsafe {
                let read: sys::XPLMGetDataf_f = std::mem::transmute(accessor.read);
                let write: Option<sys::XPLMSetDataf_f> = accessor.write.map(|w| std::mem::transmute(w));
                sys::XPLMRegisterDataAccessor(
                    c.as_ptr(),
                    sys::XPLM_TYPE_FLOAT,
                    accessor.write.is_some() as c_int,
                    None,
                    None,
                    Some(read),
                    write,
                    std::ptr::null(),
                    std::ptr::null(),
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    refcon,
                    refcon,
                );
            }
        }

        fn register_int_accessor(&self, name: &str, accessor: IntAccessor, refcon: *mut c_void) {
            let Ok(c) = CString::new(name) else { return };
            unsafe {
                let read: sys::XPLMGetDatai_f = std::mem::transmute(accessor.read);
                let write: Option<sys::XPLMSetDatai_f> = accessor.write.map(|w| std::mem::transmute(w));
                sys::XPLMRegisterDataAccessor(
                    c.as_ptr(),
                    sys::XPLM_TYPE_INT,
                    accessor.write.is_some() as c_int,
                    Some(read),
                    write,
                    None,
                    None,
                    std::ptr::null(),
                    std::ptr::null(),
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    refcon,
                    refcon,
                );
            }
        }

        fn register_command_handler(
            &self,
            name: &str,
            description: &str,
            callback: CommandHandlerFn,
            refcon: *mut c_void,
        ) -> Option<DataRefHandle> {
            let c_name = CString::new(name).ok()?;
            let c_desc = CString::new(description).unwrap_or_default();
            unsafe {
                let cmd = sys::XPLMCreateCommand(c_name.as_ptr(), c_desc.as_ptr());
                if cmd.is_null() {
                    return None;
                }
                let handler: sys::XPLMCommandCallback_f = std::mem::transmute(callback);
                sys::XPLMRegisterCommandHandler(cmd, handler, 1, refcon);
                Some(cmd as usize)
            }
        }

        fn log(&self, message: &str) {
            if let Ok(c) = CString::new(message) {
                unsafe { sys::XPLMDebugString(c.as_ptr()) }
            }
        }
    }
}
