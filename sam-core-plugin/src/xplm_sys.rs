//! Raw `extern "C"` declarations for the subset of the X-Plane SDK this
//! plugin links against. Only compiled into production (non-test)
//! builds; `xplm_shim::MockXplm` stands in during `cargo test`.

#![cfg(not(test))]
#![allow(non_snake_case, dead_code)]

use std::os::raw::{c_char, c_float, c_double, c_int, c_void};

pub type XPLMDataRef = *mut c_void;
pub type XPLMCommandRef = *mut c_void;
pub type XPLMObjectRef = *mut c_void;
pub type XPLMInstanceRef = *mut c_void;
pub type XPLMProbeRef = *mut c_void;

#[repr(C)]
pub struct XPLMDrawInfo_t {
    pub struct_size: c_int,
    pub x: c_float,
    pub y: c_float,
    pub z: c_float,
    pub pitch: c_float,
    pub heading: c_float,
    pub roll: c_float,
}

pub type XPLMFlightLoop_f = unsafe extern "C" fn(c_float, c_float, c_int, *mut c_void) -> c_float;
pub type XPLMGetDatai_f = unsafe extern "C" fn(*mut c_void) -> c_int;
pub type XPLMSetDatai_f = unsafe extern "C" fn(*mut c_void, c_int);
pub type XPLMGetDataf_f = unsafe extern "C" fn(*mut c_void) -> c_float;
pub type XPLMSetDataf_f = unsafe extern "C" fn(*mut c_void, c_float);
pub type XPLMGetDatavi_f = unsafe extern "C" fn(*mut c_void, *mut c_int, c_int, c_int) -> c_int;
pub type XPLMSetDatavi_f = unsafe extern "C" fn(*mut c_void, *mut c_int, c_int, c_int);
pub type XPLMGetDatavf_f = unsafe extern "C" fn(*mut c_void, *mut c_float, c_int, c_int) -> c_int;
pub type XPLMSetDatavf_f = unsafe extern "C" fn(*mut c_void, *mut c_float, c_int, c_int);
pub type XPLMGetDatab_f = unsafe extern "C" fn(*mut c_void, *mut c_void, c_int, c_int) -> c_int;
pub type XPLMSetDatab_f = unsafe extern "C" fn(*mut c_void, *mut c_void, c_int, c_int);
pub type XPLMCommandCallback_f = unsafe extern "C" fn(XPLMCommandRef, c_int, *mut c_void) -> c_int;

#[repr(C)]
pub struct XPLMProbeInfo_t {
    pub struct_size: c_int,
    pub location_x: c_float,
    pub location_y: c_float,
    pub location_z: c_float,
    pub normal_x: c_float,
    pub normal_y: c_float,
    pub normal_z: c_float,
    pub velocity_x: c_float,
    pub velocity_y: c_float,
    pub velocity_z: c_float,
    pub is_wet: c_int,
}

extern "C" {
    pub fn XPLMFindDataRef(inDataRefName: *const c_char) -> XPLMDataRef;
    pub fn XPLMGetDataf(inDataRef: XPLMDataRef) -> c_float;
    pub fn XPLMGetDatad(inDataRef: XPLMDataRef) -> c_double;
    pub fn XPLMGetDatai(inDataRef: XPLMDataRef) -> c_int;
    pub fn XPLMGetDatavf(
        inDataRef: XPLMDataRef,
        outValues: *mut c_float,
        inOffset: c_int,
        inMax: c_int,
    ) -> c_int;
    pub fn XPLMSetDataf(inDataRef: XPLMDataRef, inValue: c_float);
    pub fn XPLMSetDatai(inDataRef: XPLMDataRef, inValue: c_int);
    pub fn XPLMDebugString(inString: *const c_char);

    pub fn XPLMWorldToLocal(
        inLatitude: c_double,
        inLongitude: c_double,
        inAltitude: c_double,
        outX: *mut c_double,
        outY: *mut c_double,
        outZ: *mut c_double,
    );
    pub fn XPLMLocalToWorld(
        inX: c_double,
        inY: c_double,
        inZ: c_double,
        outLatitude: *mut c_double,
        outLongitude: *mut c_double,
        outAltitude: *mut c_double,
    );

    pub fn XPLMCreateProbe(inProbeType: c_int) -> XPLMProbeRef;
    pub fn XPLMDestroyProbe(inProbe: XPLMProbeRef);
    pub fn XPLMProbeTerrainXYZ(
        inProbe: XPLMProbeRef,
        inX: c_float,
        inY: c_float,
        inZ: c_float,
        outInfo: *mut XPLMProbeInfo_t,
    ) -> c_int;

    pub fn XPLMLoadObject(inPath: *const c_char) -> XPLMObjectRef;
    pub fn XPLMCreateInstance(
        inObject: XPLMObjectRef,
        inDatarefs: *const *const c_char,
    ) -> XPLMInstanceRef;
    pub fn XPLMDestroyInstance(inInstance: XPLMInstanceRef);

    pub fn XPLMFindCommand(inName: *const c_char) -> XPLMCommandRef;
    pub fn XPLMCreateCommand(inName: *const c_char, inDescription: *const c_char) -> XPLMCommandRef;
    pub fn XPLMCommandOnce(inCommand: XPLMCommandRef);
    pub fn XPLMRegisterCommandHandler(
        inCommand: XPLMCommandRef,
        inHandler: XPLMCommandCallback_f,
        inBefore: c_int,
        inRefcon: *mut c_void,
    );

    pub fn XPLMRegisterFlightLoopCallback(
        inFlightLoop: XPLMFlightLoop_f,
        inInterval: c_float,
        inRefcon: *mut c_void,
    );

    #[allow(clippy::too_many_arguments)]
    pub fn XPLMRegisterDataAccessor(
        inDataName: *const c_char,
        inDataType: c_int,
        inIsWritable: c_int,
        inReadInt: Option<XPLMGetDatai_f>,
        inWriteInt: Option<XPLMSetDatai_f>,
        inReadFloat: Option<XPLMGetDataf_f>,
        inWriteFloat: Option<XPLMSetDataf_f>,
        inReadDouble: *const c_void,
        inWriteDouble: *const c_void,
        inReadIntArray: Option<XPLMGetDatavi_f>,
        inWriteIntArray: Option<XPLMSetDatavi_f>,
        inReadFloatArray: Option<XPLMGetDatavf_f>,
        inWriteFloatArray: Option<XPLMSetDatavf_f>,
        inReadData: Option<XPLMGetDatab_f>,
        inWriteData: Option<XPLMSetDatab_f>,
        inReadRefcon: *mut c_void,
        inWriteRefcon: *mut c_void,
    ) -> XPLMDataRef;

    pub fn XPLMInstanceSetPosition(
        inInstance: XPLMInstanceRef,
        inNewPosition: *const XPLMDrawInfo_t,
        inData: *const c_float,
    );

    pub fn XPLMGetSystemPath(outPath: *mut c_char) -> c_int;
}

pub const XPLM_TYPE_INT: c_int = 1;
pub const XPLM_TYPE_FLOAT: c_int = 2;
