//! Top-level wiring: dataref/command registration contract, the
//! flight-loop entry point, and the error boundary that disables the
//! plugin for the rest of the run on a fatal error.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::dgs::DgsInstance;
use crate::errors::OsError;
use crate::mp::MpOrchestrator;
use crate::plane::{Plane, PlaneInputs};
use crate::prefs::Preferences;
use crate::refframe::RefFrameTracker;
use crate::registry::{self, Registry};
use crate::scheduler::Scheduler;
use crate::xplm_shim::{DataRefHandle, XplmApi};

/// Host dataref handles the per-frame tick needs, resolved lazily and
/// cached so a frame never pays for a string lookup.
#[derive(Default)]
struct PlaneDatarefs {
    x: Option<DataRefHandle>,
    y: Option<DataRefHandle>,
    z: Option<DataRefHandle>,
    psi: Option<DataRefHandle>,
    on_ground: Option<DataRefHandle>,
    beacon_on: Option<DataRefHandle>,
}

impl PlaneDatarefs {
    fn resolve(&mut self, xplm: &dyn XplmApi) {
        if self.x.is_none() {
            self.x = xplm.find_dataref("sim/flightmodel/position/local_x");
        }
        if self.y.is_none() {
            self.y = xplm.find_dataref("sim/flightmodel/position/local_y");
        }
        if self.z.is_none() {
            self.z = xplm.find_dataref("sim/flightmodel/position/local_z");
        }
        if self.psi.is_none() {
            self.psi = xplm.find_dataref("sim/flightmodel2/position/true_psi");
        }
        if self.on_ground.is_none() {
            self.on_ground = xplm.find_dataref("sim/flightmodel/failures/onground_any");
        }
        if self.beacon_on.is_none() {
            self.beacon_on = xplm.find_dataref("sim/cockpit2/switches/beacon_on");
        }
    }
}

/// One-shot command flags set by the host's command handlers and
/// cleared by whichever accessor reads them, so a double-click on a
/// bound key cannot fire the same request twice.
#[derive(Default)]
pub struct CommandInbox {
    dock: AtomicBool,
    undock: AtomicBool,
    toggle: AtomicBool,
    activate: AtomicBool,
    toggle_ui: AtomicBool,
    toggle_mp: AtomicBool,
}

impl CommandInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_dock(&self) {
        self.dock.store(true, Ordering::SeqCst);
    }
    pub fn request_undock(&self) {
        self.undock.store(true, Ordering::SeqCst);
    }
    pub fn request_toggle(&self) {
        self.toggle.store(true, Ordering::SeqCst);
    }
    pub fn request_activate(&self) {
        self.activate.store(true, Ordering::SeqCst);
    }
    pub fn request_toggle_ui(&self) {
        self.toggle_ui.store(true, Ordering::SeqCst);
    }
    pub fn request_toggle_mp(&self) {
        self.toggle_mp.store(true, Ordering::SeqCst);
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }
}

pub struct SceneryAnimationManager {
    pub registry: Registry,
    pub ref_frame: RefFrameTracker,
    pub my_plane: Plane,
    pub mp: MpOrchestrator,
    pub dgs: DgsInstance,
    pub prefs: Preferences,
    pub commands: CommandInbox,
    pub scheduler: Scheduler,
    pub error_disabled: bool,
    plane_drefs: PlaneDatarefs,
}

impl SceneryAnimationManager {
    pub fn new(prefs: Preferences) -> Self {
        SceneryAnimationManager {
            registry: Registry::new(),
            ref_frame: RefFrameTracker::new(),
            my_plane: Plane::new(prefs.auto_select_jws),
            mp: MpOrchestrator::new(),
            dgs: DgsInstance::new(true),
            prefs,
            commands: CommandInbox::new(),
            scheduler: Scheduler::new(),
            error_disabled: false,
            plane_drefs: PlaneDatarefs::default(),
        }
    }

    /// Load every scenery pack; a missing library pack or a single
    /// pack's unparseable manifest root disables the plugin outright.
    pub fn load_scenery(&mut self, xp_root: &std::path::Path) -> Result<(), OsError> {
        let mut rejections = Vec::new();
        self.registry = registry::load_all(xp_root, &mut rejections)?;
        Ok(())
    }

    /// One flight-loop invocation. Returns the delay (seconds, or the
    /// `-1` next-frame sentinel) the host should wait before calling
    /// back, or `0.5` forever once disabled by a fatal error.
    pub fn tick(&mut self, xplm: &dyn XplmApi, now: f32, lat_ref: f64, lon_ref: f64) -> f32 {
        if self.error_disabled {
            return 0.5;
        }
        self.ref_frame.poll(lat_ref, lon_ref);
        self.plane_drefs.resolve(xplm);

        let x = self.plane_drefs.x.map(|h| xplm.get_double(h) as f32).unwrap_or(0.0);
        let y = self.plane_drefs.y.map(|h| xplm.get_double(h) as f32).unwrap_or(0.0);
        let z = self.plane_drefs.z.map(|h| xplm.get_double(h) as f32).unwrap_or(0.0);
        let psi = self.plane_drefs.psi.map(|h| xplm.get_float(h)).unwrap_or(0.0);
        let on_ground = self.plane_drefs.on_ground.map(|h| xplm.get_int(h) != 0).unwrap_or(false);
        let beacon_on = self.plane_drefs.beacon_on.map(|h| xplm.get_int(h) != 0).unwrap_or(false);

        let inputs = PlaneInputs {
            now,
            ref_gen: self.ref_frame.gen(),
            x,
            y,
            z,
            psi,
            on_ground,
            beacon_on,
            dock_requested: CommandInbox::take(&self.commands.dock),
            undock_requested: CommandInbox::take(&self.commands.undock),
            toggle_requested: CommandInbox::take(&self.commands.toggle),
            ..Default::default()
        };

        let registry = &mut self.registry;
        let my_plane = &mut self.my_plane;
        let mp = &mut self.mp;
        let dgs = &mut self.dgs;

        let delay = self.scheduler.tick::<OsError>(
            now,
            || Ok(my_plane.tick(xplm, registry, &inputs)),
            || {
                dgs.on_ground_transition(inputs.on_ground);
                Ok(1.0)
            },
            || Ok(1.0),
            || Ok(mp.update(xplm, registry)),
        );
        self.error_disabled = self.scheduler.error_disabled;
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplm_shim::MockXplm;

    #[test]
    fn command_inbox_requests_are_one_shot() {
        let inbox = CommandInbox::new();
        inbox.request_dock();
        assert!(CommandInbox::take(&inbox.dock));
        assert!(!CommandInbox::take(&inbox.dock));
    }

    #[test]
    fn tick_runs_without_scenery_loaded() {
        let mock = MockXplm::new();
        let mut sam = SceneryAnimationManager::new(Preferences::default());
        let delay = sam.tick(&mock, 0.0, 10.0, 20.0);
        assert!(delay.is_finite());
    }
}
