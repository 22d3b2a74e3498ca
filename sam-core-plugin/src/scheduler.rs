//! Single flight-loop dispatcher: schedules the jetway, DGS, animation
//! and multiplayer subsystems independently and reports the minimum
//! delay the host should wait before calling back in.

/// Sentinel the host flight-loop callback interprets as "call again next
/// frame" rather than waiting a fixed number of seconds.
pub const NEXT_FRAME: f32 = -1.0;

#[derive(Debug, Clone, Copy)]
struct Subsystem {
    next_due: f32,
}

impl Subsystem {
    fn new() -> Self {
        Subsystem { next_due: 0.0 }
    }

    fn due(&self, now: f32) -> bool {
        now >= self.next_due
    }

    fn reschedule(&mut self, now: f32, delay: f32) {
        self.next_due = if delay == NEXT_FRAME { now } else { now + delay.max(0.0) };
    }
}

pub struct Scheduler {
    jw: Subsystem,
    dgs: Subsystem,
    anim: Subsystem,
    mp: Subsystem,
    pub error_disabled: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            jw: Subsystem::new(),
            dgs: Subsystem::new(),
            anim: Subsystem::new(),
            mp: Subsystem::new(),
            error_disabled: false,
        }
    }

    /// Run one flight-loop tick. Each `tick_*` closure is only invoked
    /// when its subsystem is due, and must return the delay before it
    /// should run again. Any `Err` disables the plugin for the rest of
    /// the run, matching the original's catch-all error boundary.
    pub fn tick<E>(
        &mut self,
        now: f32,
        mut tick_jw: impl FnMut() -> Result<f32, E>,
        mut tick_dgs: impl FnMut() -> Result<f32, E>,
        mut tick_anim: impl FnMut() -> Result<f32, E>,
        mut tick_mp: impl FnMut() -> Result<f32, E>,
    ) -> f32 {
        if self.error_disabled {
            return NEXT_FRAME.abs().max(1.0);
        }

        let mut min_delay = f32::MAX;
        let mut run = |sub: &mut Subsystem, f: &mut dyn FnMut() -> Result<f32, E>, disabled: &mut bool| {
            if !sub.due(now) {
                min_delay = min_delay.min((sub.next_due - now).max(0.0));
                return;
            }
            match f() {
                Ok(delay) => {
                    sub.reschedule(now, delay);
                    min_delay = min_delay.min(if delay == NEXT_FRAME { 0.0 } else { delay });
                }
                Err(_) => *disabled = true,
            }
        };

        run(&mut self.jw, &mut tick_jw, &mut self.error_disabled);
        run(&mut self.dgs, &mut tick_dgs, &mut self.error_disabled);
        run(&mut self.anim, &mut tick_anim, &mut self.error_disabled);
        run(&mut self.mp, &mut tick_mp, &mut self.error_disabled);

        if self.error_disabled {
            return 1.0;
        }
        if min_delay == f32::MAX {
            1.0
        } else {
            min_delay
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_subsystems_run_on_first_tick() {
        let mut sched = Scheduler::new();
        let mut calls = 0;
        sched.tick::<()>(
            0.0,
            || { calls += 1; Ok(1.0) },
            || Ok(1.0),
            || Ok(1.0),
            || Ok(1.0),
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn error_disables_remaining_run() {
        let mut sched = Scheduler::new();
        sched.tick(
            0.0,
            || Err::<f32, &str>("boom"),
            || Ok(1.0),
            || Ok(1.0),
            || Ok(1.0),
        );
        assert!(sched.error_disabled);
        let mut calls = 0;
        sched.tick::<()>(
            1.0,
            || { calls += 1; Ok(1.0) },
            || Ok(1.0),
            || Ok(1.0),
            || Ok(1.0),
        );
        assert_eq!(calls, 0);
    }

    #[test]
    fn subsystem_not_due_is_skipped_until_its_own_delay_elapses() {
        let mut sched = Scheduler::new();
        let mut jw_calls = 0;
        sched.tick::<()>(0.0, || { jw_calls += 1; Ok(5.0) }, || Ok(1.0), || Ok(1.0), || Ok(1.0));
        sched.tick::<()>(1.0, || { jw_calls += 1; Ok(5.0) }, || Ok(1.0), || Ok(1.0), || Ok(1.0));
        assert_eq!(jw_calls, 1);
    }
}
