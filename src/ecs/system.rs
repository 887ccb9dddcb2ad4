//! The system lifecycle.
//!
//! A system is driven once per world step through [`Process::process`], a fixed template
//! that is implemented for every [`BaseSystem`] and cannot be overridden:
//!
//! ```text
//! if check_processing() { begin(); process_system(); end(); }
//! ```
//!
//! Implementors supply [`BaseSystem::process_system`] and access to their [`SystemState`];
//! every other hook has a default.

/// Flags shared by every system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemState {
    /// Whether the system takes part in processing
    pub enabled: bool,
    /// Whether [`BaseSystem::initialize`] has run
    pub initialized: bool,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            enabled: true,
            initialized: false,
        }
    }
}

/// A system processed once per world step.
///
/// # Examples
///
/// ```rust
/// use weavescope::ecs::{BaseSystem, Process, SystemState};
///
/// #[derive(Default)]
/// struct Counter {
///     state: SystemState,
///     ticks: u32,
/// }
///
/// impl BaseSystem for Counter {
///     fn state(&self) -> &SystemState {
///         &self.state
///     }
///
///     fn state_mut(&mut self) -> &mut SystemState {
///         &mut self.state
///     }
///
///     fn process_system(&mut self) {
///         self.ticks += 1;
///     }
/// }
///
/// let mut counter = Counter::default();
/// counter.process();
/// assert_eq!(counter.ticks, 0);
///
/// counter.initialize();
/// counter.process();
/// assert_eq!(counter.ticks, 1);
/// ```
pub trait BaseSystem {
    /// The lifecycle flags of this system.
    fn state(&self) -> &SystemState;

    /// Mutable access to the lifecycle flags.
    fn state_mut(&mut self) -> &mut SystemState;

    /// Called once when the system is added to a world.
    ///
    /// Overrides must keep marking the system initialized, or it never processes.
    fn initialize(&mut self) {
        self.state_mut().initialized = true;
    }

    /// Called before [`BaseSystem::process_system`] on every processed step.
    fn begin(&mut self) {}

    /// The work of one step.
    fn process_system(&mut self);

    /// Called after [`BaseSystem::process_system`] on every processed step.
    fn end(&mut self) {}

    /// Whether the system takes part in processing.
    fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    /// Enable or disable the system.
    fn set_enabled(&mut self, enabled: bool) {
        self.state_mut().enabled = enabled;
    }

    /// Gate evaluated at the start of every step: initialized and enabled.
    fn check_processing(&self) -> bool {
        let state = self.state();
        state.initialized && state.enabled
    }
}

/// The processing entry point of a system.
pub trait Process {
    /// Run one step: `begin`, `process_system` and `end` in that order, if
    /// [`BaseSystem::check_processing`] allows it.
    fn process(&mut self);
}

impl<S: BaseSystem + ?Sized> Process for S {
    fn process(&mut self) {
        if self.check_processing() {
            self.begin();
            self.process_system();
            self.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        state: SystemState,
        calls: Vec<&'static str>,
        gate: Option<bool>,
    }

    impl BaseSystem for Recorder {
        fn state(&self) -> &SystemState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut SystemState {
            &mut self.state
        }

        fn begin(&mut self) {
            self.calls.push("begin");
        }

        fn process_system(&mut self) {
            self.calls.push("process");
        }

        fn end(&mut self) {
            self.calls.push("end");
        }

        fn check_processing(&self) -> bool {
            self.gate
                .unwrap_or(self.state.initialized && self.state.enabled)
        }
    }

    #[test]
    fn test_template_order() {
        let mut system = Recorder::default();
        system.initialize();
        system.process();
        system.process();
        assert_eq!(
            system.calls,
            ["begin", "process", "end", "begin", "process", "end"]
        );
    }

    #[test]
    fn test_uninitialized_does_not_process() {
        let mut system = Recorder::default();
        system.process();
        assert!(system.calls.is_empty());
    }

    #[test]
    fn test_disabled_does_not_process() {
        let mut system = Recorder::default();
        system.initialize();
        system.set_enabled(false);
        assert!(!system.is_enabled());
        system.process();
        assert!(system.calls.is_empty());

        system.set_enabled(true);
        system.process();
        assert_eq!(system.calls.len(), 3);
    }

    #[test]
    fn test_custom_gate() {
        let mut system = Recorder {
            gate: Some(false),
            ..Recorder::default()
        };
        system.initialize();
        system.process();
        assert!(system.calls.is_empty());

        let mut open = Recorder {
            gate: Some(true),
            ..Recorder::default()
        };
        {
            let dynamic: &mut dyn BaseSystem = &mut open;
            dynamic.process();
        }
        assert_eq!(open.calls, ["begin", "process", "end"]);
    }
}
