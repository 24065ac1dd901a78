use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::actor::MachineCore;

/// View of the machine handed to [`Logic`](crate::Logic) for one dispatch.
///
/// Transitions requested here are applied by the machine's work loop after
/// the current dispatch returns. Each satisfied `when` queues one dispatch of
/// the state its body left the machine in; queued dispatches run in order,
/// and a dispatch's own `when`s run before its later siblings.
pub struct Tick<'a> {
    core: &'a mut MachineCore,
    token: &'a CancellationToken,
}

impl<'a> Tick<'a> {
    pub(crate) fn new(core: &'a mut MachineCore, token: &'a CancellationToken) -> Self {
        Self { core, token }
    }

    /// Name of the machine being ticked.
    pub fn machine(&self) -> &str {
        &self.core.name
    }

    /// Current state (reflects any `become_state` already made in this dispatch).
    pub fn state(&self) -> &str {
        &self.core.current
    }

    /// State the machine was in when the running refresh was requested.
    pub fn previous_state(&self) -> Option<&str> {
        self.core.previous.as_deref()
    }

    /// Sets the current state. Does not dispatch by itself.
    pub fn become_state(&mut self, state: impl Into<String>) {
        self.core.current = state.into();
    }

    /// Opens a transition when `condition` holds.
    ///
    /// The returned [`Transition`] is the body of the `when`: once it is
    /// dropped, a dispatch of the then-current state is queued under the
    /// label `"when"`.
    ///
    /// ```text
    /// if let Some(mut next) = tick.when(temp > 40) {
    ///     next.become_state("High");
    /// }
    /// ```
    pub fn when(&mut self, condition: bool) -> Option<Transition<'_, 'a>> {
        if condition {
            Some(Transition { tick: self })
        } else {
            None
        }
    }

    /// Waits `delay`, then behaves as `when(true)`.
    ///
    /// Returns `None` without queueing anything if the machine is stopped
    /// during the wait.
    pub async fn when_after(&mut self, delay: Duration) -> Option<Transition<'_, 'a>> {
        let elapsed = tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        };
        self.when(elapsed)
    }

    /// True only on the first dispatch of a state after a transition into it.
    pub fn entry(&self) -> bool {
        self.core.entered
    }

    /// Ends the machine once the running dispatch returns.
    ///
    /// Queued dispatches are dropped, the machine's monitors stop, and later
    /// refreshes fail with [`ScriptError::MachineStopped`](crate::ScriptError::MachineStopped).
    /// [`MachineHandle::join`](crate::MachineHandle::join) waits for it.
    pub fn complete(&mut self) {
        self.core.completed = true;
    }
}

/// Body of a satisfied [`Tick::when`].
///
/// Derefs to the [`Tick`]; dropping it queues the next dispatch.
pub struct Transition<'t, 'a> {
    tick: &'t mut Tick<'a>,
}

impl<'a> Deref for Transition<'_, 'a> {
    type Target = Tick<'a>;

    fn deref(&self) -> &Self::Target {
        self.tick
    }
}

impl DerefMut for Transition<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tick
    }
}

impl Drop for Transition<'_, '_> {
    fn drop(&mut self) {
        let core = &mut *self.tick.core;
        core.pending.push(core.current.clone());
    }
}
