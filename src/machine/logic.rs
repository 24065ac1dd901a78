use async_trait::async_trait;

use super::tick::Tick;
use crate::error::ScriptError;

/// Per-state behavior of a machine.
///
/// Called once per dispatch with the current state. An error aborts the
/// refresh that caused the dispatch; the machine keeps running.
///
/// ```rust
/// use async_trait::async_trait;
/// use seqflow::{Logic, ScriptError, Tick};
///
/// struct Shutter;
///
/// #[async_trait]
/// impl Logic for Shutter {
///     async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError> {
///         match state {
///             "Closed" => {
///                 if let Some(mut next) = tick.when(true) {
///                     next.become_state("Open");
///                 }
///             }
///             _ => {}
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Logic: Send + 'static {
    async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError>;
}

/// [`Logic`] backed by a synchronous closure.
pub struct LogicFn<F>(F);

impl<F> LogicFn<F>
where
    F: FnMut(&str, &mut Tick<'_>) -> Result<(), ScriptError> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Logic for LogicFn<F>
where
    F: FnMut(&str, &mut Tick<'_>) -> Result<(), ScriptError> + Send + 'static,
{
    async fn logic(&mut self, state: &str, tick: &mut Tick<'_>) -> Result<(), ScriptError> {
        (self.0)(state, tick)
    }
}
