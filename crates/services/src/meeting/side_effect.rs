//! Best-effort steps that run alongside a primary operation.
//!
//! Components report them instead of logging; the lifecycle manager logs
//! failures and spawns deferred work.

use futures::future::BoxFuture;

use crate::error::MeetingResult;

/// A best-effort step that already ran.
#[derive(Debug)]
pub struct SideEffect {
    pub step: &'static str,
    pub result: MeetingResult<()>,
}

impl SideEffect {
    pub fn new(step: &'static str, result: MeetingResult<()>) -> Self {
        Self { step, result }
    }
}

/// A best-effort step to run in the background after the primary write.
pub struct Deferred {
    pub step: &'static str,
    pub task: BoxFuture<'static, MeetingResult<()>>,
}

impl Deferred {
    pub fn new(
        step: &'static str,
        task: impl std::future::Future<Output = MeetingResult<()>> + Send + 'static,
    ) -> Self {
        Self {
            step,
            task: Box::pin(task),
        }
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").field("step", &self.step).finish()
    }
}

/// Result of a primary operation plus its pending side steps.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<SideEffect>,
    pub deferred: Vec<Deferred>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: SideEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_deferred(mut self, deferred: Deferred) -> Self {
        self.deferred.push(deferred);
        self
    }

    /// Moves the side steps of `other` into `self`, returning `other`'s value.
    pub fn absorb<U>(&mut self, other: Outcome<U>) -> U {
        self.effects.extend(other.effects);
        self.deferred.extend(other.deferred);
        other.value
    }
}
