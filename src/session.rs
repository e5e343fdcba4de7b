//! Conversation controller state machine
//!
//! Pure transitions over an explicit session value; the runtime owns
//! the authoritative copy and executes the returned effects.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    ErrorSource, InFlight, RenderDirective, Session, SessionContext, SessionError, SessionPhase,
};
pub use transition::{transition, Transition, TransitionError};
