//! Workout session.
//!
//! A session walks the user through today's plan day one exercise at a time.
//! Traditional blocks are done exercise by exercise with a set tracker each;
//! circuit blocks are logged as a unit and completed together.
//!
//! [`SessionController`] is the synchronous state machine. [`WorkoutSession`]
//! wraps it for async use: it talks to the backend and runs the one-second
//! ticker that drives the timers.

mod controller;
mod error;
mod event;
mod handle;

pub use controller::{
    Advance, LoadOutcome, PersistBatch, SessionController, SessionSnapshot, SessionState,
    StepOutcome,
};
pub use error::SessionError;
pub use event::SessionEvent;
pub use handle::WorkoutSession;
