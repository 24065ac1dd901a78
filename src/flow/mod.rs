//! Structured concurrency helpers: fan-out with [`par`] and paced loops.

mod par;
mod poll;

pub use par::par;
pub(crate) use par::run_par;
pub(crate) use poll::PollLoop;
pub use poll::{
    bg_loop, poll_loop, poll_loop_with_interval, stop_when, wait_for, LoopExit, LoopHandle,
    LoopResult,
};
