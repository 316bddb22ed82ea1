// Position lifecycle: exit rules and the per-token state machine
pub mod exits;
pub mod lifecycle;

pub use exits::{evaluate_exit, ExitReason};
pub use lifecycle::{
    LifecycleConfig, PositionLifecycle, Rejection, TransitionOutcome, RECOVERED_RECOMMENDER,
};
