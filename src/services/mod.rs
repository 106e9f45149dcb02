pub mod binding_service;

pub use binding_service::{
    drive, run_binding, BindingState, BindingStats, DigitalBinding, LoopExit, PollOutcome,
};
