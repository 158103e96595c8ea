//! Query lifecycle runtime.

pub mod controller;
pub mod lifecycle;
pub mod session;

pub use controller::{QueryController, SubmitOutcome, UnknownModel, WriteLog, WriteOutcome};
pub use lifecycle::{
    InvalidTransition, LifecycleError, LifecycleEvent, LifecycleState, PersistenceWriteFailed,
    Precondition, WriteStage, transition,
};
pub use session::{QuerySession, Submission};
