//! Session ownership and drain mode
//!
//! Lets an agent orchestrator register one owning session per store and
//! hold that session to its task list until the work is drained.

mod drain;
mod hook;
mod store;

pub use drain::{decide, DrainCoordinator, DrainRelease, StopDecision};
pub use hook::{HookInput, HookInputError, HookResponse};
pub use store::{Session, SessionClaim, SessionError, SessionStore};
