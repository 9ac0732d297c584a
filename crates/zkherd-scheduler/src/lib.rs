//! zkherd-scheduler — the event-driven control loop of the zkherd framework.
//!
//! Reacts to cluster-manager events (resource offers, status updates,
//! registration) and operator mutations, moving servers through their
//! lifecycle and emitting launch/decline/kill/reconcile submissions through
//! a [`SchedulerDriver`].

pub mod driver;
pub mod scheduler;
pub mod view;

pub use driver::{DriverCall, QueueDriver, SchedulerDriver};
pub use scheduler::{AddServerRequest, FrameworkSettings, Scheduler};
pub use view::ServerView;
