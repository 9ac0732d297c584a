//! zkherd-model — value types and placement logic for the zkherd framework.
//!
//! Everything in this crate is pure, synchronous map/list work: port
//! ranges, placement constraints, per-server configuration, offer matching,
//! task building, and the ordered server collection. The event-driven
//! control loop lives in `zkherd-scheduler`.

pub mod cluster;
pub mod config;
pub mod constraint;
pub mod error;
pub mod offer;
pub mod range;
pub mod server;

pub use cluster::Cluster;
pub use config::{ServerConfig, TaskPayload, EXHIBITOR_OPTION_KEYS, SHARED_OVERRIDE_KEYS};
pub use constraint::{format_constraints, Constraint};
pub use error::{ModelError, ModelResult};
pub use offer::{ExecutorDescriptor, Offer, StatusUpdate, TaskDescriptor, TaskState};
pub use range::{format_ranges, parse_ranges, Range};
pub use server::{id_from_task_id, next_task_id, ArtifactSet, Server, ServerState, Task};
