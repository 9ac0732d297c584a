//! The emitted half of the cluster-manager interface.
//!
//! The scheduler decides; a `SchedulerDriver` carries the decision to the
//! cluster manager. The RPC framing itself is not part of this crate: the
//! deployment attaches a transport binding to the queue end of
//! [`QueueDriver`].

use tokio::sync::mpsc;

use zkherd_model::TaskDescriptor;

/// The four calls a scheduler emits toward the cluster manager.
///
/// All are non-blocking submissions; implementations must not block the
/// caller, which may hold the scheduler's critical section.
pub trait SchedulerDriver: Send {
    fn launch_task(&mut self, offer_id: &str, task: &TaskDescriptor);
    fn decline_offer(&mut self, offer_id: &str);
    fn kill_task(&mut self, task_id: &str);
    fn reconcile_tasks(&mut self, task_ids: &[String]);
}

/// One submission destined for the cluster manager.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Launch { offer_id: String, task: TaskDescriptor },
    Decline { offer_id: String },
    Kill { task_id: String },
    Reconcile { task_ids: Vec<String> },
}

/// Channel-backed driver: queues submissions for the transport binding.
///
/// Sends never block. When the receiving side is gone the call is dropped;
/// the scheduler keeps running on in-memory state and the binding re-syncs
/// through reconciliation once it is back.
pub struct QueueDriver {
    tx: mpsc::UnboundedSender<DriverCall>,
}

impl QueueDriver {
    /// Create the driver and the queue end the transport binding consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DriverCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SchedulerDriver for QueueDriver {
    fn launch_task(&mut self, offer_id: &str, task: &TaskDescriptor) {
        let _ = self.tx.send(DriverCall::Launch {
            offer_id: offer_id.to_string(),
            task: task.clone(),
        });
    }

    fn decline_offer(&mut self, offer_id: &str) {
        let _ = self.tx.send(DriverCall::Decline {
            offer_id: offer_id.to_string(),
        });
    }

    fn kill_task(&mut self, task_id: &str) {
        let _ = self.tx.send(DriverCall::Kill {
            task_id: task_id.to_string(),
        });
    }

    fn reconcile_tasks(&mut self, task_ids: &[String]) {
        let _ = self.tx.send(DriverCall::Reconcile {
            task_ids: task_ids.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_driver_delivers_calls_in_order() {
        let (mut driver, mut rx) = QueueDriver::new();

        driver.decline_offer("o1");
        driver.kill_task("exhibitor-zk0-x");
        driver.reconcile_tasks(&["a".to_string(), "b".to_string()]);

        assert_eq!(
            rx.try_recv().unwrap(),
            DriverCall::Decline { offer_id: "o1".to_string() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            DriverCall::Kill { task_id: "exhibitor-zk0-x".to_string() }
        );
        assert!(matches!(rx.try_recv().unwrap(), DriverCall::Reconcile { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_after_receiver_dropped_is_ignored() {
        let (mut driver, rx) = QueueDriver::new();
        drop(rx);
        driver.decline_offer("o1");
    }
}
