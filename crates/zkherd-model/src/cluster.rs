//! The ordered collection of servers the scheduler manages.

use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};
use crate::server::Server;

/// Ordered collection of servers, keyed by id.
///
/// Insertion order is significant: offers walk servers in this order, it is
/// the reconciliation order, and it defines whose attribute values count as
/// "peer history" first when constraints are evaluated.
#[derive(Debug, Default)]
pub struct Cluster {
    servers: Vec<Server>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server. Fails when the id is already present.
    pub fn add(&mut self, server: Server) -> ModelResult<()> {
        if self.get(&server.id).is_some() {
            return Err(ModelError::DuplicateServer(server.id.clone()));
        }
        self.servers.push(server);
        Ok(())
    }

    /// Remove and return a server, or `None` for an unknown id.
    pub fn remove(&mut self, id: &str) -> Option<Server> {
        let idx = self.servers.iter().position(|s| s.id == id)?;
        Some(self.servers.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Server> {
        self.servers.iter_mut().find(|s| s.id == id)
    }

    /// All servers in insertion order.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn servers_mut(&mut self) -> &mut [Server] {
        &mut self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Attribute values already bound by the *other* servers, in insertion
    /// order, keyed by attribute name.
    ///
    /// Only servers with a launched task contribute; a server still in
    /// `Added` has no placement and therefore no history.
    pub fn peer_attributes(&self, excluding: &str) -> HashMap<String, Vec<String>> {
        let mut history: HashMap<String, Vec<String>> = HashMap::new();
        for server in &self.servers {
            if server.id == excluding {
                continue;
            }
            let Some(task) = &server.last_task else {
                continue;
            };
            for (attr, value) in &task.attributes {
                history.entry(attr.clone()).or_default().push(value.clone());
            }
        }
        history
    }
}
