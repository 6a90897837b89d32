//! Roster and live-session registry.
//!
//! Knows every agent the engine has been told about and which of them
//! currently have a live session. Agents are registered at startup (and
//! whenever the backoffice adds one); they are never removed at runtime,
//! only flipped inactive. Real session changes publish
//! [`TrackerEvent::ActiveAgentsChanged`] with the full active list, the
//! shape console maps want for redrawing their marker set.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use logitrack_events::EventBus;
use logitrack_types::{AgentId, AgentRecord, TrackerEvent};
use tracing::info;

use crate::error::TrackingError;

/// The agent roster plus the live-session set.
#[derive(Debug)]
pub struct ActiveAgentRegistry {
    bus: EventBus,
    agents: BTreeMap<AgentId, AgentRecord>,
}

impl ActiveAgentRegistry {
    /// Create an empty registry publishing on `bus`.
    pub const fn new(bus: EventBus) -> Self {
        Self {
            bus,
            agents: BTreeMap::new(),
        }
    }

    /// Add an agent to the roster, inactive until a session arrives.
    ///
    /// Registering an id that already exists updates the display name and
    /// keeps the current session state; it never publishes.
    pub fn register(&mut self, id: AgentId, name: impl Into<String>) {
        let name = name.into();
        match self.agents.entry(id) {
            Entry::Occupied(mut entry) => entry.get_mut().name = name,
            Entry::Vacant(entry) => {
                entry.insert(AgentRecord {
                    id,
                    name,
                    active: false,
                });
            }
        }
    }

    /// Flip an agent's session state.
    ///
    /// Returns whether anything changed. Setting the state the agent is
    /// already in is a no-op success and publishes nothing, so repeated
    /// connect notifications never produce duplicate roster events.
    pub fn set_active(&mut self, id: AgentId, active: bool) -> Result<bool, TrackingError> {
        let Some(record) = self.agents.get_mut(&id) else {
            return Err(TrackingError::UnknownAgent(id));
        };
        if record.active == active {
            return Ok(false);
        }
        record.active = active;
        info!(agent_id = %id, active, "Agent session changed");

        let active_ids = self.active_ids();
        self.bus
            .publish(&TrackerEvent::ActiveAgentsChanged { active: active_ids });
        Ok(true)
    }

    /// Whether the roster knows this agent.
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Whether the agent currently has a live session.
    pub fn is_active(&self, id: AgentId) -> bool {
        self.agents.get(&id).is_some_and(|record| record.active)
    }

    /// Roster entry for an agent.
    pub fn get(&self, id: AgentId) -> Option<&AgentRecord> {
        self.agents.get(&id)
    }

    /// Display name for an agent.
    pub fn name_of(&self, id: AgentId) -> Option<&str> {
        self.agents.get(&id).map(|record| record.name.as_str())
    }

    /// Ids of all agents with a live session, in id order.
    pub fn active_ids(&self) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|record| record.active)
            .map(|record| record.id)
            .collect()
    }

    /// The full roster in id order.
    pub fn roster(&self) -> Vec<AgentRecord> {
        self.agents.values().cloned().collect()
    }

    /// Number of agents in the roster.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
