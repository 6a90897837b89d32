//! Tick-driven route animation, one live simulation per agent.
//!
//! Each agent owns a slot holding a generation counter and the currently
//! running simulation, if any. Starting a run supersedes whatever the
//! slot held and bumps the generation; the spawned tick task re-checks
//! the generation under the slot lock on every tick and exits silently
//! the moment it no longer matches. That makes cancel-then-start atomic:
//! no tick of a superseded run is observable after its replacement's
//! `Start` event.
//!
//! Simulation events are published while the slot lock is held, so
//! per-agent event order on the bus matches the order things happened.
//! Ticks run on `tokio::time`, which lets tests drive the whole dance on
//! paused virtual time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use logitrack_events::EventBus;
use logitrack_routes::synthesize;
use logitrack_types::{
    AgentId, Coordinate, PackageId, Route, SimulationEvent, SimulationId, SimulationPhase,
    SimulationStatus, SimulationView, TrackerEvent,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::config::SimulationConfig;
use crate::tracker::SharedState;

/// Per-agent simulation slot.
///
/// The generation counter doubles as the next [`SimulationId`]: every
/// start and every effective cancel bumps it, invalidating any tick task
/// still holding the old value.
#[derive(Debug, Default)]
struct AgentSlot {
    generation: u64,
    running: Option<SimulationView>,
}

/// Starts, ticks, and cancels per-agent route animations.
///
/// Cheap to clone; all clones share the same slots and engine state.
#[derive(Debug, Clone)]
pub struct SimulationScheduler {
    bus: EventBus,
    settings: SimulationConfig,
    state: SharedState,
    slots: Arc<RwLock<BTreeMap<AgentId, Arc<Mutex<AgentSlot>>>>>,
}

impl SimulationScheduler {
    /// Create a scheduler animating positions inside `state`.
    pub fn new(bus: EventBus, settings: SimulationConfig, state: SharedState) -> Self {
        Self {
            bus,
            settings,
            state,
            slots: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Start a simulation walking `agent_id` from `start` to
    /// `destination`, superseding any live run for the agent.
    ///
    /// Publishes a `Cancelled` event for the superseded run (if any)
    /// followed by a `Start` event carrying the full route, then spawns
    /// the tick task. Route synthesis never fails; degenerate inputs
    /// degrade to a straight or single-point route.
    pub async fn start(
        &self,
        agent_id: AgentId,
        package_id: PackageId,
        start: Coordinate,
        destination: Coordinate,
        address: Option<String>,
    ) -> SimulationView {
        let slot = self.slot_for(agent_id).await;
        let mut guard = slot.lock().await;

        if let Some(previous) = guard.running.take() {
            info!(
                %agent_id,
                simulation_id = %previous.simulation_id,
                step = previous.step,
                "Superseding live simulation"
            );
            self.bus.publish(&TrackerEvent::Simulation(phase_event(
                &previous,
                SimulationPhase::Cancelled,
                None,
                None,
            )));
        }
        guard.generation = guard.generation.saturating_add(1);
        let generation = guard.generation;

        let mut rng = self.route_rng(generation);
        let route = synthesize(start, destination, self.settings.route_steps, &mut rng);
        let view = SimulationView {
            simulation_id: SimulationId::new(generation),
            agent_id,
            package_id,
            step: 0,
            total_steps: route.total_steps(),
            route: route.clone(),
            destination,
            address,
            started_at: Utc::now(),
        };
        guard.running = Some(view.clone());

        info!(
            %agent_id,
            %package_id,
            simulation_id = %view.simulation_id,
            steps = view.total_steps,
            kind = ?route.kind(),
            "Simulation started"
        );
        self.bus.publish(&TrackerEvent::Simulation(phase_event(
            &view,
            SimulationPhase::Start,
            None,
            Some(route),
        )));

        let task = self.clone();
        tokio::spawn(async move { task.run_route(agent_id, generation).await });
        view
    }

    /// Cancel the agent's live simulation, if any.
    ///
    /// Returns whether a run was actually cancelled; cancelling an idle
    /// agent is a quiet no-op.
    pub async fn cancel(&self, agent_id: AgentId) -> bool {
        self.cancel_matching(agent_id, None).await
    }

    /// Cancel the agent's live simulation only if it is delivering the
    /// given package.
    pub async fn cancel_for_package(&self, agent_id: AgentId, package_id: PackageId) -> bool {
        self.cancel_matching(agent_id, Some(package_id)).await
    }

    async fn cancel_matching(&self, agent_id: AgentId, package_id: Option<PackageId>) -> bool {
        let slot = self.slot_for(agent_id).await;
        let mut guard = slot.lock().await;
        let matches = guard
            .running
            .as_ref()
            .is_some_and(|running| package_id.is_none_or(|id| running.package_id == id));
        if !matches {
            return false;
        }
        let Some(previous) = guard.running.take() else {
            return false;
        };
        guard.generation = guard.generation.saturating_add(1);
        info!(
            %agent_id,
            simulation_id = %previous.simulation_id,
            step = previous.step,
            "Simulation cancelled"
        );
        self.bus.publish(&TrackerEvent::Simulation(phase_event(
            &previous,
            SimulationPhase::Cancelled,
            None,
            None,
        )));
        true
    }

    /// The agent's current simulation, or `Idle`.
    pub async fn status(&self, agent_id: AgentId) -> SimulationStatus {
        let slot = { self.slots.read().await.get(&agent_id).map(Arc::clone) };
        let Some(slot) = slot else {
            return SimulationStatus::Idle;
        };
        let guard = slot.lock().await;
        guard
            .running
            .clone()
            .map_or(SimulationStatus::Idle, SimulationStatus::Running)
    }

    /// Number of simulations currently running.
    pub async fn live_count(&self) -> usize {
        let slots: Vec<_> = self.slots.read().await.values().cloned().collect();
        let mut live = 0_usize;
        for slot in slots {
            if slot.lock().await.running.is_some() {
                live = live.saturating_add(1);
            }
        }
        live
    }

    /// The tick task for one simulation generation.
    ///
    /// Advances the step once per interval, writes the route point into
    /// the position store, and publishes a throttled `Update` stream plus
    /// exactly one `Complete` when the final point is reached. Exits
    /// silently when the slot generation moves on. Agent activity is
    /// deliberately not consulted; a run outlives its agent's session.
    async fn run_route(self, agent_id: AgentId, generation: u64) {
        let slot = self.slot_for(agent_id).await;
        let mut ticker = time::interval(Duration::from_millis(self.settings.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval yields immediately once; consume that so the first
        // step lands one full interval after the start event
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let mut guard = slot.lock().await;
            if guard.generation != generation {
                return;
            }
            let Some(running) = guard.running.as_mut() else {
                return;
            };

            let next_step = running.step.saturating_add(1);
            let Some(point) = running.route.point_at(next_step) else {
                // Single-point route: nowhere to walk, the agent already
                // stands on the destination.
                let position = running.route.last_point();
                let event = phase_event(running, SimulationPhase::Complete, position, None);
                guard.running = None;
                self.bus.publish(&TrackerEvent::Simulation(event));
                info!(%agent_id, "Simulation complete without movement");
                return;
            };
            running.step = next_step;

            let final_step = running.total_steps.saturating_sub(1);
            let done = next_step >= final_step;
            let phase = if done {
                SimulationPhase::Complete
            } else {
                SimulationPhase::Update
            };
            let event = phase_event(running, phase, Some(point), None);

            self.state
                .write()
                .await
                .store
                .apply_route_point(agent_id, point);

            if done {
                guard.running = None;
                self.bus.publish(&TrackerEvent::Simulation(event));
                info!(%agent_id, step = next_step, "Simulation complete");
                return;
            }
            if next_step
                .checked_rem(self.settings.broadcast_every)
                .is_some_and(|remainder| remainder == 0)
            {
                self.bus.publish(&TrackerEvent::Simulation(event));
            }
        }
    }

    async fn slot_for(&self, agent_id: AgentId) -> Arc<Mutex<AgentSlot>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(&agent_id) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(agent_id).or_default())
    }

    fn route_rng(&self, generation: u64) -> SmallRng {
        match self.settings.seed {
            Some(seed) => SmallRng::seed_from_u64(seed ^ generation),
            None => SmallRng::seed_from_u64(rand::rng().random()),
        }
    }
}

/// Build the bus event for one phase of a run.
fn phase_event(
    view: &SimulationView,
    phase: SimulationPhase,
    position: Option<Coordinate>,
    route: Option<Route>,
) -> SimulationEvent {
    SimulationEvent {
        simulation_id: view.simulation_id,
        agent_id: view.agent_id,
        package_id: view.package_id,
        phase,
        step: view.step,
        total_steps: view.total_steps,
        position,
        route,
        destination: view.destination,
        address: view.address.clone(),
    }
}
