//! The engine facade tying tracking, simulation, lifecycle, and
//! persistence together.
//!
//! [`Tracker`] is the one handle the outside world talks to. It owns the
//! shared [`EngineState`] behind an async `RwLock`, delegates route
//! animation to the [`SimulationScheduler`], and reacts to simulation
//! phases on the event bus by walking packages through their lifecycle.
//! Package mutations write through to the persistence provider; a failed
//! write is logged and the in-memory state stands, so a flaky disk never
//! stalls live tracking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logitrack_events::{EventBus, SubscriptionFilter};
use logitrack_routes::resolve_overlaps;
use logitrack_tracking::{ActiveAgentRegistry, PositionStore, TrackingError};
use logitrack_types::{
    AgentId, AgentRecord, Coordinate, Package, PackageId, PackageStatus, Position,
    SimulationEvent, SimulationPhase, SimulationStatus, SimulationView, TrackedPosition,
    TrackerEvent,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::error::TrackerError;
use crate::lifecycle::PackageLifecycle;
use crate::persist::{PersistError, PersistenceProvider};
use crate::scheduler::SimulationScheduler;

/// Mutable tracking state shared between the facade and the scheduler's
/// tick tasks.
#[derive(Debug)]
pub struct EngineState {
    /// Latest known position per agent.
    pub store: PositionStore,
    /// Agent roster and session activity.
    pub registry: ActiveAgentRegistry,
    /// Package records and their delivery history.
    pub lifecycle: PackageLifecycle,
}

/// Shared handle to the [`EngineState`].
pub type SharedState = Arc<RwLock<EngineState>>;

/// Point-in-time engine counters, served by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    /// Agents on the roster.
    pub agents: usize,
    /// Agents with a live session.
    pub active_agents: usize,
    /// Known packages in any status.
    pub packages: usize,
    /// Simulations currently ticking.
    pub live_simulations: usize,
}

/// Facade over the whole tracking engine.
///
/// Cheap to clone; clones share state, scheduler, and bus.
#[derive(Debug, Clone)]
pub struct Tracker {
    bus: EventBus,
    state: SharedState,
    scheduler: SimulationScheduler,
    persistence: Arc<PersistenceProvider>,
}

impl Tracker {
    /// Build an engine around the given bus and persistence provider.
    ///
    /// The engine starts empty; call [`Tracker::hydrate`] to load the
    /// roster and packages, and [`Tracker::spawn_lifecycle_listener`]
    /// once a runtime is available.
    pub fn new(
        settings: SimulationConfig,
        bus: EventBus,
        persistence: PersistenceProvider,
    ) -> Self {
        let state: SharedState = Arc::new(RwLock::new(EngineState {
            store: PositionStore::new(bus.clone()),
            registry: ActiveAgentRegistry::new(bus.clone()),
            lifecycle: PackageLifecycle::new(bus.clone()),
        }));
        let scheduler = SimulationScheduler::new(bus.clone(), settings, Arc::clone(&state));
        Self {
            bus,
            state,
            scheduler,
            persistence: Arc::new(persistence),
        }
    }

    /// Load the agent roster and package ledger from persistence.
    ///
    /// Sessions do not survive restarts, so every hydrated agent starts
    /// inactive regardless of the stored flag.
    pub async fn hydrate(&self) -> Result<(), PersistError> {
        let agents = self.persistence.load_agents().await?;
        let packages = self.persistence.load_packages().await?;
        let agent_count = agents.len();
        let package_count = packages.len();
        let mut state = self.state.write().await;
        for agent in agents {
            state.registry.register(agent.id, agent.name);
        }
        state.lifecycle.hydrate(packages);
        drop(state);
        info!(
            agents = agent_count,
            packages = package_count,
            provider = self.persistence.name(),
            "Engine state hydrated"
        );
        Ok(())
    }

    /// Spawn the task that folds simulation phases into package state.
    ///
    /// The subscription is taken before the task is spawned, so phases
    /// published from this point on are never missed. The task runs for
    /// the life of the bus.
    pub fn spawn_lifecycle_listener(&self) -> JoinHandle<()> {
        let mut subscription = self.bus.subscribe(SubscriptionFilter::All);
        let tracker = self.clone();
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let TrackerEvent::Simulation(simulation) = event {
                    tracker.apply_simulation_phase(&simulation).await;
                }
            }
            debug!("Lifecycle listener stopped; event bus closed");
        })
    }

    async fn apply_simulation_phase(&self, event: &SimulationEvent) {
        let applied = match event.phase {
            SimulationPhase::Start => {
                let mut state = self.state.write().await;
                state.lifecycle.begin_transit(event.package_id)
            }
            SimulationPhase::Complete => {
                let mut state = self.state.write().await;
                state.lifecycle.complete_delivery(event.package_id)
            }
            SimulationPhase::Update | SimulationPhase::Cancelled => return,
        };
        match applied {
            Ok(package) => self.persist_status(&package).await,
            Err(TrackerError::InvalidTransition { package_id, from, to }) => {
                // Restarted or re-simulated runs revisit edges that were
                // already walked.
                debug!(%package_id, ?from, ?to, "Simulation phase ignored by lifecycle");
            }
            Err(error) => warn!(%error, "Simulation phase could not be applied"),
        }
    }

    /// Record a position reported by an agent.
    pub async fn record_position(
        &self,
        agent_id: AgentId,
        coordinate: Coordinate,
        recorded_at: DateTime<Utc>,
    ) -> Result<Position, TrackerError> {
        let mut state = self.state.write().await;
        if !state.registry.contains(agent_id) {
            return Err(TrackingError::UnknownAgent(agent_id).into());
        }
        Ok(state.store.record(agent_id, coordinate, recorded_at)?)
    }

    /// Flip an agent's session activity, returning the previous flag.
    pub async fn set_active(&self, agent_id: AgentId, active: bool) -> Result<bool, TrackerError> {
        let mut state = self.state.write().await;
        Ok(state.registry.set_active(agent_id, active)?)
    }

    /// Start delivering a package, animating the agent towards the
    /// destination.
    ///
    /// The package must be assigned to the agent and the agent must have
    /// reported at least one position. The destination falls back to the
    /// package's stored coordinate and the label to its address. Any
    /// run already animating this agent is superseded.
    pub async fn start_delivery(
        &self,
        agent_id: AgentId,
        package_id: PackageId,
        destination: Option<Coordinate>,
        address: Option<String>,
    ) -> Result<SimulationView, TrackerError> {
        // Resolve under a read lock, then release it before the
        // scheduler takes the agent's slot.
        let (start, destination, address) = {
            let state = self.state.read().await;
            if !state.registry.contains(agent_id) {
                return Err(TrackingError::UnknownAgent(agent_id).into());
            }
            let Some(package) = state.lifecycle.get(package_id) else {
                return Err(TrackerError::UnknownPackage(package_id));
            };
            if package.assigned_agent != Some(agent_id) {
                return Err(TrackerError::NotAssignedToAgent {
                    package_id,
                    agent_id,
                    assigned: package.assigned_agent,
                });
            }
            let Some(position) = state.store.position_of(agent_id) else {
                return Err(TrackerError::AgentPositionUnknown(agent_id));
            };
            let Some(destination) = destination.or(package.destination) else {
                return Err(TrackerError::DestinationUnknown(package_id));
            };
            let address = address.unwrap_or_else(|| package.address.clone());
            (position.coordinate, destination, address)
        };
        Ok(self
            .scheduler
            .start(agent_id, package_id, start, destination, Some(address))
            .await)
    }

    /// Cancel the agent's live simulation, if any.
    ///
    /// Idempotent; returns whether a run was actually stopped. The
    /// package stays in transit -- cancelling abandons the animation,
    /// not the delivery.
    pub async fn cancel_delivery(&self, agent_id: AgentId) -> bool {
        self.scheduler.cancel(agent_id).await
    }

    /// Manually mark an in-transit package as returned.
    ///
    /// Stops the run delivering it first, so no completion can race past
    /// the return. Errors if the package is unknown or not in transit.
    pub async fn mark_returned(&self, package_id: PackageId) -> Result<Package, TrackerError> {
        let assigned = {
            let state = self.state.read().await;
            let Some(package) = state.lifecycle.get(package_id) else {
                return Err(TrackerError::UnknownPackage(package_id));
            };
            if package.status != PackageStatus::InTransit {
                return Err(TrackerError::InvalidTransition {
                    package_id,
                    from: package.status,
                    to: PackageStatus::Returned,
                });
            }
            package.assigned_agent
        };
        if let Some(agent_id) = assigned {
            self.scheduler.cancel_for_package(agent_id, package_id).await;
        }
        let returned = {
            let mut state = self.state.write().await;
            state.lifecycle.mark_returned(package_id)?
        };
        self.persist_status(&returned).await;
        Ok(returned)
    }

    /// Create a package, optionally assigned and geocoded.
    pub async fn create_package(
        &self,
        address: String,
        destination: Option<Coordinate>,
        assigned_agent: Option<AgentId>,
    ) -> Result<Package, TrackerError> {
        let package = {
            let mut state = self.state.write().await;
            if let Some(agent_id) = assigned_agent {
                if !state.registry.contains(agent_id) {
                    return Err(TrackingError::UnknownAgent(agent_id).into());
                }
            }
            state.lifecycle.create(address, destination, assigned_agent)?
        };
        self.persist_package(&package).await;
        Ok(package)
    }

    /// Assign a not-yet-moving package to an agent.
    pub async fn assign_package(
        &self,
        package_id: PackageId,
        agent_id: AgentId,
    ) -> Result<Package, TrackerError> {
        let package = {
            let mut state = self.state.write().await;
            if !state.registry.contains(agent_id) {
                return Err(TrackingError::UnknownAgent(agent_id).into());
            }
            state.lifecycle.assign(package_id, agent_id)?
        };
        self.persist_package(&package).await;
        Ok(package)
    }

    /// Positions of all active agents, nudged apart where they overlap.
    pub async fn snapshot_positions(&self) -> Vec<TrackedPosition> {
        let state = self.state.read().await;
        let mut tracked = Vec::new();
        for agent in state.registry.roster() {
            if !agent.active {
                continue;
            }
            if let Some(position) = state.store.position_of(agent.id) {
                tracked.push(TrackedPosition::from_position(agent.id, agent.name, &position));
            }
        }
        drop(state);
        resolve_overlaps(&tracked)
    }

    /// The agent's current simulation, or `Idle`.
    pub async fn simulation_status(&self, agent_id: AgentId) -> SimulationStatus {
        self.scheduler.status(agent_id).await
    }

    /// The full agent roster.
    pub async fn list_agents(&self) -> Vec<AgentRecord> {
        self.state.read().await.registry.roster()
    }

    /// Every known package.
    pub async fn list_packages(&self) -> Vec<Package> {
        self.state.read().await.lifecycle.list()
    }

    /// Packages assigned to one agent.
    pub async fn packages_for(&self, agent_id: AgentId) -> Vec<Package> {
        self.state.read().await.lifecycle.assigned_to(agent_id)
    }

    /// Look up a single package.
    pub async fn package(&self, package_id: PackageId) -> Result<Package, TrackerError> {
        self.state
            .read()
            .await
            .lifecycle
            .get(package_id)
            .cloned()
            .ok_or(TrackerError::UnknownPackage(package_id))
    }

    /// Latest stored position for an agent.
    pub async fn position_of(&self, agent_id: AgentId) -> Option<Position> {
        self.state.read().await.store.position_of(agent_id)
    }

    /// Current engine counters.
    pub async fn stats(&self) -> TrackerStats {
        let (agents, active_agents, packages) = {
            let state = self.state.read().await;
            (
                state.registry.len(),
                state.registry.active_ids().len(),
                state.lifecycle.len(),
            )
        };
        TrackerStats {
            agents,
            active_agents,
            packages,
            live_simulations: self.scheduler.live_count().await,
        }
    }

    /// The engine's event bus, for wiring subscribers.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Name of the configured persistence provider, for status reporting.
    pub fn persistence_name(&self) -> &'static str {
        self.persistence.name()
    }

    async fn persist_status(&self, package: &Package) {
        if let Err(error) = self
            .persistence
            .save_package_status(package.id, package.status, package.updated_at)
            .await
        {
            warn!(
                package_id = %package.id,
                %error,
                "Package write-through failed; in-memory state stands"
            );
        }
    }

    async fn persist_package(&self, package: &Package) {
        if let Err(error) = self.persistence.save_package(package).await {
            warn!(
                package_id = %package.id,
                %error,
                "Package write-through failed; in-memory state stands"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use logitrack_events::Subscription;

    use super::*;

    const COURIER: AgentId = AgentId::new(1);
    const BACKUP: AgentId = AgentId::new(2);
    const PARCEL: PackageId = PackageId::new(10);
    const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);
    const DROP_OFF: Coordinate = Coordinate::new(0.01, 0.01);
    const TICK_MS: u64 = 200;

    fn seeded_tracker() -> Tracker {
        let agents = vec![
            AgentRecord {
                id: COURIER,
                name: String::from("Marta"),
                active: false,
            },
            AgentRecord {
                id: BACKUP,
                name: String::from("Jordi"),
                active: false,
            },
        ];
        let packages = vec![Package {
            id: PARCEL,
            address: String::from("Carrer de Mallorca 401"),
            destination: Some(DROP_OFF),
            assigned_agent: Some(COURIER),
            status: PackageStatus::Assigned,
            updated_at: Utc::now(),
        }];
        let settings = SimulationConfig {
            tick_interval_ms: TICK_MS,
            broadcast_every: 5,
            route_steps: 80,
            seed: Some(7),
        };
        Tracker::new(
            settings,
            EventBus::new(),
            PersistenceProvider::seeded(agents, packages),
        )
    }

    async fn booted_tracker() -> Tracker {
        let tracker = seeded_tracker();
        tracker.hydrate().await.unwrap();
        tracker.spawn_lifecycle_listener();
        tracker
    }

    fn drain_simulation(sub: &mut Subscription) -> Vec<SimulationEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.try_recv() {
            if let TrackerEvent::Simulation(simulation) = event {
                events.push(simulation);
            }
        }
        events
    }

    /// Advance paused time by `ticks` intervals plus a small margin.
    async fn advance_ticks(ticks: u64) {
        let ms = TICK_MS.saturating_mul(ticks).saturating_add(20);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_runs_from_assignment_to_delivered() {
        let tracker = booted_tracker().await;
        tracker
            .record_position(COURIER, ORIGIN, Utc::now())
            .await
            .unwrap();
        tracker.set_active(COURIER, true).await.unwrap();

        let view = tracker
            .start_delivery(COURIER, PARCEL, None, None)
            .await
            .unwrap();
        assert_eq!(view.destination, DROP_OFF);
        assert_eq!(view.address.as_deref(), Some("Carrer de Mallorca 401"));

        // Give the listener a turn to fold the start phase in.
        tokio::task::yield_now().await;
        let package = tracker.package(PARCEL).await.unwrap();
        assert_eq!(package.status, PackageStatus::InTransit);

        advance_ticks(100).await;

        let package = tracker.package(PARCEL).await.unwrap();
        assert_eq!(package.status, PackageStatus::Delivered);
        assert_eq!(
            tracker.simulation_status(COURIER).await,
            SimulationStatus::Idle
        );
        let position = tracker.position_of(COURIER).await.unwrap();
        assert!(position.coordinate.degree_distance(&DROP_OFF) < 2e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn returned_package_stops_the_run_for_good() {
        let tracker = booted_tracker().await;
        let mut sub = tracker.bus().subscribe(SubscriptionFilter::All);
        tracker
            .record_position(COURIER, ORIGIN, Utc::now())
            .await
            .unwrap();

        let view = tracker
            .start_delivery(COURIER, PARCEL, None, None)
            .await
            .unwrap();
        tokio::task::yield_now().await;
        advance_ticks(3).await;

        let returned = tracker.mark_returned(PARCEL).await.unwrap();
        assert_eq!(returned.status, PackageStatus::Returned);
        assert_eq!(
            tracker.simulation_status(COURIER).await,
            SimulationStatus::Idle
        );

        // A second return is rejected, and nothing completes later.
        let again = tracker.mark_returned(PARCEL).await;
        assert_eq!(
            again,
            Err(TrackerError::InvalidTransition {
                package_id: PARCEL,
                from: PackageStatus::Returned,
                to: PackageStatus::Returned,
            })
        );
        advance_ticks(100).await;
        assert_eq!(
            tracker.package(PARCEL).await.unwrap().status,
            PackageStatus::Returned
        );

        let events = drain_simulation(&mut sub);
        assert!(
            events
                .iter()
                .any(|event| event.phase == SimulationPhase::Cancelled)
        );
        assert!(
            events
                .iter()
                .all(|event| event.phase != SimulationPhase::Complete)
        );

        // The agent froze on the last walked point.
        let position = tracker.position_of(COURIER).await.unwrap();
        assert_eq!(position.coordinate, view.route.point_at(3).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn start_rejects_missing_preconditions() {
        let tracker = booted_tracker().await;

        let ghost = AgentId::new(99);
        assert_eq!(
            tracker.start_delivery(ghost, PARCEL, None, None).await,
            Err(TrackerError::Tracking(TrackingError::UnknownAgent(ghost)))
        );

        // Known agent, but it never reported a position.
        assert_eq!(
            tracker.start_delivery(COURIER, PARCEL, None, None).await,
            Err(TrackerError::AgentPositionUnknown(COURIER))
        );

        tracker
            .record_position(BACKUP, ORIGIN, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            tracker.start_delivery(BACKUP, PARCEL, None, None).await,
            Err(TrackerError::NotAssignedToAgent {
                package_id: PARCEL,
                agent_id: BACKUP,
                assigned: Some(COURIER),
            })
        );

        let missing = PackageId::new(404);
        assert_eq!(
            tracker.start_delivery(BACKUP, missing, None, None).await,
            Err(TrackerError::UnknownPackage(missing))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_destination_covers_ungeocodable_packages() {
        let tracker = booted_tracker().await;
        tracker
            .record_position(COURIER, ORIGIN, Utc::now())
            .await
            .unwrap();
        let package = tracker
            .create_package(String::from("Carrer Nou 5"), None, Some(COURIER))
            .await
            .unwrap();

        assert_eq!(
            tracker.start_delivery(COURIER, package.id, None, None).await,
            Err(TrackerError::DestinationUnknown(package.id))
        );

        let view = tracker
            .start_delivery(COURIER, package.id, Some(DROP_OFF), None)
            .await
            .unwrap();
        assert_eq!(view.destination, DROP_OFF);
        assert_eq!(view.address.as_deref(), Some("Carrer Nou 5"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_mid_run_still_delivers_exactly_once() {
        let tracker = booted_tracker().await;
        let mut sub = tracker.bus().subscribe(SubscriptionFilter::All);
        tracker
            .record_position(COURIER, ORIGIN, Utc::now())
            .await
            .unwrap();

        let first = tracker
            .start_delivery(COURIER, PARCEL, None, None)
            .await
            .unwrap();
        advance_ticks(3).await;
        let second = tracker
            .start_delivery(COURIER, PARCEL, None, None)
            .await
            .unwrap();
        assert!(second.simulation_id > first.simulation_id);

        advance_ticks(100).await;

        let events = drain_simulation(&mut sub);
        let completes: Vec<_> = events
            .iter()
            .filter(|event| event.phase == SimulationPhase::Complete)
            .collect();
        assert_eq!(completes.len(), 1);
        assert_eq!(
            completes.first().unwrap().simulation_id,
            second.simulation_id
        );
        assert_eq!(
            tracker.package(PARCEL).await.unwrap().status,
            PackageStatus::Delivered
        );
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_agents_still_finish_their_runs() {
        let tracker = booted_tracker().await;
        tracker
            .record_position(COURIER, ORIGIN, Utc::now())
            .await
            .unwrap();

        // Nobody flipped the session on; the run must not care.
        tracker
            .start_delivery(COURIER, PARCEL, None, None)
            .await
            .unwrap();
        advance_ticks(100).await;

        assert_eq!(
            tracker.package(PARCEL).await.unwrap().status,
            PackageStatus::Delivered
        );
        // Inactive agents are invisible to the overlap-resolved snapshot.
        assert!(tracker.snapshot_positions().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_and_assign_round_trip() {
        let tracker = booted_tracker().await;

        let package = tracker
            .create_package(String::from("Avinguda Diagonal 640"), Some(DROP_OFF), None)
            .await
            .unwrap();
        assert_eq!(package.status, PackageStatus::Assigned);
        assert_eq!(package.assigned_agent, None);

        let assigned = tracker.assign_package(package.id, BACKUP).await.unwrap();
        assert_eq!(assigned.assigned_agent, Some(BACKUP));

        let ghost = AgentId::new(99);
        assert_eq!(
            tracker.assign_package(package.id, ghost).await,
            Err(TrackerError::Tracking(TrackingError::UnknownAgent(ghost)))
        );
        assert_eq!(
            tracker
                .create_package(String::from("Nowhere"), Some(Coordinate::new(91.0, 0.0)), None)
                .await,
            Err(TrackerError::Tracking(TrackingError::InvalidCoordinate {
                latitude: 91.0,
                longitude: 0.0,
            }))
        );

        assert_eq!(tracker.list_packages().await.len(), 2);
        let backpack = tracker.packages_for(BACKUP).await;
        assert_eq!(backpack.len(), 1);
        assert_eq!(backpack.first().unwrap().id, package.id);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_follow_the_live_engine() {
        let tracker = booted_tracker().await;
        assert_eq!(
            tracker.stats().await,
            TrackerStats {
                agents: 2,
                active_agents: 0,
                packages: 1,
                live_simulations: 0,
            }
        );

        tracker
            .record_position(COURIER, ORIGIN, Utc::now())
            .await
            .unwrap();
        tracker.set_active(COURIER, true).await.unwrap();
        tracker
            .start_delivery(COURIER, PARCEL, None, None)
            .await
            .unwrap();

        let stats = tracker.stats().await;
        assert_eq!(stats.active_agents, 1);
        assert_eq!(stats.live_simulations, 1);

        // Hydrated rosters always boot with sessions off.
        let roster = tracker.list_agents().await;
        assert_eq!(roster.len(), 2);
        assert!(!tracker.cancel_delivery(BACKUP).await);
        assert!(tracker.cancel_delivery(COURIER).await);
        assert_eq!(tracker.stats().await.live_simulations, 0);
    }
}
