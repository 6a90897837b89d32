//! Package table and delivery-status state machine.
//!
//! Statuses walk forward only: `Assigned -> InTransit` when a simulation
//! starts, `InTransit -> Delivered` when one completes naturally, and
//! `InTransit -> Returned` on the manual return command. `Delivered` and
//! `Returned` are terminal. There are no other edges; in particular a
//! cancelled simulation leaves its package `InTransit` until it is either
//! delivered by a later run or manually returned.
//!
//! The table is plain data guarded by the engine facade's lock. Simulation
//! phases reach it through the facade's bus listener, which decides
//! whether a rejected edge is logged (engine-internal triggers) or
//! surfaced (operator commands).

use std::collections::BTreeMap;

use chrono::Utc;
use logitrack_events::EventBus;
use logitrack_tracking::TrackingError;
use logitrack_types::{AgentId, Coordinate, Package, PackageId, PackageStatus, TrackerEvent};
use tracing::info;

use crate::error::TrackerError;

/// The package table and its status guards.
#[derive(Debug)]
pub struct PackageLifecycle {
    bus: EventBus,
    packages: BTreeMap<PackageId, Package>,
    next_id: u64,
}

impl PackageLifecycle {
    /// Create an empty table publishing on `bus`.
    pub const fn new(bus: EventBus) -> Self {
        Self {
            bus,
            packages: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Load packages from the persistence provider at startup.
    ///
    /// Later ids are allocated above the highest hydrated one.
    pub fn hydrate(&mut self, packages: Vec<Package>) {
        for package in packages {
            self.next_id = self.next_id.max(package.id.into_inner());
            self.packages.insert(package.id, package);
        }
    }

    /// Create a package in `Assigned` status and announce it.
    ///
    /// # Errors
    ///
    /// Rejects a destination outside the WGS84 ranges.
    pub fn create(
        &mut self,
        address: String,
        destination: Option<Coordinate>,
        assigned_agent: Option<AgentId>,
    ) -> Result<Package, TrackerError> {
        if let Some(coordinate) = destination {
            if !coordinate.is_in_bounds() {
                return Err(TrackingError::InvalidCoordinate {
                    latitude: coordinate.latitude,
                    longitude: coordinate.longitude,
                }
                .into());
            }
        }

        self.next_id = self.next_id.saturating_add(1);
        let package = Package {
            id: PackageId::new(self.next_id),
            address,
            destination,
            assigned_agent,
            status: PackageStatus::Assigned,
            updated_at: Utc::now(),
        };
        self.packages.insert(package.id, package.clone());
        info!(package_id = %package.id, "Package created");
        self.bus.publish(&TrackerEvent::PackageUpdated {
            package: package.clone(),
        });
        Ok(package)
    }

    /// Hand a package to an agent.
    ///
    /// Only packages still in `Assigned` can be handed over; reassigning
    /// a package already on the road is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownPackage`] or
    /// [`TrackerError::InvalidTransition`].
    pub fn assign(
        &mut self,
        package_id: PackageId,
        agent_id: AgentId,
    ) -> Result<Package, TrackerError> {
        let Some(package) = self.packages.get_mut(&package_id) else {
            return Err(TrackerError::UnknownPackage(package_id));
        };
        if package.status != PackageStatus::Assigned {
            return Err(TrackerError::InvalidTransition {
                package_id,
                from: package.status,
                to: PackageStatus::Assigned,
            });
        }
        package.assigned_agent = Some(agent_id);
        package.updated_at = Utc::now();
        let updated = package.clone();
        info!(%package_id, %agent_id, "Package assigned");
        self.bus.publish(&TrackerEvent::PackageUpdated {
            package: updated.clone(),
        });
        Ok(updated)
    }

    /// `Assigned -> InTransit`, applied when a simulation starts.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownPackage`] or
    /// [`TrackerError::InvalidTransition`].
    pub fn begin_transit(&mut self, package_id: PackageId) -> Result<Package, TrackerError> {
        self.transition(package_id, PackageStatus::Assigned, PackageStatus::InTransit)
    }

    /// `InTransit -> Delivered`, applied when a simulation completes.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownPackage`] or
    /// [`TrackerError::InvalidTransition`].
    pub fn complete_delivery(&mut self, package_id: PackageId) -> Result<Package, TrackerError> {
        self.transition(package_id, PackageStatus::InTransit, PackageStatus::Delivered)
    }

    /// `InTransit -> Returned`, the manual return command.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownPackage`] or
    /// [`TrackerError::InvalidTransition`].
    pub fn mark_returned(&mut self, package_id: PackageId) -> Result<Package, TrackerError> {
        self.transition(package_id, PackageStatus::InTransit, PackageStatus::Returned)
    }

    fn transition(
        &mut self,
        package_id: PackageId,
        required: PackageStatus,
        to: PackageStatus,
    ) -> Result<Package, TrackerError> {
        let Some(package) = self.packages.get_mut(&package_id) else {
            return Err(TrackerError::UnknownPackage(package_id));
        };
        if package.status != required {
            return Err(TrackerError::InvalidTransition {
                package_id,
                from: package.status,
                to,
            });
        }
        package.status = to;
        package.updated_at = Utc::now();
        let updated = package.clone();
        info!(%package_id, from = ?required, to = ?to, "Package status changed");
        self.bus.publish(&TrackerEvent::PackageUpdated {
            package: updated.clone(),
        });
        Ok(updated)
    }

    /// The package with the given id, if it exists.
    pub fn get(&self, package_id: PackageId) -> Option<&Package> {
        self.packages.get(&package_id)
    }

    /// All packages in id order.
    pub fn list(&self) -> Vec<Package> {
        self.packages.values().cloned().collect()
    }

    /// Packages assigned to one agent, in id order.
    pub fn assigned_to(&self, agent_id: AgentId) -> Vec<Package> {
        self.packages
            .values()
            .filter(|package| package.assigned_agent == Some(agent_id))
            .cloned()
            .collect()
    }

    /// Number of packages in the table.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use logitrack_events::SubscriptionFilter;

    use super::*;

    fn make_lifecycle() -> (PackageLifecycle, logitrack_events::Subscription) {
        let bus = EventBus::new();
        let subscription = bus.subscribe(SubscriptionFilter::All);
        (PackageLifecycle::new(bus), subscription)
    }

    fn created(lifecycle: &mut PackageLifecycle, agent: Option<AgentId>) -> Package {
        lifecycle
            .create(
                String::from("Avinguda Diagonal 211"),
                Some(Coordinate::new(41.4043, 2.1820)),
                agent,
            )
            .unwrap()
    }

    #[test]
    fn create_allocates_increasing_ids_and_publishes() {
        let (mut lifecycle, mut sub) = make_lifecycle();

        let first = created(&mut lifecycle, None);
        let second = created(&mut lifecycle, None);
        assert!(second.id > first.id);
        assert_eq!(first.status, PackageStatus::Assigned);

        match sub.try_recv() {
            Some(TrackerEvent::PackageUpdated { package }) => assert_eq!(package.id, first.id),
            other => panic!("expected PackageUpdated, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_out_of_range_destination() {
        let (mut lifecycle, _sub) = make_lifecycle();
        let result = lifecycle.create(
            String::from("nowhere"),
            Some(Coordinate::new(120.0, 0.0)),
            None,
        );
        assert!(matches!(
            result,
            Err(TrackerError::Tracking(
                TrackingError::InvalidCoordinate { .. }
            ))
        ));
        assert!(lifecycle.is_empty());
    }

    #[test]
    fn hydrated_ids_are_never_reused() {
        let (mut lifecycle, _sub) = make_lifecycle();
        lifecycle.hydrate(vec![Package {
            id: PackageId::new(40),
            address: String::from("Carrer de Sants 120"),
            destination: None,
            assigned_agent: None,
            status: PackageStatus::Delivered,
            updated_at: Utc::now(),
        }]);

        let next = created(&mut lifecycle, None);
        assert_eq!(next.id, PackageId::new(41));
        assert_eq!(lifecycle.len(), 2);
    }

    #[test]
    fn full_delivery_walk() {
        let (mut lifecycle, _sub) = make_lifecycle();
        let agent = AgentId::new(7);
        let package = created(&mut lifecycle, Some(agent));

        let in_transit = lifecycle.begin_transit(package.id).unwrap();
        assert_eq!(in_transit.status, PackageStatus::InTransit);

        let delivered = lifecycle.complete_delivery(package.id).unwrap();
        assert_eq!(delivered.status, PackageStatus::Delivered);
        assert!(delivered.updated_at >= in_transit.updated_at);
    }

    #[test]
    fn every_illegal_edge_is_rejected() {
        let (mut lifecycle, _sub) = make_lifecycle();
        let package = created(&mut lifecycle, Some(AgentId::new(1)));

        // Assigned: only begin_transit is legal.
        assert!(matches!(
            lifecycle.complete_delivery(package.id),
            Err(TrackerError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lifecycle.mark_returned(package.id),
            Err(TrackerError::InvalidTransition { .. })
        ));

        // InTransit: a second start is rejected.
        lifecycle.begin_transit(package.id).unwrap();
        assert!(matches!(
            lifecycle.begin_transit(package.id),
            Err(TrackerError::InvalidTransition { .. })
        ));

        // Delivered is terminal.
        lifecycle.complete_delivery(package.id).unwrap();
        for result in [
            lifecycle.begin_transit(package.id),
            lifecycle.complete_delivery(package.id),
            lifecycle.mark_returned(package.id),
        ] {
            assert!(matches!(
                result,
                Err(TrackerError::InvalidTransition { .. })
            ));
        }
        assert_eq!(
            lifecycle.get(package.id).unwrap().status,
            PackageStatus::Delivered
        );
    }

    #[test]
    fn returned_is_terminal() {
        let (mut lifecycle, _sub) = make_lifecycle();
        let package = created(&mut lifecycle, Some(AgentId::new(1)));
        lifecycle.begin_transit(package.id).unwrap();
        lifecycle.mark_returned(package.id).unwrap();

        assert!(matches!(
            lifecycle.begin_transit(package.id),
            Err(TrackerError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lifecycle.complete_delivery(package.id),
            Err(TrackerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reassignment_requires_assigned_status() {
        let (mut lifecycle, _sub) = make_lifecycle();
        let package = created(&mut lifecycle, Some(AgentId::new(1)));

        let reassigned = lifecycle.assign(package.id, AgentId::new(2)).unwrap();
        assert_eq!(reassigned.assigned_agent, Some(AgentId::new(2)));

        lifecycle.begin_transit(package.id).unwrap();
        assert!(matches!(
            lifecycle.assign(package.id, AgentId::new(3)),
            Err(TrackerError::InvalidTransition { .. })
        ));

        assert!(matches!(
            lifecycle.assign(PackageId::new(99), AgentId::new(1)),
            Err(TrackerError::UnknownPackage(_))
        ));
    }

    #[test]
    fn assigned_to_filters_by_agent() {
        let (mut lifecycle, _sub) = make_lifecycle();
        let mine = AgentId::new(1);
        created(&mut lifecycle, Some(mine));
        created(&mut lifecycle, Some(AgentId::new(2)));
        created(&mut lifecycle, Some(mine));

        let packages = lifecycle.assigned_to(mine);
        assert_eq!(packages.len(), 2);
        assert!(packages.iter().all(|p| p.assigned_agent == Some(mine)));
    }
}
