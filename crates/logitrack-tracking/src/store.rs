//! Last-known-position table.
//!
//! One [`Position`] per agent, replaced wholesale by newer fixes. Real
//! fixes go through [`PositionStore::record`], which validates the
//! coordinate, enforces per-agent timestamp monotonicity, and announces
//! the accepted fix on the bus. The simulation scheduler writes synthetic
//! route points through [`PositionStore::apply_route_point`], which skips
//! the monotonic check (synthetic motion is engine-clocked, not
//! device-clocked) and stays silent on the bus -- views animate simulated
//! agents from simulation events instead.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use logitrack_events::EventBus;
use logitrack_types::{AgentId, Coordinate, Position, TrackerEvent};
use tracing::debug;

use crate::error::TrackingError;

/// Validated last-known positions, keyed by agent.
///
/// Plain data guarded by whoever owns it (the engine facade holds it
/// behind an async lock); methods take `&mut self` and never block.
#[derive(Debug)]
pub struct PositionStore {
    bus: EventBus,
    positions: BTreeMap<AgentId, Position>,
}

impl PositionStore {
    /// Create an empty store publishing on `bus`.
    pub const fn new(bus: EventBus) -> Self {
        Self {
            bus,
            positions: BTreeMap::new(),
        }
    }

    /// Record a real position fix for an agent.
    ///
    /// The coordinate must be finite and inside the WGS84 ranges, and
    /// `recorded_at` must be strictly newer than the stored fix (equal
    /// timestamps are rejected; the store must never go backwards). On
    /// success the stored position is replaced and a
    /// [`TrackerEvent::PositionChanged`] is published.
    ///
    /// On any rejection the stored position is left untouched.
    pub fn record(
        &mut self,
        agent_id: AgentId,
        coordinate: Coordinate,
        recorded_at: DateTime<Utc>,
    ) -> Result<Position, TrackingError> {
        if !coordinate.is_in_bounds() {
            return Err(TrackingError::InvalidCoordinate {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
            });
        }
        if let Some(existing) = self.positions.get(&agent_id) {
            if recorded_at <= existing.recorded_at {
                return Err(TrackingError::StaleTimestamp {
                    agent_id,
                    incoming: recorded_at,
                    stored: existing.recorded_at,
                });
            }
        }

        let position = Position::new(coordinate, recorded_at);
        self.positions.insert(agent_id, position);
        debug!(
            %agent_id,
            latitude = coordinate.latitude,
            longitude = coordinate.longitude,
            "Recorded position fix"
        );
        self.bus
            .publish(&TrackerEvent::PositionChanged { agent_id, position });
        Ok(position)
    }

    /// Overwrite an agent's position with a synthetic route point.
    ///
    /// Bypasses the monotonic check, stamps engine time, and clamps the
    /// coordinate into range (jitter near a range edge may nudge a point
    /// slightly out). Publishes nothing.
    pub fn apply_route_point(&mut self, agent_id: AgentId, coordinate: Coordinate) -> Position {
        let position = Position::new(coordinate.clamped(), Utc::now());
        self.positions.insert(agent_id, position);
        position
    }

    /// The stored position for an agent, if any.
    pub fn position_of(&self, agent_id: AgentId) -> Option<Position> {
        self.positions.get(&agent_id).copied()
    }

    /// Iterate all stored positions in agent-id order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, Position)> + '_ {
        self.positions.iter().map(|(id, position)| (*id, *position))
    }

    /// Number of agents with a stored position.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no agent has reported yet.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use logitrack_events::SubscriptionFilter;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).single().unwrap()
    }

    fn make_store() -> (PositionStore, logitrack_events::Subscription) {
        let bus = EventBus::new();
        let subscription = bus.subscribe(SubscriptionFilter::All);
        (PositionStore::new(bus), subscription)
    }

    #[test]
    fn accepts_first_fix_and_publishes() {
        let (mut store, mut sub) = make_store();
        let agent = AgentId::new(1);

        let stored = store
            .record(agent, Coordinate::new(41.39, 2.17), at(100))
            .unwrap();
        assert_eq!(stored.coordinate, Coordinate::new(41.39, 2.17));
        assert_eq!(store.position_of(agent).unwrap(), stored);

        match sub.try_recv() {
            Some(TrackerEvent::PositionChanged { agent_id, position }) => {
                assert_eq!(agent_id, agent);
                assert_eq!(position, stored);
            }
            other => panic!("expected PositionChanged, got {other:?}"),
        }
    }

    #[test]
    fn rejects_stale_and_equal_timestamps() {
        let (mut store, mut sub) = make_store();
        let agent = AgentId::new(1);
        let first = Coordinate::new(10.0, 20.0);

        store.record(agent, first, at(100)).unwrap();
        let _ = sub.try_recv();

        let equal = store.record(agent, Coordinate::new(11.0, 21.0), at(100));
        assert!(matches!(
            equal,
            Err(TrackingError::StaleTimestamp { .. })
        ));
        let older = store.record(agent, Coordinate::new(11.0, 21.0), at(99));
        assert!(matches!(
            older,
            Err(TrackingError::StaleTimestamp { .. })
        ));

        // The stored position is untouched and no event was published.
        assert_eq!(store.position_of(agent).unwrap().coordinate, first);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let (mut store, mut sub) = make_store();
        let agent = AgentId::new(2);

        let result = store.record(agent, Coordinate::new(91.0, 0.0), at(1));
        assert!(matches!(
            result,
            Err(TrackingError::InvalidCoordinate { .. })
        ));
        let result = store.record(agent, Coordinate::new(0.0, f64::NAN), at(1));
        assert!(matches!(
            result,
            Err(TrackingError::InvalidCoordinate { .. })
        ));

        assert!(store.position_of(agent).is_none());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn synthetic_writes_bypass_monotonic_check_silently() {
        let (mut store, mut sub) = make_store();
        let agent = AgentId::new(3);

        store.record(agent, Coordinate::new(1.0, 1.0), at(100)).unwrap();
        let _ = sub.try_recv();

        // Synthetic points land regardless of the stored device timestamp
        // and publish nothing.
        let synthetic = store.apply_route_point(agent, Coordinate::new(1.001, 1.001));
        assert_eq!(store.position_of(agent).unwrap(), synthetic);
        assert!(sub.try_recv().is_none());

        // Real fixes keep being validated against whatever is stored, so an
        // epoch-era device time is now stale against the engine stamp.
        let result = store.record(agent, Coordinate::new(1.0, 1.0), at(200));
        assert!(matches!(result, Err(TrackingError::StaleTimestamp { .. })));
    }

    #[test]
    fn synthetic_writes_clamp_out_of_range_jitter() {
        let (mut store, _sub) = make_store();
        let agent = AgentId::new(4);

        let stored = store.apply_route_point(agent, Coordinate::new(90.00003, 180.00001));
        assert!(stored.coordinate.is_in_bounds());
        assert!((stored.coordinate.latitude - 90.0).abs() < f64::EPSILON);
    }
}
