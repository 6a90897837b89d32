//! Marker overlap resolution.
//!
//! When several agents report the same spot (a depot, a traffic light),
//! their console markers stack and only the top one is clickable. This
//! module nudges coincident markers apart for display purposes only; the
//! stored positions are never touched.
//!
//! Positions count as coincident when their coordinates match after
//! rounding to 4 decimal places (roughly an 11 m cell). Within a group of
//! `n` coincident markers the first stays put and marker `i` moves
//! `0.001 * i` degrees (about 100 m per ring) at angle `2π * i / n`,
//! fanning the group into a small circle around the shared spot.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use logitrack_types::{Coordinate, TrackedPosition};

/// Rounding scale that defines the coincidence cell (4 decimal places).
const CELL_SCALE: f64 = 1e4;

/// Degrees of displacement per within-group index (~100 m at the equator).
const DISPLACEMENT_STEP_DEGREES: f64 = 0.001;

/// Cell key for grouping coincident coordinates.
type Cell = (i64, i64);

/// Map a coordinate to its coincidence cell.
///
/// Coordinates are bounded (validated on the way into the store), so the
/// scaled values fit comfortably in `i64`.
fn cell_of(coordinate: &Coordinate) -> Cell {
    #[allow(clippy::cast_possible_truncation)]
    let cell = (
        (coordinate.latitude * CELL_SCALE).round() as i64,
        (coordinate.longitude * CELL_SCALE).round() as i64,
    );
    cell
}

/// Spread coincident display positions apart.
///
/// Pure: takes display rows, returns adjusted display rows. Output order
/// matches input order exactly (`output[i]` is `input[i]`, possibly with a
/// nudged coordinate), so callers and tests can rely on stable indexing.
pub fn resolve_overlaps(rows: &[TrackedPosition]) -> Vec<TrackedPosition> {
    let mut group_sizes: BTreeMap<Cell, u32> = BTreeMap::new();
    for row in rows {
        let size = group_sizes.entry(cell_of(&row.coordinate)).or_insert(0);
        *size = size.saturating_add(1);
    }

    let mut seen: BTreeMap<Cell, u32> = BTreeMap::new();
    rows.iter()
        .map(|row| {
            let cell = cell_of(&row.coordinate);
            let index = {
                let counter = seen.entry(cell).or_insert(0);
                let current = *counter;
                *counter = counter.saturating_add(1);
                current
            };
            let size = group_sizes.get(&cell).copied().unwrap_or(1);
            if size <= 1 || index == 0 {
                return row.clone();
            }

            let displacement = DISPLACEMENT_STEP_DEGREES * f64::from(index);
            let angle = TAU * f64::from(index) / f64::from(size);
            let mut adjusted = row.clone();
            adjusted.coordinate = Coordinate::new(
                row.coordinate.latitude + displacement * angle.cos(),
                row.coordinate.longitude + displacement * angle.sin(),
            );
            adjusted
        })
        .collect()
}
