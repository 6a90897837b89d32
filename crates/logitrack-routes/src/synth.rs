//! Synthetic route generation.
//!
//! The engine has no road graph, so it fakes one convincingly: a route is
//! a straight interpolation from the agent's position to the destination,
//! bent at regular intervals so the path reads as city blocks rather than
//! a ruler line, with per-point jitter so repeated runs never trace the
//! exact same pixels.
//!
//! # Shape of a street route
//!
//! - `total_steps` points (default 80), evenly spaced, last point on the
//!   destination before jitter.
//! - Every 8th interior step injects a turn offset of
//!   `sin(progress * 4π) * 0.0002` degrees, alternating axis each turn
//!   (step phase 16): longitude on even turn phases, latitude on odd.
//! - Every point gains independent uniform jitter of up to ±0.00005
//!   degrees per axis (roughly 5 m).
//!
//! # Fallbacks
//!
//! Start and end closer than the perturbation floor produce a straight
//! 51-point interpolation with no turns and no jitter; identical inputs
//! produce a single-point route. Both are deterministic regardless of the
//! RNG handed in.
//!
//! All synthesis is pure: the caller injects the RNG, so a seeded RNG
//! reproduces a route exactly.

use std::f64::consts::PI;

use logitrack_types::{Coordinate, Route, RouteKind};
use rand::Rng;

/// Default number of points in a street route.
pub const DEFAULT_TOTAL_STEPS: u32 = 80;

/// Interpolation steps in the straight fallback (inclusive, so 51 points).
const STRAIGHT_FALLBACK_STEPS: u32 = 50;

/// A turn offset is injected every this many steps.
const TURN_EVERY_STEPS: u32 = 8;

/// Turn axis alternates on this step phase.
const TURN_PHASE_STEPS: u32 = 16;

/// Amplitude of a turn offset, in degrees (~20 m).
const TURN_AMPLITUDE_DEGREES: f64 = 0.0002;

/// Half-range of per-point jitter, in degrees (~5 m).
const JITTER_HALF_RANGE_DEGREES: f64 = 0.00005;

/// Separation below which the two endpoints count as the same point.
const IDENTICAL_EPSILON_DEGREES: f64 = 1e-9;

/// Separation below which turn offsets would dominate the path, so the
/// straight fallback is used instead (~50 m).
const MIN_STREET_SEPARATION_DEGREES: f64 = 0.0005;

/// Synthesize a route from `start` to `end`.
///
/// Total over all inputs: degenerate and out-of-range coordinates degrade
/// to trivial routes instead of failing (callers validate upstream; this
/// keeps route setup infallible). A `total_steps` below 2 is treated as 2.
pub fn synthesize(
    start: Coordinate,
    end: Coordinate,
    total_steps: u32,
    rng: &mut impl Rng,
) -> Route {
    if !start.is_in_bounds() || !end.is_in_bounds() {
        return Route::new(vec![start.clamped()], RouteKind::Straight);
    }

    let separation = start.degree_distance(&end);
    if separation < IDENTICAL_EPSILON_DEGREES {
        return Route::new(vec![start], RouteKind::Straight);
    }
    if separation < MIN_STREET_SEPARATION_DEGREES {
        return straight_route(start, end);
    }

    street_route(start, end, total_steps.max(2), rng)
}

/// Straight interpolation with both endpoints exact.
fn straight_route(start: Coordinate, end: Coordinate) -> Route {
    let capacity = usize::try_from(STRAIGHT_FALLBACK_STEPS.saturating_add(1)).unwrap_or(0);
    let mut points = Vec::with_capacity(capacity);
    for i in 0..STRAIGHT_FALLBACK_STEPS {
        let progress = f64::from(i) / f64::from(STRAIGHT_FALLBACK_STEPS);
        points.push(Coordinate::new(
            start.latitude + (end.latitude - start.latitude) * progress,
            start.longitude + (end.longitude - start.longitude) * progress,
        ));
    }
    // Interpolating to progress 1.0 can miss the destination by an ulp;
    // push it exactly.
    points.push(end);
    Route::new(points, RouteKind::Straight)
}

/// Block-pattern route with turn offsets and jitter.
fn street_route(start: Coordinate, end: Coordinate, total_steps: u32, rng: &mut impl Rng) -> Route {
    let last = total_steps.saturating_sub(1);
    let span = f64::from(last.max(1));
    let mut points = Vec::with_capacity(usize::try_from(total_steps).unwrap_or(0));

    for i in 0..total_steps {
        let progress = f64::from(i) / span;
        let mut latitude = start.latitude + (end.latitude - start.latitude) * progress;
        let mut longitude = start.longitude + (end.longitude - start.longitude) * progress;

        // Turns only on interior steps; the endpoints stay anchored.
        if i > 0 && i < last && i % TURN_EVERY_STEPS == 0 {
            let offset = (progress * 4.0 * PI).sin() * TURN_AMPLITUDE_DEGREES;
            if i % TURN_PHASE_STEPS < TURN_PHASE_STEPS / 2 {
                longitude += offset;
            } else {
                latitude += offset;
            }
        }

        latitude += rng.random_range(-JITTER_HALF_RANGE_DEGREES..=JITTER_HALF_RANGE_DEGREES);
        longitude += rng.random_range(-JITTER_HALF_RANGE_DEGREES..=JITTER_HALF_RANGE_DEGREES);
        points.push(Coordinate::new(latitude, longitude));
    }

    Route::new(points, RouteKind::Street)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    const BCN: Coordinate = Coordinate::new(41.3874, 2.1686);
    const BADALONA: Coordinate = Coordinate::new(41.4500, 2.2474);

    #[test]
    fn identical_endpoints_yield_a_single_point() {
        let mut rng = SmallRng::seed_from_u64(42);
        let route = synthesize(BCN, BCN, DEFAULT_TOTAL_STEPS, &mut rng);
        assert_eq!(route.total_steps(), 1);
        assert_eq!(route.kind(), RouteKind::Straight);
        assert_eq!(route.point_at(0).unwrap(), BCN);
    }

    #[test]
    fn near_degenerate_separation_falls_back_to_straight() {
        let mut rng = SmallRng::seed_from_u64(42);
        let end = Coordinate::new(BCN.latitude + 0.0003, BCN.longitude);
        let route = synthesize(BCN, end, DEFAULT_TOTAL_STEPS, &mut rng);

        assert_eq!(route.total_steps(), 51);
        assert_eq!(route.kind(), RouteKind::Straight);
        assert_eq!(route.point_at(0).unwrap(), BCN);
        assert_eq!(route.last_point().unwrap(), end);
    }

    #[test]
    fn straight_fallback_ignores_the_rng() {
        let end = Coordinate::new(BCN.latitude + 0.0002, BCN.longitude + 0.0002);
        let mut rng_a = SmallRng::seed_from_u64(1);
        let mut rng_b = SmallRng::seed_from_u64(2);
        let a = synthesize(BCN, end, DEFAULT_TOTAL_STEPS, &mut rng_a);
        let b = synthesize(BCN, end, DEFAULT_TOTAL_STEPS, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn street_routes_have_exactly_the_requested_steps() {
        let mut rng = SmallRng::seed_from_u64(42);
        let route = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng);
        assert_eq!(route.total_steps(), 80);
        assert_eq!(route.kind(), RouteKind::Street);
    }

    #[test]
    fn street_route_starts_and_ends_near_the_endpoints() {
        let mut rng = SmallRng::seed_from_u64(42);
        let route = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng);

        // Endpoints carry jitter only (no turn offsets), so they sit within
        // the jitter diagonal of the true endpoints.
        let jitter_diagonal = JITTER_HALF_RANGE_DEGREES * 1.5;
        assert!(route.point_at(0).unwrap().degree_distance(&BCN) <= jitter_diagonal);
        assert!(route.last_point().unwrap().degree_distance(&BADALONA) <= jitter_diagonal);
    }

    #[test]
    fn street_route_hugs_the_direct_line() {
        let mut rng = SmallRng::seed_from_u64(7);
        let route = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng);

        let last = f64::from(route.total_steps().saturating_sub(1));
        let max_deviation = TURN_AMPLITUDE_DEGREES + 2.0 * JITTER_HALF_RANGE_DEGREES;
        for (i, point) in route.points().iter().enumerate() {
            let progress = u32::try_from(i).map(f64::from).unwrap_or_default() / last;
            let reference_lat = BCN.latitude + (BADALONA.latitude - BCN.latitude) * progress;
            let reference_lng = BCN.longitude + (BADALONA.longitude - BCN.longitude) * progress;
            assert!((point.latitude - reference_lat).abs() <= max_deviation);
            assert!((point.longitude - reference_lng).abs() <= max_deviation);
        }
    }

    #[test]
    fn same_seed_reproduces_the_route() {
        let mut rng_a = SmallRng::seed_from_u64(42);
        let mut rng_b = SmallRng::seed_from_u64(42);
        let a = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng_a);
        let b = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_jitter_differently() {
        let mut rng_a = SmallRng::seed_from_u64(1);
        let mut rng_b = SmallRng::seed_from_u64(2);
        let a = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng_a);
        let b = synthesize(BCN, BADALONA, DEFAULT_TOTAL_STEPS, &mut rng_b);
        assert_ne!(a, b);
    }

    #[test]
    fn tiny_step_counts_are_clamped_to_two() {
        let mut rng = SmallRng::seed_from_u64(42);
        let route = synthesize(BCN, BADALONA, 0, &mut rng);
        assert_eq!(route.total_steps(), 2);
    }

    #[test]
    fn out_of_range_input_degrades_to_a_trivial_route() {
        let mut rng = SmallRng::seed_from_u64(42);
        let route = synthesize(Coordinate::new(95.0, 0.0), BCN, DEFAULT_TOTAL_STEPS, &mut rng);
        assert_eq!(route.total_steps(), 1);
        assert!(route.point_at(0).unwrap().is_in_bounds());
    }
}
