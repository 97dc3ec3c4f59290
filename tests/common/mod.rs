// Shared helpers for integration tests.
//
// Env knobs:
// - PROPTEST_CASES: number of cases per property (default 64).

#![allow(dead_code)]

use chocolate_grid::RewardGrid;
use proptest::prelude::*;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(64)
        .max(1);

    ProptestConfig {
        failure_persistence: None,
        cases,
        ..ProptestConfig::default()
    }
}

/// Square reward rows of side `min..=max`.
pub fn square_rows(min: usize, max: usize) -> impl Strategy<Value = Vec<Vec<u32>>> {
    (min..=max).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0u32..=49, n), n))
}

pub fn fixture() -> RewardGrid {
    RewardGrid::from_rows(vec![vec![0, 4, 0], vec![2, 9, 1], vec![5, 6, 8]]).unwrap()
}
