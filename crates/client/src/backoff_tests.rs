// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    no_failures = { 0, 250, 500 },
    first = { 1, 250, 2500 },
    second = { 2, 2000, 4500 },
    fifth = { 5, 8000, 10500 },
    near_ceiling = { 12, 22000, 24500 },
    at_ceiling = { 13, 24000, 25000 },
    saturated = { 40, 25000, 25000 },
)]
fn bounds_grow_linearly(failures: u32, min: u64, max: u64) {
    assert_eq!(JitteredBackoff::default().bounds(failures), (min, max));
}

#[test]
fn intervals_stay_within_bounds() {
    let policy = JitteredBackoff::default();
    for failures in 0..20 {
        let (min, max) = policy.bounds(failures);
        for _ in 0..50 {
            let ms = policy.interval(failures).unwrap().as_millis() as u64;
            assert!(ms >= min, "{ms} < {min} at {failures}");
            assert!(ms < max || min == max, "{ms} >= {max} at {failures}");
        }
    }
}

#[test]
fn saturated_window_returns_ceiling() {
    let policy = JitteredBackoff::default();
    assert_eq!(policy.interval(100).unwrap(), Duration::from_millis(25_000));
}

#[test]
fn small_ceiling_caps_both_bounds() {
    let policy = JitteredBackoff::new(Duration::from_millis(100));
    assert_eq!(policy.bounds(3), (100, 100));
    assert_eq!(policy.interval(3).unwrap(), Duration::from_millis(100));
}

#[test]
fn closures_are_policies() {
    let fixed = |_: u32| -> Result<Duration, RetryPolicyError> { Ok(Duration::from_millis(5)) };
    assert_eq!(fixed.interval(9).unwrap(), Duration::from_millis(5));

    let failing = |_: u32| -> Result<Duration, RetryPolicyError> {
        Err(RetryPolicyError("nope".into()))
    };
    assert!(failing.interval(1).is_err());
}
