// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

fn recorder() -> (Arc<Mutex<Vec<Reachability>>>, ReachabilityHandler) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::clone(&seen);
    (
        seen,
        Arc::new(move |r: Reachability| inner.lock().unwrap().push(r)),
    )
}

#[test]
fn handlers_receive_changes() {
    let source = ManualReachability::new();
    let (seen, handler) = recorder();
    let _sub = source.on_reachability_change(handler);

    source.set(Reachability::Offline);
    source.set(Reachability::Online);

    assert_eq!(
        *seen.lock().unwrap(),
        [Reachability::Offline, Reachability::Online]
    );
}

#[test]
fn dropping_subscription_detaches() {
    let source = ManualReachability::new();
    let (seen, handler) = recorder();
    let sub = source.on_reachability_change(handler);
    assert_eq!(source.handler_count(), 1);

    drop(sub);
    source.set(Reachability::Offline);

    assert_eq!(source.handler_count(), 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn subscription_outliving_source_is_harmless() {
    let source = ManualReachability::new();
    let (_seen, handler) = recorder();
    let sub = source.on_reachability_change(handler);
    drop(source);
    drop(sub);
}

#[test]
fn custom_sources_use_the_detach_callback() {
    let detached = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&detached);
    let sub = ReachabilitySubscription::new(move || *flag.lock().unwrap() = true);
    assert!(!*detached.lock().unwrap());
    drop(sub);
    assert!(*detached.lock().unwrap());
}
