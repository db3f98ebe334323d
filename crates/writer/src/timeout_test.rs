//! Tests for the adaptive timeout controller

use super::{TimeoutController, TimeoutSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn settings() -> TimeoutSettings {
    TimeoutSettings::default()
}

fn assert_secs(actual: Duration, expected: f64) {
    let got = actual.as_secs_f64();
    assert!(
        (got - expected).abs() < 1e-3,
        "expected ~{expected}s, got {got}s"
    );
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_default_settings() {
    let s = TimeoutSettings::default();
    assert_eq!(s.baseline, Duration::from_secs(10));
    assert_eq!(s.floor, Duration::from_secs(1));
    assert_eq!(s.backoff_factor, 1.5);
    assert_eq!(s.recovery_factor, 1.2);
    assert_eq!(s.recovery_interval, Duration::from_secs(10));
    assert!(s.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_factors() {
    assert!(settings().with_backoff_factor(1.0).validate().is_err());
    assert!(settings().with_backoff_factor(0.5).validate().is_err());
    assert!(settings().with_backoff_factor(f64::NAN).validate().is_err());
    assert!(settings().with_recovery_factor(1.0).validate().is_err());
    assert!(settings().with_recovery_factor(f64::INFINITY).validate().is_err());
}

#[test]
fn test_validate_rejects_floor_above_baseline() {
    let s = settings()
        .with_baseline(Duration::from_secs(1))
        .with_floor(Duration::from_secs(2));
    let err = s.validate().unwrap_err();
    assert!(err.to_string().contains("exceeds baseline"));
}

#[test]
fn test_validate_rejects_zero_durations() {
    assert!(settings().with_floor(Duration::ZERO).validate().is_err());
    assert!(settings().with_recovery_interval(Duration::ZERO).validate().is_err());
}

#[test]
fn test_floor_equal_to_baseline_is_valid() {
    let s = settings()
        .with_baseline(Duration::from_secs(2))
        .with_floor(Duration::from_secs(2));
    assert!(s.validate().is_ok());
}

// ============================================================================
// Failure transition
// ============================================================================

#[test]
fn test_starts_at_baseline() {
    let ctrl = TimeoutController::new(settings());
    assert_eq!(ctrl.current_timeout(), Duration::from_secs(10));
}

#[test]
fn test_three_failures_shrink_by_backoff() {
    let ctrl = TimeoutController::new(settings());

    ctrl.report_failure();
    assert_secs(ctrl.current_timeout(), 6.667);
    ctrl.report_failure();
    assert_secs(ctrl.current_timeout(), 4.444);
    ctrl.report_failure();
    assert_secs(ctrl.current_timeout(), 2.963);
}

#[test]
fn test_failures_never_increase_and_clamp_at_floor() {
    let ctrl = TimeoutController::new(settings());
    let mut previous = ctrl.current_timeout();

    for _ in 0..50 {
        ctrl.report_failure();
        let current = ctrl.current_timeout();
        assert!(current <= previous);
        assert!(current >= Duration::from_secs(1));
        previous = current;
    }

    assert_eq!(ctrl.current_timeout(), Duration::from_secs(1));
}

#[test]
fn test_success_does_not_change_timeout() {
    let ctrl = TimeoutController::new(settings());
    ctrl.report_failure();
    let before = ctrl.current_timeout();

    ctrl.report_success();
    ctrl.report_success();

    assert_eq!(ctrl.current_timeout(), before);
}

// ============================================================================
// Recovery transition
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_recovery_after_success_grows_toward_baseline() {
    let ctrl = TimeoutController::new(settings());
    for _ in 0..3 {
        ctrl.report_failure();
    }
    ctrl.report_success();

    let mut previous = ctrl.current_timeout();
    for _ in 0..30 {
        ctrl.attempt_recovery();
        let current = ctrl.current_timeout();
        assert!(current >= previous);
        assert!(current <= Duration::from_secs(10));
        previous = current;
    }

    assert_eq!(ctrl.current_timeout(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_single_recovery_step() {
    let ctrl = TimeoutController::new(settings());
    for _ in 0..3 {
        ctrl.report_failure();
    }
    ctrl.report_success();

    ctrl.attempt_recovery();
    assert_secs(ctrl.current_timeout(), 2.963 * 1.2);
}

#[tokio::test(start_paused = true)]
async fn test_no_recovery_without_recent_success() {
    let ctrl = TimeoutController::new(settings());
    ctrl.report_failure();
    let before = ctrl.current_timeout();

    tokio::time::advance(Duration::from_secs(21)).await;
    ctrl.attempt_recovery();

    assert_eq!(ctrl.current_timeout(), before);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_window_boundary() {
    let ctrl = TimeoutController::new(settings());
    ctrl.report_failure();
    ctrl.report_success();
    let before = ctrl.current_timeout();
    let success_at = ctrl.last_success();

    // Exactly 2x the interval still counts as recent
    ctrl.attempt_recovery_at(success_at + Duration::from_secs(20));
    assert!(ctrl.current_timeout() > before);

    let after_first = ctrl.current_timeout();
    ctrl.attempt_recovery_at(success_at + Duration::from_secs(20) + Duration::from_millis(1));
    assert_eq!(ctrl.current_timeout(), after_first);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_at_baseline_is_noop() {
    let ctrl = TimeoutController::new(settings());
    ctrl.report_success();
    ctrl.attempt_recovery();
    assert_eq!(ctrl.current_timeout(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_recovery_near_duration_max_saturates() {
    let ctrl = TimeoutController::new(settings().with_baseline(Duration::MAX));
    ctrl.report_failure();
    ctrl.report_success();
    assert!(ctrl.current_timeout() < Duration::MAX);

    for _ in 0..10 {
        ctrl.attempt_recovery();
    }
    assert_eq!(ctrl.current_timeout(), Duration::MAX);
}

#[tokio::test(start_paused = true)]
async fn test_last_success_tracks_reports() {
    let ctrl = TimeoutController::new(settings());
    let start = Instant::now();

    tokio::time::advance(Duration::from_secs(5)).await;
    ctrl.report_success();

    assert_eq!(ctrl.last_success() - start, Duration::from_secs(5));
}

// ============================================================================
// Recovery task
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_recovery_task_ticks_until_success_goes_stale() {
    let ctrl = Arc::new(TimeoutController::new(settings()));
    for _ in 0..3 {
        ctrl.report_failure();
    }
    ctrl.report_success();

    let cancel = CancellationToken::new();
    let handle = Arc::clone(&ctrl).spawn_recovery(cancel.clone());

    // Tick at 10s: success 10s ago, recover
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_secs(ctrl.current_timeout(), 2.963 * 1.2);

    // Tick at 20s: success exactly 20s ago, still recent
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_secs(ctrl.current_timeout(), 2.963 * 1.2 * 1.2);

    // Tick at 30s: success is stale, no change
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_secs(ctrl.current_timeout(), 2.963 * 1.2 * 1.2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_recovery_task_stops_on_cancel() {
    let ctrl = Arc::new(TimeoutController::new(settings()));
    let cancel = CancellationToken::new();
    let handle = Arc::clone(&ctrl).spawn_recovery(cancel.clone());

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(Arc::strong_count(&ctrl), 1);
}
