//! Elapsed-time ticker tests on paused tokio time.

use std::time::Duration;

use loremap_core::{AppState, ProgressFlags, Store};
use loremap_studio::Ticker;

const PERIOD: Duration = Duration::from_millis(100);

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_counts_while_busy_and_stops_when_idle() {
    let app = Store::new(AppState::default());
    let ticker = Ticker::attach(&app, PERIOD);
    assert!(!ticker.is_running());

    app.patch(|s| s.progress.imaging = true);
    assert!(ticker.is_running());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_close(app.get_state().gen_timer, 0.3);

    app.patch(|s| s.progress = ProgressFlags::IDLE);
    assert!(!ticker.is_running());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_close(app.get_state().gen_timer, 0.3);
}

#[tokio::test(start_paused = true)]
async fn test_switching_flags_keeps_one_task() {
    let app = Store::new(AppState::default());
    let ticker = Ticker::attach(&app, PERIOD);

    app.patch(|s| s.progress.describing = true);
    tokio::time::sleep(Duration::from_millis(150)).await;
    app.patch(|s| {
        s.progress.describing = false;
        s.progress.imaging = true;
    });
    assert!(ticker.is_running());
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Ticks at 100ms and 200ms; a second task would have doubled them.
    assert_close(app.get_state().gen_timer, 0.2);
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_updates_do_not_start_it() {
    let app = Store::new(AppState::default());
    let ticker = Ticker::attach(&app, PERIOD);

    app.patch(|s| s.location_request = "Tavern".into());
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!ticker.is_running());
    assert_close(app.get_state().gen_timer, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_ticker_stops_counting() {
    let app = Store::new(AppState::default());
    let ticker = Ticker::attach(&app, PERIOD);
    app.patch(|s| s.progress.editing = true);
    tokio::time::sleep(Duration::from_millis(150)).await;

    drop(ticker);
    assert_eq!(app.listener_count(), 0);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_close(app.get_state().gen_timer, 0.1);
}

#[test]
fn test_inert_without_runtime() {
    let app = Store::new(AppState::default());
    let ticker = Ticker::attach(&app, PERIOD);
    app.patch(|s| s.progress.imaging = true);
    assert!(!ticker.is_running());
    assert_eq!(app.listener_count(), 0);
}
