use super::*;
use crate::models::{format_feed_time, parse_feed_time};
use chrono::Duration;

fn now() -> DateTime<Utc> {
    parse_feed_time("2024/03/03 12:00:00").unwrap()
}

fn at(hours_ago: i64) -> String {
    format_feed_time(now() - Duration::hours(hours_ago))
}

fn quake_json(time: &str, max_scale: i32) -> String {
    serde_json::json!({
        "code": 551,
        "time": time,
        "earthquake": {
            "maxScale": max_scale,
            "domesticTsunami": "None",
            "hypocenter": {"name": "茨城県南部", "magnitude": 4.2, "depth": 50}
        }
    })
    .to_string()
}

fn quake(time: &str, max_scale: i32) -> QuakeReport {
    serde_json::from_str(&quake_json(time, max_scale)).unwrap()
}

fn store() -> FeedStore {
    FeedStore::new(HistoryLimits::default())
}

#[test]
fn test_same_identity_twice_keeps_one_entry_with_later_payload() {
    let store = store();
    let first = store.apply_text(&quake_json("T1", 50), now());
    let second = store.apply_text(&quake_json("T1", 55), now());

    assert!(first.latest_changed());
    assert!(!second.latest_changed());
    assert_eq!(
        second,
        FeedUpdate::Quake {
            identity: EventIdentity::new("T1"),
            first_arrival: false,
            new_latest: None,
        }
    );

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].report.earthquake.max_scale, Some(55));
    assert_eq!(store.latest().unwrap().report.earthquake.max_scale, Some(55));
}

#[test]
fn test_each_update_carries_the_report_it_promoted() {
    let store = store();
    let first = store.apply_text(&quake_json(&at(2), 30), now());
    let second = store.apply_text(&quake_json(&at(1), 40), now());

    // the store has moved on, but the first update still names its own report
    assert_eq!(store.latest().unwrap().report.time, at(1));
    assert_eq!(first.new_latest().map(|r| r.time.clone()), Some(at(2)));
    assert_eq!(second.new_latest().map(|r| r.time.clone()), Some(at(1)));
}

#[test]
fn test_latest_follows_arrival_not_occurrence() {
    let store = store();
    store.apply_text(&quake_json(&at(1), 30), now());
    // older occurrence, arrives later
    store.apply_text(&quake_json(&at(6), 20), now());

    let latest = store.latest().unwrap();
    assert_eq!(latest.report.time, at(6));
    // history is still ordered by occurrence
    assert_eq!(store.history()[0].report.time, at(1));
}

#[test]
fn test_redelivery_of_older_identity_does_not_move_latest() {
    let store = store();
    store.apply_text(&quake_json(&at(3), 30), now());
    store.apply_text(&quake_json(&at(1), 40), now());
    let update = store.apply_text(&quake_json(&at(3), 35), now());

    assert!(!update.latest_changed());
    assert_eq!(store.latest().unwrap().report.time, at(1));
    let entry = store.find(&EventIdentity::new(at(3))).unwrap();
    assert_eq!(entry.report.earthquake.max_scale, Some(35));
}

#[test]
fn test_latest_survives_window_pruning() {
    let store = store();
    let stale = at(24 * 4);
    store.apply_text(&quake_json(&stale, 30), now());

    assert_eq!(store.history_len(), 0);
    assert_eq!(store.latest().unwrap().report.time, stale);
}

#[test]
fn test_malformed_and_unsupported_are_dropped() {
    let store = store();
    assert!(matches!(
        store.apply_text("{oops", now()),
        FeedUpdate::Dropped { .. }
    ));
    assert!(matches!(
        store.apply_text(r#"{"code":9611,"time":"x"}"#, now()),
        FeedUpdate::Dropped { .. }
    ));
    assert!(store.latest().is_none());
    assert_eq!(store.history_len(), 0);
}

#[test]
fn test_early_warning_replaces_alert_wholesale() {
    let store = store();
    store.apply_text(
        r#"{"code":556,"time":"2024/03/03 11:59:00","region_name":"東京湾","report_num":1}"#,
        now(),
    );
    let update = store.apply_text(
        r#"{"code":556,"time":"2024/03/03 11:59:30","region_name":"千葉県北西部","report_num":1}"#,
        now(),
    );

    assert_eq!(
        update,
        FeedUpdate::Alert {
            identity: Some(EventIdentity::new("2024/03/03 11:59:30"))
        }
    );
    assert_eq!(store.alert().unwrap().region_name, "千葉県北西部");

    assert!(store.dismiss_alert());
    assert!(store.alert().is_none());
    assert!(!store.dismiss_alert());
}

#[test]
fn test_station_intensity_is_recorded_only() {
    let store = store();
    let update = store.apply_text(
        r#"{"code":555,"time":"2024/03/03 11:58:00","points":[{"pref":"東京都","addr":"千代田区","scale":20}]}"#,
        now(),
    );
    assert!(matches!(update, FeedUpdate::StationIntensity { .. }));
    assert!(store.last_station_intensity().is_some());
    assert!(store.latest().is_none());
    assert_eq!(store.history_len(), 0);
}

#[test]
fn test_bootstrap_sets_latest_when_feed_is_quiet() {
    let store = store();
    let update = store.merge_bootstrap(vec![quake(&at(2), 30), quake(&at(30), 20)], now());

    assert_eq!(
        update,
        FeedUpdate::Bootstrapped {
            merged: 2,
            new_latest: Some(quake(&at(2), 30)),
        }
    );
    assert_eq!(store.latest().unwrap().report.time, at(2));
}

#[test]
fn test_bootstrap_after_live_is_idempotent() {
    let store = store();
    store.apply_text(&quake_json(&at(1), 45), now());
    let before = store.history();

    let update = store.merge_bootstrap(vec![quake(&at(1), 10)], now());
    assert_eq!(
        update,
        FeedUpdate::Bootstrapped {
            merged: 0,
            new_latest: None,
        }
    );
    assert_eq!(store.history(), before);
    assert_eq!(store.latest().unwrap().report.earthquake.max_scale, Some(45));
}

#[test]
fn test_live_after_bootstrap_does_not_refire_latest() {
    let store = store();
    store.merge_bootstrap(vec![quake(&at(1), 10)], now());
    let update = store.apply_text(&quake_json(&at(1), 45), now());

    assert!(!update.latest_changed());
    assert_eq!(store.history()[0].report.earthquake.max_scale, Some(45));
    assert_eq!(store.history()[0].origin, EntryOrigin::Live);
}

#[test]
fn test_export_history_json_is_feed_shaped_array() {
    let store = store();
    store.apply_text(&quake_json(&at(2), 30), now());
    store.apply_text(&quake_json(&at(1), 40), now());

    let json = store.export_history_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["code"], 551);
    assert_eq!(items[0]["time"], at(1));
    assert_eq!(items[0]["earthquake"]["maxScale"], 40);
}
