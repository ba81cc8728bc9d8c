use super::*;
use crate::models::intensity::{SeismicIntensity, TsunamiStatus};

const QUAKE_551: &str = r#"{
    "code": 551,
    "id": "65920d1c4a8b3e0001a1b2c3",
    "time": "2024/01/01 16:10:09.123",
    "issue": {"source": "気象庁", "type": "DetailScale"},
    "earthquake": {
        "time": "2024/01/01 16:10:00",
        "maxScale": 70,
        "domesticTsunami": "MajorWarning",
        "hypocenter": {
            "name": "石川県能登地方",
            "latitude": 37.5,
            "longitude": 137.2,
            "depth": 10,
            "magnitude": 7.6
        }
    },
    "points": [
        {"addr": "志賀町香能", "isArea": false, "pref": "石川県", "scale": 70}
    ],
    "comments": {"freeFormComment": "この地震について緊急地震速報を発表しています。"}
}"#;

#[test]
fn test_parse_quake_report() {
    let msg = FeedMessage::parse(QUAKE_551).unwrap();
    assert_eq!(msg.kind(), EventKind::QuakeReport);
    assert_eq!(msg.identity(), EventIdentity::new("2024/01/01 16:10:09.123"));

    let FeedMessage::QuakeReport(report) = msg else {
        panic!("expected quake report");
    };
    assert_eq!(report.max_intensity(), SeismicIntensity::Seven);
    assert_eq!(report.earthquake.domestic_tsunami, TsunamiStatus::MajorWarning);
    assert_eq!(report.magnitude(), 7.6);
    assert_eq!(report.depth(), 10.0);
    assert_eq!(report.points.len(), 1);
    assert_eq!(report.points[0].pref, "石川県");
    assert!(report.free_form_comment().is_some());
    assert!(report.extra.contains_key("issue"));
}

#[test]
fn test_quake_report_serializes_back_to_feed_shape() {
    let FeedMessage::QuakeReport(report) = FeedMessage::parse(QUAKE_551).unwrap() else {
        panic!("expected quake report");
    };
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["code"], 551);
    assert_eq!(value["earthquake"]["maxScale"], 70);
    assert_eq!(value["earthquake"]["domesticTsunami"], "MajorWarning");
    assert_eq!(value["points"][0]["isArea"], false);
    assert_eq!(value["id"], "65920d1c4a8b3e0001a1b2c3");
}

#[test]
fn test_parse_quake_report_defaults_missing_optionals() {
    let msg = FeedMessage::parse(r#"{"code":551,"time":"T1","earthquake":{}}"#).unwrap();
    let FeedMessage::QuakeReport(report) = msg else {
        panic!("expected quake report");
    };
    assert_eq!(report.max_intensity(), SeismicIntensity::Unknown);
    assert_eq!(report.magnitude(), 0.0);
    assert!(report.points.is_empty());
    assert!(report.free_form_comment().is_none());
    assert!(report.earthquake.hypocenter.coordinates().is_none());
}

#[test]
fn test_parse_early_warning() {
    let text = r#"{
        "code": 556,
        "time": "2024/01/01 16:10:20",
        "type": "緊急地震速報（警報）",
        "report_id": "20240101161010",
        "report_num": 3,
        "region_name": "石川県能登地方",
        "latitude": 37.6,
        "longitude": 137.2,
        "is_final": false,
        "is_training": false,
        "magnitude": 7.4,
        "forecast_max_intensity": "6強",
        "regions": [{"name": "石川県能登", "forecast_intensity": "6強", "is_warning": true}]
    }"#;
    let FeedMessage::EarlyWarning(alert) = FeedMessage::parse(text).unwrap() else {
        panic!("expected early warning");
    };
    assert_eq!(alert.report_num, 3);
    assert_eq!(alert.warning_type, "緊急地震速報（警報）");
    assert_eq!(alert.regions.len(), 1);
    assert!(alert.regions[0].is_warning);
    assert!(alert.epicenter().is_some());
}

#[test]
fn test_parse_station_intensity() {
    let text = r#"{"code":555,"time":"2024/01/01 16:10:15","points":[{"pref":"石川県","addr":"輪島市","lat":37.39,"lng":136.9,"scale":60}]}"#;
    let msg = FeedMessage::parse(text).unwrap();
    assert_eq!(msg.kind(), EventKind::StationIntensity);
}

#[test]
fn test_parse_rejects_invalid_json() {
    let err = FeedMessage::parse("{not json").unwrap_err();
    assert!(matches!(err, MonitorError::MalformedPayload { .. }));
    assert_eq!(err.context().operation.as_deref(), Some("parse_feed_message"));
}

#[test]
fn test_parse_rejects_missing_code() {
    let err = FeedMessage::parse(r#"{"time":"2024/01/01 00:00:00"}"#).unwrap_err();
    assert!(matches!(err, MonitorError::MalformedPayload { .. }));
}

#[test]
fn test_parse_rejects_string_code() {
    let err = FeedMessage::parse(r#"{"code":"551","time":"x","earthquake":{}}"#).unwrap_err();
    assert!(matches!(err, MonitorError::MalformedPayload { .. }));
}

#[test]
fn test_parse_rejects_unknown_code() {
    let err = FeedMessage::parse(r#"{"code":9611,"time":"2024/01/01 00:00:00"}"#).unwrap_err();
    assert!(matches!(err, MonitorError::UnsupportedEvent { .. }));
}

#[test]
fn test_parse_rejects_report_without_earthquake() {
    let err = FeedMessage::parse(r#"{"code":551,"time":"2024/01/01 00:00:00"}"#).unwrap_err();
    assert!(matches!(err, MonitorError::MalformedPayload { .. }));
    assert_eq!(err.context().entity.as_deref(), Some("quake_report"));
}

#[test]
fn test_coordinates_reject_sentinels() {
    assert!(Coordinates::checked(Some(-200.0), Some(-200.0)).is_none());
    assert!(Coordinates::checked(Some(0.0), Some(139.0)).is_none());
    assert!(Coordinates::checked(None, Some(139.0)).is_none());
    let c = Coordinates::checked(Some(35.6895), Some(139.6917)).unwrap();
    assert_eq!(c.latitude, 35.6895);
}

#[test]
fn test_event_kind_codes() {
    for kind in [
        EventKind::QuakeReport,
        EventKind::EarlyWarning,
        EventKind::StationIntensity,
    ] {
        assert_eq!(EventKind::from_code(kind.code()), Some(kind));
    }
    assert_eq!(EventKind::from_code(554), None);
}
