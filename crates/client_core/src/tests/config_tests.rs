use std::{collections::HashMap, io::Write};

use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_yields_defaults() {
    let settings = load_settings_from(Path::new("/definitely/not/here.toml"), no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.order_window_tolerance, 5.0);
    assert_eq!(settings.notification_life(), Duration::from_millis(2000));
    assert_eq!(settings.request_timeout(), None);
}

#[test]
fn file_values_are_overridden_by_environment() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "api_base_url = \"http://file.example:9000\"\norder_window_tolerance = 2.5\nrequest_timeout_secs = 10"
    )
    .expect("write settings");

    let settings = load_settings_from(
        file.path(),
        env_from(&[
            ("ORDERING_API_URL", "http://legacy.example"),
            ("APP__API_BASE_URL", "https://api.example/"),
            ("APP__NOTIFICATION_LIFE_MS", "500"),
        ]),
    );

    assert_eq!(settings.api_base_url, "https://api.example/");
    assert_eq!(settings.api_base(), "https://api.example");
    assert_eq!(settings.order_window_tolerance, 2.5);
    assert_eq!(settings.notification_life_ms, 500);
    assert_eq!(settings.request_timeout(), Some(Duration::from_secs(10)));
}

#[test]
fn unparsable_values_are_ignored() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "api_base_url = [not toml").expect("write settings");

    let settings = load_settings_from(
        file.path(),
        env_from(&[("APP__ORDER_WINDOW_TOLERANCE", "wide")]),
    );
    assert_eq!(settings, Settings::default());
}

#[test]
fn validate_rejects_bad_base_url() {
    for url in ["not a url", "ftp://api.example", "http://api.example/?x=1"] {
        let settings = Settings {
            api_base_url: url.into(),
            ..Settings::default()
        };
        assert!(
            matches!(settings.validate(), Err(ClientError::Config(_))),
            "{url} should be rejected"
        );
    }
}

#[test]
fn validate_rejects_negative_tolerance() {
    let settings = Settings {
        order_window_tolerance: -1.0,
        ..Settings::default()
    };
    assert!(matches!(settings.validate(), Err(ClientError::Config(_))));
    assert!(Settings::default().validate().is_ok());
}
