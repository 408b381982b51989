use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_follow_reference_policies() {
    let settings = Settings::default();
    assert_eq!(settings.api_url, "http://localhost:3333");
    assert_eq!(settings.import.on_failure, FailurePolicy::AbortBatch);
    assert_eq!(settings.import.navigation, NavigationPolicy::AfterEachFile);
    assert_eq!(settings.request_timeout(), Duration::from_secs(30));
}

#[test]
fn settings_file_overrides_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.toml");
    fs::write(
        &path,
        r#"
api_url = "https://ledger.example.com/api"
auth_token = "file-token"
request_timeout_secs = 5
on_failure = "continue"
navigation = "batch"
"#,
    )
    .expect("write settings");

    let mut settings = Settings::default();
    apply_file(&mut settings, &path);

    assert_eq!(settings.api_url, "https://ledger.example.com/api");
    assert_eq!(settings.auth_token.as_deref(), Some("file-token"));
    assert_eq!(settings.request_timeout_secs, 5);
    assert_eq!(settings.import.on_failure, FailurePolicy::SkipAndContinue);
    assert_eq!(settings.import.navigation, NavigationPolicy::AfterBatch);
}

#[test]
fn malformed_or_missing_file_keeps_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ledger.toml");
    fs::write(&path, "api_url = [not toml").expect("write settings");

    let mut settings = Settings::default();
    apply_file(&mut settings, &path);
    apply_file(&mut settings, &dir.path().join("missing.toml"));

    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_plain_env() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("LEDGER_API_URL", "http://plain:1"),
            ("APP__API_URL", "http://prefixed:2"),
            ("LEDGER_AUTH_TOKEN", "secret"),
            ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
            ("APP__IMPORT_ON_FAILURE", "skip"),
            ("APP__IMPORT_NAVIGATION", "sideways"),
        ]),
    );

    assert_eq!(settings.api_url, "http://prefixed:2");
    assert_eq!(settings.auth_token.as_deref(), Some("secret"));
    assert_eq!(settings.request_timeout_secs, 30);
    assert_eq!(settings.import.on_failure, FailurePolicy::SkipAndContinue);
    assert_eq!(settings.import.navigation, NavigationPolicy::AfterEachFile);
}

#[test]
fn session_normalizes_url_and_drops_blank_token() {
    let session = Session::new("http://localhost:3333/", Some("  ".into())).expect("session");
    assert_eq!(session.api_url(), "http://localhost:3333");
    assert_eq!(session.auth_token(), None);

    let session = Session::new("https://ledger.example.com/api/", Some("t".into()))
        .expect("session");
    assert_eq!(session.api_url(), "https://ledger.example.com/api");
    assert_eq!(session.auth_token(), Some("t"));
}

#[test]
fn session_rejects_invalid_urls() {
    assert!(Session::new("not a url", None).is_err());
    assert!(Session::new("ftp://ledger.example.com", None).is_err());
}
