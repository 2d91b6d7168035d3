use super::*;

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
api_url = "https://core.banco.local/api"
request_timeout_secs = "10"
unrelated = "ignored"
"#,
    );
    assert_eq!(settings.api_url, "https://core.banco.local/api");
    assert_eq!(settings.request_timeout_secs, 10);
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn malformed_file_is_ignored() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "api_url = [1, 2");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_short_name() {
    let mut settings = Settings::default();
    let env: HashMap<&str, &str> = HashMap::from([
        ("BACKOFFICE_API_URL", "http://short.local"),
        ("APP__API_URL", "http://prefixed.local"),
        ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
        ("APP__LOG_FILTER", "client_core=debug"),
    ]);
    apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

    assert_eq!(settings.api_url, "http://prefixed.local");
    assert_eq!(settings.request_timeout_secs, 30);
    assert_eq!(settings.log_filter, "client_core=debug");
}

#[test]
fn normalizes_api_url() {
    assert_eq!(
        normalize_api_url("  http://localhost:3000/// ").expect("valid"),
        "http://localhost:3000"
    );
    assert_eq!(normalize_api_url("").expect("default"), "http://localhost:3000");
    assert!(normalize_api_url("localhost:3000").is_err());
    assert!(normalize_api_url("ftp://files.banco.local").is_err());
}
