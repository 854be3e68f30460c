use serial_test::serial;
use sharepoint_scrape::config::RetryPolicy;
use sharepoint_scrape::error::ConfigError;
use sharepoint_scrape::load_config::{load_config, load_config_with, load_settings};
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn all_vars(key: &str) -> Option<String> {
    match key {
        "TENANT_ID" => Some("tenant".into()),
        "CLIENT_ID" => Some("client".into()),
        "CLIENT_SECRET" => Some("secret".into()),
        "MS_SP_ID" => Some("contoso.sharepoint.com,abc,def".into()),
        _ => None,
    }
}

fn yaml_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), content).unwrap();
    file
}

/// A partial settings file keeps defaults for every key it leaves out.
#[test]
fn partial_settings_file_keeps_defaults() {
    let file = yaml_file(
        r#"
output_dir: ./tmp/scrape
retry:
  max_attempts: 5
"#,
    );

    let config = load_config_with(Some(file.path()), all_vars).expect("config should load");

    assert_eq!(config.settings.output_dir, PathBuf::from("./tmp/scrape"));
    assert_eq!(config.settings.retry.max_attempts, 5);
    assert_eq!(config.settings.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
    assert_eq!(config.settings.page_size, 200);
    assert_eq!(config.settings.http_timeout_secs, 30);
    assert!(!config.settings.skip_existing);
    assert_eq!(config.credentials.site_id, "contoso.sharepoint.com,abc,def");
}

#[test]
fn no_settings_file_means_defaults() {
    let config = load_config_with(None::<PathBuf>, all_vars).unwrap();
    assert_eq!(config.settings.output_dir, PathBuf::from("data"));
    assert_eq!(config.settings.pages_dir(), PathBuf::from("data/pages"));
    assert_eq!(config.settings.files_dir(), PathBuf::from("data/files"));
}

#[test]
fn empty_settings_file_means_defaults() {
    let file = yaml_file("\n");
    let settings = load_settings(file.path()).unwrap();
    assert_eq!(settings.graph_base_url, "https://graph.microsoft.com/v1.0");
}

/// If the file is not valid YAML the loader reports a parse error.
#[test]
fn invalid_yaml_is_a_parse_error() {
    let file = yaml_file("not-yaml: [:::");
    let err = load_config_with(Some(file.path()), all_vars).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "got {err:?}");
    assert!(err.to_string().contains("YAML"));
}

#[test]
fn missing_file_is_a_read_error() {
    let err = load_settings("/definitely/not/here.yaml").unwrap_err();
    match err {
        ConfigError::Read { path, .. } => assert!(path.ends_with("here.yaml")),
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn out_of_range_values_are_rejected() {
    let file = yaml_file("retry:\n  max_attempts: 0\n");
    let err = load_config_with(Some(file.path()), all_vars).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "retry.max_attempts",
            ..
        }
    ));
}

#[test]
fn zero_timeout_in_settings_file_is_rejected() {
    let file = yaml_file("http_timeout_secs: 0\n");
    let err = load_config_with(Some(file.path()), all_vars).unwrap_err();
    assert!(err.to_string().contains("http_timeout_secs"), "got {err}");
}

#[test]
fn blank_variable_counts_as_missing() {
    let err = load_config_with(None::<PathBuf>, |key| match key {
        "CLIENT_SECRET" => Some("   ".into()),
        other => all_vars(other),
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::MissingVar("CLIENT_SECRET")));
}

/// Credentials come straight from the process environment.
#[test]
#[serial]
fn load_config_reads_process_environment() {
    env::set_var("TENANT_ID", "env-tenant");
    env::set_var("CLIENT_ID", "env-client");
    env::set_var("CLIENT_SECRET", "env-secret");
    env::set_var("MS_SP_ID", "env-site");

    let config = load_config(None::<PathBuf>).expect("config should load");
    assert_eq!(config.credentials.tenant_id, "env-tenant");
    assert_eq!(config.credentials.site_id, "env-site");

    env::remove_var("MS_SP_ID");
    let err = load_config(None::<PathBuf>).unwrap_err();
    assert!(
        err.to_string().contains("MS_SP_ID"),
        "Must error for missing env var, got: {err}"
    );

    for key in ["TENANT_ID", "CLIENT_ID", "CLIENT_SECRET"] {
        env::remove_var(key);
    }
}
