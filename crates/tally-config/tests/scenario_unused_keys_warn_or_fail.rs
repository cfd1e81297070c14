use tally_config::*;

const YAML: &str = r#"
game:
  channel_id: 7
  greeting: "hi"
daemon:
  addr: "127.0.0.1:9000"
store:
  database_url_env: TALLY_DATABASE_URL
"#;

#[test]
fn daemon_surface_reports_unread_leaf() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigSurface::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/game/greeting".to_string()]);
    assert!(!report.is_clean());
}

#[test]
fn cli_surface_does_not_read_daemon_section() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigSurface::Cli, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/daemon/addr".to_string(), "/game/greeting".to_string()]
    );
}

#[test]
fn fail_policy_errors_with_stable_prefix() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigSurface::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(err.to_string().starts_with("CONFIG_UNUSED_KEYS (surface=DAEMON)"));
}

#[test]
fn clean_config_passes_fail_policy() {
    let loaded = load_layered_yaml_from_strings(&["game:\n  channel_id: 7\n"]).unwrap();
    let report =
        report_unused_keys(ConfigSurface::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)
            .unwrap();
    assert!(report.is_clean());
}
