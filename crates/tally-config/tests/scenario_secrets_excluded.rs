//! Secrets never appear as literals in config, and resolved values never
//! appear in Debug output.

use tally_config::*;

#[test]
fn literal_database_url_is_rejected() {
    let yaml = r#"
game:
  channel_id: 1
store:
  database_url_env: "postgres://user:hunter2@db/tally"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("/store/database_url_env"));
    assert!(!msg.contains("hunter2"));
}

#[test]
fn literal_bot_token_is_rejected() {
    let yaml = "bridge:\n  token: \"MTIzNDU2Nzg5MDEyMzQ1Njc4.GaBcDe.abcdefghijklmnopqrstuvwxyz012345\"\n";
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    assert!(err.to_string().contains("CONFIG_SECRET_DETECTED"));
}

#[test]
fn resolved_database_url_is_redacted_in_debug() {
    let var = "TALLY_TEST_SECRETS_REDACTED_URL";
    std::env::set_var(var, "postgres://user:hunter2@db/tally");
    let yaml = format!("game:\n  channel_id: 1\nstore:\n  database_url_env: {var}\n");
    let cfg = load_layered_yaml_from_strings(&[&yaml])
        .unwrap()
        .typed()
        .unwrap();

    let secrets = resolve_secrets(&cfg, true).unwrap();
    assert!(secrets.database_url.is_some());
    let dbg = format!("{secrets:?}");
    assert!(dbg.contains("<REDACTED>"));
    assert!(!dbg.contains("hunter2"));
    std::env::remove_var(var);
}

#[test]
fn missing_required_database_url_names_the_var() {
    let var = "TALLY_TEST_SECRETS_MISSING_URL";
    std::env::remove_var(var);
    let yaml = format!("game:\n  channel_id: 1\nstore:\n  database_url_env: {var}\n");
    let cfg = load_layered_yaml_from_strings(&[&yaml])
        .unwrap()
        .typed()
        .unwrap();

    let err = resolve_secrets(&cfg, true).unwrap_err();
    assert!(err.to_string().contains("SECRETS_MISSING"));
    assert!(err.to_string().contains(var));

    let optional = resolve_secrets(&cfg, false).unwrap();
    assert!(optional.database_url.is_none());
}
