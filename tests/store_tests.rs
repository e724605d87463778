//! Integration tests for the configuration store.
//!
//! Covers the layering chain as seen from outside the crate:
//! - module defaults, base-directory defaults and the user file
//! - overlays onto detached trees and live layers
//! - safe navigation over the merged result

use layered_config::config::{ModuleInfo, ModuleSource, StaticModules};
use layered_config::{ConfigError, ConfigNode, ConfigStore, OverlayTarget, StoreOptions};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to open a store over a temp base directory without a file watch.
fn open_store(base: &TempDir, modules: Vec<ModuleInfo>) -> ConfigStore {
    let modules: Arc<dyn ModuleSource> = Arc::new(modules.into_iter().collect::<StaticModules>());
    ConfigStore::open(StoreOptions::new(base.path()).with_watch(false), Some(modules))
}

fn app_modules() -> Vec<ModuleInfo> {
    vec![
        ModuleInfo::new("http").with_defaults(
            r#"{
                "server": {"host": "0.0.0.0", "port": 80, "middleware": ["log"]},
                "timeout": 30
            }"#,
        ),
        ModuleInfo::new("app").entry().with_defaults(
            r#"
            # shipped with the application
            {
                "server": {"port": 8080, "middleware": ["auth"]},
                "name": "demo"
            }"#,
        ),
    ]
}

#[test]
fn test_three_layer_precedence() {
    let base = TempDir::new().unwrap();
    fs::write(
        base.path().join("settings.json"),
        r#"{"server": {"port": 9000, "middleware": ["trace"]}, "debug": true}"#,
    )
    .unwrap();

    let store = open_store(&base, app_modules());
    let global = store.global();

    assert_eq!(global.at("server.host").as_str(), "0.0.0.0");
    assert_eq!(global.at("server.port").as_u64(), 9000);
    assert_eq!(global.at("timeout").as_i64(), 30);
    assert_eq!(global.at("name").as_str(), "demo");
    assert!(global.at("debug").as_bool());

    let middleware: Vec<&str> = global.at("server.middleware").iter().map(|n| n.as_str()).collect();
    assert_eq!(middleware, vec!["log", "auth", "trace"]);
}

#[test]
fn test_user_file_name_is_case_insensitive() {
    let base = TempDir::new().unwrap();
    fs::write(base.path().join("Settings.JSONC"), "# user\n{\"name\": \"mine\"}").unwrap();

    let store = open_store(&base, app_modules());
    assert_eq!(store.global()["name"].as_str(), "mine");
}

#[test]
fn test_null_in_user_file_overrides_default() {
    let base = TempDir::new().unwrap();
    fs::write(base.path().join("settings.json"), r#"{"timeout": null}"#).unwrap();

    let store = open_store(&base, app_modules());
    let global = store.global();
    let timeout = &global["timeout"];
    assert!(timeout.exists());
    assert!(timeout.is_null());
    assert_eq!(timeout.as_i64(), 0);
}

#[test]
fn test_safe_navigation_never_fails() {
    let base = TempDir::new().unwrap();
    let store = open_store(&base, app_modules());
    let global = store.global();

    let missing = global.at("server.tls.certificate.path");
    assert!(missing.is_absent());
    assert_eq!(missing.as_str(), "");
    assert_eq!(missing.len(), 0);
    assert_eq!(missing.iter().count(), 0);

    assert!(global["server"]["middleware"][7].is_absent());
    assert!(global["timeout"]["nested"].is_absent());
    assert!(global.at("server.middleware[0]").exists());
}

#[test]
fn test_deserialize_section() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
        middleware: Vec<String>,
    }

    let base = TempDir::new().unwrap();
    let store = open_store(&base, app_modules());
    let server: Server = store.global()["server"].deserialize().unwrap();
    assert_eq!(
        server,
        Server {
            host: "0.0.0.0".to_string(),
            port: 8080,
            middleware: vec!["log".to_string(), "auth".to_string()],
        }
    );
}

#[test]
fn test_reads_are_idempotent() {
    let base = TempDir::new().unwrap();
    fs::write(base.path().join("settings.json"), r#"{"name": "x"}"#).unwrap();
    let store = open_store(&base, app_modules());

    let first = store.get_current_scope();
    let second = store.get_current_scope();
    assert_eq!(first, second);
    assert_eq!(*store.global(), first);
}

#[test]
fn test_scope_is_a_snapshot() {
    let base = TempDir::new().unwrap();
    let file = base.path().join("settings.json");
    fs::write(&file, r#"{"name": "before"}"#).unwrap();
    let store = open_store(&base, app_modules());

    let snapshot = store.get_current_scope();
    fs::write(&file, r#"{"name": "after"}"#).unwrap();
    assert!(store.reload_user().unwrap());

    assert_eq!(snapshot["name"].as_str(), "before");
    assert_eq!(store.global()["name"].as_str(), "after");
}

#[test]
fn test_defaults_directory_between_modules_and_user() {
    let base = TempDir::new().unwrap();
    let defaults = base.path().join("config.d");
    fs::create_dir(&defaults).unwrap();
    fs::write(defaults.join("20-site.json"), r#"{"timeout": 60, "name": "site"}"#).unwrap();
    fs::write(defaults.join("10-region.json"), r#"{"timeout": 45}"#).unwrap();
    fs::write(defaults.join("notes.txt"), "ignored").unwrap();
    fs::write(base.path().join("settings.json"), r#"{"name": "user"}"#).unwrap();

    let store = open_store(&base, app_modules());
    assert_eq!(store.default_config()["timeout"].as_i64(), 60);
    assert_eq!(store.default_config()["name"].as_str(), "site");
    assert_eq!(store.global()["name"].as_str(), "user");
}

#[test]
fn test_overlay_directory_onto_global_copy() {
    let base = TempDir::new().unwrap();
    let overlays = base.path().join("env").join("staging");
    fs::create_dir_all(&overlays).unwrap();
    fs::write(overlays.join("a.json"), r#"{"server": {"port": 8443}}"#).unwrap();
    fs::write(overlays.join("b.jsonc"), "# tls\n{\"server\": {\"tls\": true}}").unwrap();

    let store = open_store(&base, app_modules());
    let global = store.global();
    let staged = store
        .apply_from_directory("env/staging", OverlayTarget::Tree(&global), false)
        .unwrap();

    assert_eq!(staged.at("server.port").as_i64(), 8443);
    assert!(staged.at("server.tls").as_bool());
    assert_eq!(staged.at("name").as_str(), "demo");
    // The live store is untouched.
    assert_eq!(store.global().at("server.port").as_i64(), 8080);
}

#[test]
fn test_overlay_directory_with_broken_file_fails_whole_call() {
    let base = TempDir::new().unwrap();
    let overlays = base.path().join("overlays");
    fs::create_dir(&overlays).unwrap();
    fs::write(overlays.join("a.json"), r#"{"name": "a"}"#).unwrap();
    fs::write(overlays.join("b.json"), r#"{"name": "#).unwrap();

    let store = open_store(&base, app_modules());
    let before = store.generation();
    let err = store
        .apply_from_directory("overlays", OverlayTarget::Default, false)
        .unwrap_err();
    assert!(matches!(err, ConfigError::MalformedSource { .. }));
    assert_eq!(store.generation(), before);
    assert_eq!(store.global()["name"].as_str(), "demo");
}

#[test]
fn test_overlay_file_onto_default() {
    let base = TempDir::new().unwrap();
    fs::write(base.path().join("extra.json"), r#"{"features": ["beta"]}"#).unwrap();

    let store = open_store(&base, app_modules());
    store
        .apply_json_from_path("extra.json", OverlayTarget::Default)
        .unwrap();
    assert_eq!(store.global()["features"][0].as_str(), "beta");
}

#[test]
fn test_overlay_missing_file() {
    let base = TempDir::new().unwrap();
    let store = open_store(&base, app_modules());
    let err = store
        .apply_json_from_path("missing.json", OverlayTarget::Detached)
        .unwrap_err();
    assert!(matches!(err, ConfigError::SourceNotFound(_)));
}

#[test]
fn test_store_without_sources() {
    let store = ConfigStore::new(ConfigNode::Absent, ConfigNode::Absent);
    assert!(store.global().is_absent());
    assert!(store.get_current_scope().is_mapping());
    assert!(store.get_current_scope().is_empty());

    store.set_user_config(ConfigNode::from(json!({"a": [1]})));
    store.set_default_config(ConfigNode::from(json!({"a": [0]})));
    assert_eq!(store.global()["a"].as_list().len(), 2);
}
