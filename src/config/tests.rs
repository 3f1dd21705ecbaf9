//! Tests for configuration loading

use super::*;
use std::io::Write;

#[test]
fn test_defaults() {
    let config = BoundaryConfig::default();
    assert_eq!(config.stubs.trace, TraceMode::Off);
    assert_eq!(config.convention.abi, Abi::host());
    assert_eq!(config.handles.limit, HandleStack::DEFAULT_LIMIT);
}

#[test]
fn test_empty_document_uses_defaults() {
    assert_eq!(BoundaryConfig::parse("").unwrap(), BoundaryConfig::default());
}

#[test]
fn test_parse_all_sections() {
    let config = BoundaryConfig::parse(
        r#"
        [stubs]
        trace = "dynamic"

        [convention]
        abi = "win64"

        [handles]
        capacity = 8
        limit = 32
        "#,
    )
    .unwrap();
    assert_eq!(config.stubs.trace, TraceMode::Dynamic);
    assert_eq!(config.convention.abi, Abi::Win64);
    assert_eq!(config.handles, HandleConfig { capacity: 8, limit: 32 });
}

#[test]
fn test_partial_section_keeps_field_defaults() {
    let config = BoundaryConfig::parse("[handles]\nlimit = 10\n").unwrap();
    assert_eq!(config.handles.limit, 10);
    assert_eq!(config.handles.capacity, HandleStack::DEFAULT_CAPACITY);
}

#[test]
fn test_unknown_trace_mode_is_parse_error() {
    let err = BoundaryConfig::parse("[stubs]\ntrace = \"loud\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_zero_limit_is_rejected() {
    let err = BoundaryConfig::parse("[handles]\nlimit = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "handles.limit", .. }));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[stubs]\ntrace = \"always\"").unwrap();
    let config = BoundaryConfig::load(file.path()).unwrap();
    assert_eq!(config.stubs.trace, TraceMode::Always);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = BoundaryConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_find_in_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE), "[convention]\nabi = \"aapcs\"\n").unwrap();

    let found = BoundaryConfig::find_in(&nested).unwrap();
    assert_eq!(found, dir.path().join(CONFIG_FILE));
    assert_eq!(BoundaryConfig::load(&found).unwrap().convention.abi, Abi::Aapcs);
}

#[test]
fn test_overrides() {
    let mut config = BoundaryConfig::default();
    config.apply_overrides(Some("dynamic"), Some("arm64")).unwrap();
    assert_eq!(config.stubs.trace, TraceMode::Dynamic);
    assert_eq!(config.convention.abi, Abi::Aarch64);

    let err = config.apply_overrides(None, Some("sparc")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "convention.abi", .. }));
}

#[test]
fn test_round_trip_through_toml() {
    let mut config = BoundaryConfig::default();
    config.stubs.trace = TraceMode::Always;
    config.convention.abi = Abi::Aarch64;
    let text = toml::to_string(&config).unwrap();
    assert_eq!(BoundaryConfig::parse(&text).unwrap(), config);
}
