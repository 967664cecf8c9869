use std::fs;
use tempfile::TempDir;
use testgap::config::{load_config_from, load_config_from_path, CONFIG_FILE_NAME};
use testgap::{Error, TestgapConfig, UnitKind};

#[test]
fn nearest_config_file_wins() {
    let root = TempDir::new().unwrap();
    let nested = root.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        "[coverage]\nlow_coverage_threshold = 30.0\n",
    )
    .unwrap();
    fs::write(
        root.path().join("a").join(CONFIG_FILE_NAME),
        indoc::indoc! {r#"
            [mapping]
            name_weight = 0.6

            [priority]
            kinds = ["function", "method", "class"]

            [validation]
            min_assertions = 2
            disabled_rules = ["no-sleep"]
        "#},
    )
    .unwrap();

    let config = load_config_from(&nested);
    assert_eq!(config.mapping.name_weight, 0.6);
    assert_eq!(config.mapping.reference_weight, 0.3);
    assert_eq!(config.coverage.low_coverage_threshold, 50.0);
    assert_eq!(
        config.priority.kinds,
        vec![UnitKind::Function, UnitKind::Method, UnitKind::Class]
    );
    assert_eq!(config.validation.min_assertions, 2);
    assert!(config.is_rule_disabled("no-sleep"));
}

#[test]
fn missing_config_yields_defaults() {
    let root = TempDir::new().unwrap();
    assert_eq!(load_config_from(root.path()), TestgapConfig::default());
}

#[test]
fn lenient_loader_resets_invalid_sections() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join(CONFIG_FILE_NAME),
        "[mapping]\nproximity_weight = 1.5\n\n[coverage]\nlow_coverage_threshold = 80.0\n",
    )
    .unwrap();

    let config = load_config_from(root.path());
    assert_eq!(config.mapping.proximity_weight, 0.2);
    assert_eq!(config.coverage.low_coverage_threshold, 80.0);
}

#[test]
fn strict_loader_reports_errors() {
    let root = TempDir::new().unwrap();
    let path = root.path().join(CONFIG_FILE_NAME);

    assert!(matches!(
        load_config_from_path(&path),
        Err(Error::FileSystem { .. })
    ));

    fs::write(&path, "[coverage]\nlow_coverage_threshold = 150.0\n").unwrap();
    assert!(matches!(
        load_config_from_path(&path),
        Err(Error::Configuration(_))
    ));

    fs::write(&path, "[coverage\n").unwrap();
    assert!(matches!(load_config_from_path(&path), Err(Error::Toml(_))));
}
