//! ---
//! fhm_section: "15-testing-qa-runbook"
//! fhm_subsection: "integration-tests"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Integration and validation tests for the R-FHM stack."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use r_fhm_common::config::{AppConfig, Mode};
use r_fhm_common::LogFormat;

fn config_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("configs")
        .join(name)
}

#[test]
fn shipped_example_configs_load_and_validate() {
    let dev = AppConfig::load(&[config_path("example.dev.toml")]).unwrap();
    assert_eq!(dev.mode, Mode::Simulation);
    assert_eq!(dev.logging.format, LogFormat::Pretty);
    assert_eq!(dev.api.listen.port(), 8080);
    assert_eq!(dev.transport.topic, "helicopter/fuel");
    assert!(dev.stream.enabled);

    let prod = AppConfig::load(&[config_path("example.prod.toml")]).unwrap();
    assert_eq!(prod.mode, Mode::Production);
    assert_eq!(prod.logging.format, LogFormat::StructuredJson);
    assert!(prod.model.artifact_path.starts_with("/var/lib"));
    assert_eq!(prod.metrics.listen.port(), 9898);
}

#[test]
fn dev_example_matches_builtin_defaults() {
    let dev = AppConfig::load(&[config_path("example.dev.toml")]).unwrap();
    let defaults = AppConfig::default();
    assert_eq!(dev.simulator.rpm_min, defaults.simulator.rpm_min);
    assert_eq!(dev.simulator.rpm_max, defaults.simulator.rpm_max);
    assert_eq!(
        dev.simulator.temp_excursion_probability,
        defaults.simulator.temp_excursion_probability
    );
    assert_eq!(dev.stream.tick_interval, defaults.stream.tick_interval);
    assert_eq!(
        dev.model.min_training_samples,
        defaults.model.min_training_samples
    );
    assert_eq!(dev.model.contamination, defaults.model.contamination);
    assert_eq!(dev.transport.topic, defaults.transport.topic);
}

#[test]
fn example_configs_carry_frontmatter_headers() {
    for name in ["example.dev.toml", "example.prod.toml"] {
        let content = fs::read_to_string(config_path(name))
            .unwrap_or_else(|err| panic!("failed to read {name}: {err}"));
        assert!(
            content.starts_with("# ---"),
            "{name} must include a frontmatter header"
        );
        assert!(
            content.contains("fhm_section:"),
            "{name} must name its documentation section"
        );
    }
}
