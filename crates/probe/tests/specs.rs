//! The declarative scenarios shipped in the repository parse

use racing_probe::spec::Step;
use racing_probe::{Scenario, ScenarioSpec, SessionConfig};
use std::path::Path;

#[test]
fn shipped_scenarios_load() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
    let specs = ScenarioSpec::load_all(&dir).unwrap();

    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first-answer", "menu-smoke"]);

    let menu = &specs[1];
    assert_eq!(
        menu.entry(&SessionConfig::default()),
        "/games-number-racing.html?profile=1764998591846"
    );
    assert!(menu
        .steps
        .iter()
        .any(|s| matches!(s, Step::PollUntil { max_attempts: Some(10), .. })));
}

#[test]
fn example_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../racing-probe.example.yaml");
    let config = racing_probe::HarnessConfig::from_yaml_file(&path).unwrap();

    assert_eq!(config.session.white_screen_min_chars, 100);
    assert_eq!(config.runner.specs_dir.as_deref(), Some(Path::new("scenarios")));
    assert!(config.playwright.headless);
}
