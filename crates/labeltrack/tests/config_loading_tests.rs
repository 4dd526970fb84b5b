//! Table-driven tests for configuration loading and validation, plus the
//! effect of a loaded config on the lifecycle.

mod common;

use common::{at, JobBuilder, TestHarness};

use labeltrack::config::load_config_from_str;
use labeltrack::{load_config, ClosureReport, JobState, LifecycleWarning, PauseReason, Stage};

/// Represents a single config loading test case.
struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "databasePath": "/srv/plant/labeltrack.db",
            "catalogUnits": [80, 88, 96],
            "resumeFallbackStage": "Die-cutting",
            "allowStageSkip": false,
            "machines": {
                "Printing": ["SP1", "FIT 350"],
                "Control Calidad": ["QC Station 1"]
            },
            "logging": { "level": "labeltrack=debug", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "legacy_stage_names",
        config_json: r#"{
            "version": "1.0",
            "resumeFallbackStage": "Impresion",
            "machines": { "Troquelado": [] }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "allowStageSkip": true }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "wrong_version",
        config_json: r#"{ "version": "0.9" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "unit_out_of_range",
        config_json: r#"{ "version": "1.0", "catalogUnits": [88, 70000] }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "zero_only_catalog",
        config_json: r#"{ "version": "1.0", "catalogUnits": [0] }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "bad_log_format",
        config_json: r#"{ "version": "1.0", "logging": { "format": "xml" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "fallback_not_a_stage",
        config_json: r#"{ "version": "1.0", "resumeFallbackStage": "Lamination" }"#,
        should_succeed: false,
        expected_error: Some("resumeFallbackStage"),
    },
    ConfigTestCase {
        name: "machines_for_unknown_stage",
        config_json: r#"{ "version": "1.0", "machines": { "Varnish": ["V1"] } }"#,
        should_succeed: false,
        expected_error: Some("not a production stage"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_config_file_drives_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "version": "1.0",
            "resumeFallbackStage": "Dispatch",
            "allowStageSkip": false,
            "machines": { "Printing": ["Nilpeter FA-17"] }
        }"#,
    )
    .unwrap();
    let config = load_config(&path).unwrap();

    let harness = TestHarness::with_config(config);
    let lc = harness.lifecycle();
    let id = lc
        .create_job(&JobBuilder::new("Tag").build(), Stage::Prepress, &at(0))
        .unwrap()
        .job
        .id;

    // Built-in press names are replaced by the configured list.
    assert!(lc
        .advance(id, Stage::Printing, Some("SP1"), &ClosureReport::default(), &at(5))
        .is_err());
    lc.advance(
        id,
        Stage::Printing,
        Some("Nilpeter FA-17"),
        &ClosureReport::default(),
        &at(5),
    )
    .unwrap();

    // Skipping is off: Printing can only go to Quality-Control.
    let err = lc
        .advance(id, Stage::Dispatch, None, &ClosureReport::default(), &at(10))
        .unwrap_err();
    assert!(err.to_string().contains("the next stage is Quality-Control"));
}

#[test]
fn test_configured_fallback_used_on_resume() {
    let mut config = labeltrack::Config::default();
    config.resume_fallback_stage = "Despacho".to_string();
    let harness = TestHarness::with_config(config);
    let lc = harness.lifecycle();
    let id = lc
        .create_job(&JobBuilder::new("Tag").build(), Stage::Design, &at(0))
        .unwrap()
        .job
        .id;
    lc.pause(id, &PauseReason::EndOfShift, &at(60)).unwrap();

    // Lose the remembered stage the way a manual edit would.
    let mut job = lc.job(id).unwrap();
    job.previous_stage = None;
    labeltrack::ProductionStore::save_job(lc.store(), &job).unwrap();

    let resumed = lc.resume(id, &at(120)).unwrap();
    assert_eq!(resumed.job.state, JobState::Stage(Stage::Dispatch));
    assert_eq!(
        resumed.warnings,
        vec![LifecycleWarning::MissingPreviousStage {
            job_id: id,
            fallback: Stage::Dispatch,
        }]
    );
}
