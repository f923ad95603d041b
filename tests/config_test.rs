// ==========================================
// 方案配置集成测试
// ==========================================
// 职责: 验证方案文件从解析到校验的完整边界
// 场景: 文件加载 / 字段缺失 / 多余嵌套 / 数值非法
// ==========================================

mod test_helpers;

use amd_tae_sim::config::{ConfigError, ProtocolDocument, ProtocolSpec};
use amd_tae_sim::domain::{DiseaseState, ProtocolType};
use serde_json::json;
use test_helpers::{sample_protocol, sample_protocol_json};

fn validate(value: serde_json::Value) -> Result<ProtocolSpec, ConfigError> {
    ProtocolSpec::from_document(&ProtocolDocument::from_json_value(value)?)
}

#[test]
fn test_load_sample_protocol_from_file() {
    let protocol = sample_protocol();
    assert_eq!(protocol.protocol_type(), ProtocolType::TreatAndExtend);
    assert_eq!(protocol.interval().min_interval, 28);
    assert_eq!(protocol.interval().max_interval, 112);
    assert_eq!(protocol.loading().doses, 3);
    assert_eq!(
        protocol
            .transitions()
            .probability(DiseaseState::Stable, DiseaseState::Naive),
        0.0
    );
    assert!(protocol.discontinuation().enabled);
}

#[test]
fn test_missing_enabled_is_rejected() {
    let mut value = sample_protocol_json();
    value["discontinuation_rules"]
        .as_object_mut()
        .unwrap()
        .remove("enabled");

    let err = validate(value).unwrap_err();
    assert_eq!(err.path(), Some("discontinuation_rules.enabled"));
}

#[test]
fn test_enabled_nested_one_level_too_deep_is_rejected() {
    let mut value = sample_protocol_json();
    let rules = value["discontinuation_rules"].take();
    let mut rules = rules.as_object().unwrap().clone();
    let enabled = rules.remove("enabled").unwrap();
    value["discontinuation_rules"] = json!({
        "discontinuation_rules": { "enabled": enabled },
        "poor_vision": rules["poor_vision"],
        "high_injection_burden": rules["high_injection_burden"],
        "long_duration": rules["long_duration"],
        "random": rules["random"],
        "monitoring": rules["monitoring"],
    });

    assert!(matches!(validate(value), Err(ConfigError::Parse(_))));
}

#[test]
fn test_row_sum_mismatch_reports_path() {
    let mut value = sample_protocol_json();
    value["disease_transitions"]["ACTIVE"]["HIGHLY_ACTIVE"] = json!(0.2);

    match validate(value) {
        Err(ConfigError::RowSumMismatch { path, sum }) => {
            assert_eq!(path, "disease_transitions.ACTIVE");
            assert!((sum - 1.09).abs() < 1e-9);
        }
        other => panic!("unexpected: {:?}", other.map(|p| p.name().to_string())),
    }
}

#[test]
fn test_negative_std_is_rejected() {
    let mut value = sample_protocol_json();
    value["vision_change"]["ACTIVE"]["untreated"]["std"] = json!(-1.0);

    let err = validate(value).unwrap_err();
    assert_eq!(err.path(), Some("vision_change.ACTIVE.untreated.std"));
}

#[test]
fn test_missing_extension_step_is_rejected() {
    let mut value = sample_protocol_json();
    value["interval"]
        .as_object_mut()
        .unwrap()
        .remove("extension_step");

    let err = validate(value).unwrap_err();
    assert_eq!(err.path(), Some("interval.extension_step"));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = ProtocolSpec::from_path("tests/fixtures/does_not_exist.json");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_snapshot_contains_effective_values() {
    let mut value = sample_protocol_json();
    value["interval"]["practical_max_interval"] = json!(84);
    let protocol = validate(value).unwrap();

    let snapshot: serde_json::Value =
        serde_json::from_str(&protocol.snapshot_json().unwrap()).unwrap();
    assert_eq!(snapshot["interval"]["max_interval"], json!(84));
    assert_eq!(snapshot["interval"]["nominal_max_interval"], json!(112));
    assert_eq!(snapshot["name"], json!(protocol.name()));
}
