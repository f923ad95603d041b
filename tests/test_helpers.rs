// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供方案样例、临时数据库等集成测试共用设施
// ==========================================

#![allow(dead_code)]

use amd_tae_sim::config::{ProtocolDocument, ProtocolSpec};
use amd_tae_sim::repository::TrajectoryRepository;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// 样例方案文件路径
pub fn sample_protocol_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("tae_protocol.json")
}

/// 样例方案 JSON（便于逐字段修改）
pub fn sample_protocol_json() -> Value {
    let raw = std::fs::read_to_string(sample_protocol_path()).unwrap();
    serde_json::from_str(&raw).unwrap()
}

/// 从 JSON 构造已校验方案
pub fn protocol_from_value(value: Value) -> Arc<ProtocolSpec> {
    let doc = ProtocolDocument::from_json_value(value).unwrap();
    Arc::new(ProtocolSpec::from_document(&doc).unwrap())
}

pub fn sample_protocol() -> Arc<ProtocolSpec> {
    Arc::new(ProtocolSpec::from_path(sample_protocol_path()).unwrap())
}

/// 把停药规则概率全部清零（只保留调用方显式打开的判据）
pub fn quiet_discontinuation(value: &mut Value) {
    let rules = &mut value["discontinuation_rules"];
    for key in ["poor_vision", "high_injection_burden", "long_duration", "random"] {
        rules[key]["probability"] = Value::from(0.0);
    }
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - TrajectoryRepository: 已建表的仓储
pub fn create_test_repo() -> Result<(NamedTempFile, TrajectoryRepository), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let repo = TrajectoryRepository::open(&db_path)?;
    Ok((temp_file, repo))
}
