// ==========================================
// 单元测试共用方案样例
// ==========================================

use crate::config::protocol_document::ProtocolDocument;
use crate::config::protocol_spec::ProtocolSpec;
use serde_json::Value;
use std::sync::Arc;

const SAMPLE_PROTOCOL: &str = include_str!("../../tests/fixtures/tae_protocol.json");

pub fn sample_protocol_json() -> Value {
    serde_json::from_str(SAMPLE_PROTOCOL).unwrap()
}

pub fn sample_document() -> ProtocolDocument {
    ProtocolDocument::from_json_str(SAMPLE_PROTOCOL).unwrap()
}

/// 从修改后的 JSON 构造已校验方案
pub fn protocol_from_value(value: Value) -> Arc<ProtocolSpec> {
    let doc = ProtocolDocument::from_json_value(value).unwrap();
    Arc::new(ProtocolSpec::from_document(&doc).unwrap())
}

pub fn sample_protocol() -> Arc<ProtocolSpec> {
    protocol_from_value(sample_protocol_json())
}
