// ==========================================
// AMD 方案模拟引擎 - 方案文档（未校验）
// ==========================================
// 职责: 方案文件的反序列化形态
// 约定: 所有字段均为 Option,缺失与否只由 validator 判定;
//       deny_unknown_fields 拒绝多余嵌套层(例如 discontinuation_rules 内再套一层)
// ==========================================

use crate::config::error::ConfigResult;
use crate::domain::types::ProtocolType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 状态名 → 状态名 → 数值
pub type StateTable = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolDocument {
    pub name: Option<String>,
    pub protocol_type: Option<ProtocolType>,
    pub interval: Option<IntervalDocument>,
    pub loading: Option<LoadingDocument>,
    pub disease_transitions: Option<StateTable>,
    pub treatment_effect: Option<StateTable>,
    pub vision_change: Option<BTreeMap<String, VisionChangeDocument>>,
    pub baseline_vision: Option<BaselineVisionDocument>,
    pub responder_classes: Option<ResponderClassesDocument>,
    pub discontinuation_rules: Option<DiscontinuationRulesDocument>,
}

impl ProtocolDocument {
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> ConfigResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntervalDocument {
    pub min_interval: Option<u32>,
    pub max_interval: Option<u32>,
    /// 实际可达上限（可选,存在时取两者较紧者）
    pub practical_max_interval: Option<u32>,
    pub initial_maintenance_interval: Option<u32>,
    pub extension_step: Option<u32>,
    pub shortening_step: Option<u32>,
    pub required_stable_visits: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadingDocument {
    pub doses: Option<u32>,
    pub interval: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalDocument {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisionChangeDocument {
    pub treated: Option<NormalDocument>,
    pub untreated: Option<NormalDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineVisionDocument {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderDocument {
    pub proportion: Option<f64>,
    pub multiplier: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderClassesDocument {
    pub good: Option<ResponderDocument>,
    pub average: Option<ResponderDocument>,
    pub poor: Option<ResponderDocument>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdCriterionDocument {
    pub threshold: Option<f64>,
    pub probability: Option<f64>,
    pub monitored: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomCriterionDocument {
    pub probability: Option<f64>,
    pub monitored: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringDocument {
    pub cadence_days: Option<u32>,
    pub recurrence_probability: Option<f64>,
}

/// 停药规则
///
/// enabled 与四个判据块必须处于同一层级;enabled 缺失属于致命错误,不等价于 false
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscontinuationRulesDocument {
    pub enabled: Option<bool>,
    pub poor_vision: Option<ThresholdCriterionDocument>,
    pub high_injection_burden: Option<ThresholdCriterionDocument>,
    pub long_duration: Option<ThresholdCriterionDocument>,
    pub random: Option<RandomCriterionDocument>,
    pub monitoring: Option<MonitoringDocument>,
}
