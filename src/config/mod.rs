// ==========================================
// AMD 方案模拟引擎 - 配置层
// ==========================================
// 职责: 方案文档解析 → 单一校验边界 → 冻结的 ProtocolSpec
// 红线: 引擎只接受 ProtocolSpec,不接受未校验文档
// ==========================================

pub mod error;
pub mod protocol_document;
pub mod protocol_spec;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_fixtures;

// 重导出核心配置类型
pub use error::{ConfigError, ConfigResult};
pub use protocol_document::{DiscontinuationRulesDocument, ProtocolDocument};
pub use protocol_spec::{
    BaselineVision, DiscontinuationRules, IntervalRules, LoadingPhase, MonitoringRules,
    NormalParams, ProtocolSpec, RandomCriterion, ResponderParams, ResponderTable,
    ThresholdCriterion, TransitionMatrix, TreatmentEffect, VisionChangeTable, ROW_SUM_TOLERANCE,
};
pub use validator::ProtocolValidator;
