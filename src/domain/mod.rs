// ==========================================
// AMD 方案模拟引擎 - 领域模型层
// ==========================================
// 职责: 定义患者、访视、状态标签
// 红线: 不含随机抽样逻辑,不含引擎逻辑
// ==========================================

pub mod patient;
pub mod types;
pub mod visit;

// 重导出核心类型
pub use patient::{Patient, PatientTrajectory, SchedulerState};
pub use types::{
    DiscontinuationCriterion, DiscontinuationType, DiseaseActivity, DiseaseState, IntervalAction,
    ProtocolType, ResponderClass, SchedulerPhase, TreatmentStatus, VisitType,
};
pub use visit::{IntervalDecision, Visit, VisitActions};
