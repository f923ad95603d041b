// ==========================================
// AMD 方案模拟引擎 - 领域类型定义
// ==========================================
// 职责: 疾病状态、治疗状态、停药类型等枚举标签
// 红线: 状态用显式枚举 + 转移表表达,不散落在条件分支里
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 疾病状态 (Disease State)
// ==========================================
// 顺序即累计分布的遍历顺序,不可调整
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiseaseState {
    Naive,        // 初治(仅首诊出现)
    Stable,       // 稳定
    Active,       // 活动
    HighlyActive, // 高度活动
}

impl DiseaseState {
    /// 固定遍历顺序: NAIVE, STABLE, ACTIVE, HIGHLY_ACTIVE
    pub const ALL: [DiseaseState; 4] = [
        DiseaseState::Naive,
        DiseaseState::Stable,
        DiseaseState::Active,
        DiseaseState::HighlyActive,
    ];

    /// 在转移矩阵中的行/列下标
    pub fn index(self) -> usize {
        match self {
            DiseaseState::Naive => 0,
            DiseaseState::Stable => 1,
            DiseaseState::Active => 2,
            DiseaseState::HighlyActive => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseState::Naive => "NAIVE",
            DiseaseState::Stable => "STABLE",
            DiseaseState::Active => "ACTIVE",
            DiseaseState::HighlyActive => "HIGHLY_ACTIVE",
        }
    }

    /// 从方案文档中的状态名解析（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NAIVE" => Some(DiseaseState::Naive),
            "STABLE" => Some(DiseaseState::Stable),
            "ACTIVE" => Some(DiseaseState::Active),
            "HIGHLY_ACTIVE" => Some(DiseaseState::HighlyActive),
            _ => None,
        }
    }

    /// 访视评估结果: STABLE → 稳定, ACTIVE/HIGHLY_ACTIVE → 活动
    pub fn activity(self) -> DiseaseActivity {
        match self {
            DiseaseState::Active | DiseaseState::HighlyActive => DiseaseActivity::Active,
            DiseaseState::Naive | DiseaseState::Stable => DiseaseActivity::Stable,
        }
    }
}

impl fmt::Display for DiseaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 疾病活动度评估 (Disease Activity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiseaseActivity {
    Stable,
    Active,
}

// ==========================================
// 治疗状态 (Treatment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreatmentStatus {
    Active,       // 治疗中
    Monitoring,   // 停药后监测
    Discontinued, // 终止随访
}

impl fmt::Display for TreatmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreatmentStatus::Active => write!(f, "ACTIVE"),
            TreatmentStatus::Monitoring => write!(f, "MONITORING"),
            TreatmentStatus::Discontinued => write!(f, "DISCONTINUED"),
        }
    }
}

// ==========================================
// 停药类型 (Discontinuation Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscontinuationType {
    Planned,     // 计划停药(疗程足够长)
    Adverse,     // 注射负担/不良反应
    Ineffective, // 视力差,治疗无效
    Access,      // 行政/可及性原因
}

impl DiscontinuationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscontinuationType::Planned => "PLANNED",
            DiscontinuationType::Adverse => "ADVERSE",
            DiscontinuationType::Ineffective => "INEFFECTIVE",
            DiscontinuationType::Access => "ACCESS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PLANNED" => Some(DiscontinuationType::Planned),
            "ADVERSE" => Some(DiscontinuationType::Adverse),
            "INEFFECTIVE" => Some(DiscontinuationType::Ineffective),
            "ACCESS" => Some(DiscontinuationType::Access),
            _ => None,
        }
    }
}

impl fmt::Display for DiscontinuationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 停药判据 (Discontinuation Criterion)
// ==========================================
// 顺序即优先级: 视力差 > 注射负担 > 疗程时长 > 随机
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscontinuationCriterion {
    PoorVision,
    HighInjectionBurden,
    LongDuration,
    Random,
}

impl DiscontinuationCriterion {
    pub const PRECEDENCE: [DiscontinuationCriterion; 4] = [
        DiscontinuationCriterion::PoorVision,
        DiscontinuationCriterion::HighInjectionBurden,
        DiscontinuationCriterion::LongDuration,
        DiscontinuationCriterion::Random,
    ];

    /// 判据 → 记录的停药类型
    pub fn discontinuation_type(self) -> DiscontinuationType {
        match self {
            DiscontinuationCriterion::PoorVision => DiscontinuationType::Ineffective,
            DiscontinuationCriterion::HighInjectionBurden => DiscontinuationType::Adverse,
            DiscontinuationCriterion::LongDuration => DiscontinuationType::Planned,
            DiscontinuationCriterion::Random => DiscontinuationType::Access,
        }
    }
}

// ==========================================
// 应答分型 (Responder Class)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponderClass {
    Good,
    Average,
    Poor,
}

impl ResponderClass {
    /// 入组抽样时的遍历顺序
    pub const ALL: [ResponderClass; 3] = [
        ResponderClass::Good,
        ResponderClass::Average,
        ResponderClass::Poor,
    ];
}

impl fmt::Display for ResponderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponderClass::Good => write!(f, "GOOD"),
            ResponderClass::Average => write!(f, "AVERAGE"),
            ResponderClass::Poor => write!(f, "POOR"),
        }
    }
}

// ==========================================
// 访视类型 (Visit Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    Loading,     // 负荷期
    Maintenance, // 维持期
    Monitoring,  // 停药监测
    Retreatment, // 复发后再治疗(再负荷)
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::Loading => "LOADING",
            VisitType::Maintenance => "MAINTENANCE",
            VisitType::Monitoring => "MONITORING",
            VisitType::Retreatment => "RETREATMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOADING" => Some(VisitType::Loading),
            "MAINTENANCE" => Some(VisitType::Maintenance),
            "MONITORING" => Some(VisitType::Monitoring),
            "RETREATMENT" => Some(VisitType::Retreatment),
            _ => None,
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 间隔调整动作 (Interval Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalAction {
    Extend,
    Maintain,
    Shorten,
}

impl IntervalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalAction::Extend => "EXTEND",
            IntervalAction::Maintain => "MAINTAIN",
            IntervalAction::Shorten => "SHORTEN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EXTEND" => Some(IntervalAction::Extend),
            "MAINTAIN" => Some(IntervalAction::Maintain),
            "SHORTEN" => Some(IntervalAction::Shorten),
            _ => None,
        }
    }
}

impl fmt::Display for IntervalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 间隔调度阶段 (Scheduler Phase)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerPhase {
    Loading,
    Maintenance,
}

// ==========================================
// 方案类型 (Protocol Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    TreatAndExtend, // 按需延长
    FixedInterval,  // 固定间隔
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolType::TreatAndExtend => write!(f, "treat_and_extend"),
            ProtocolType::FixedInterval => write!(f, "fixed_interval"),
        }
    }
}
