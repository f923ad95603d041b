// ==========================================
// AMD 方案模拟引擎 - 已校验方案（只读）
// ==========================================
// 职责: 引擎唯一可见的方案参数包
// 红线: 只能经由 ProtocolValidator 构造;运行期间以 Arc 共享,不提供任何可变接口
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::protocol_document::ProtocolDocument;
use crate::config::validator::ProtocolValidator;
use crate::domain::types::{DiseaseState, ProtocolType, ResponderClass};
use serde::Serialize;
use std::path::Path;

/// 转移行和容差
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

// ==========================================
// 间隔规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntervalRules {
    pub min_interval: u32,
    /// 生效上限 = min(max_interval, practical_max_interval)
    pub max_interval: u32,
    pub nominal_max_interval: u32,
    pub practical_max_interval: Option<u32>,
    pub initial_maintenance_interval: u32,
    pub extension_step: u32,
    pub shortening_step: u32,
    pub required_stable_visits: u32,
}

impl IntervalRules {
    /// 将任意候选间隔夹到 [min_interval, max_interval]
    pub fn clamp(&self, candidate: i64) -> u32 {
        let clamped = candidate.clamp(i64::from(self.min_interval), i64::from(self.max_interval));
        // clamp 后必在 u32 范围内
        u32::try_from(clamped).unwrap_or(self.max_interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadingPhase {
    pub doses: u32,
    pub interval: u32,
}

// ==========================================
// 疾病转移矩阵
// ==========================================
// 行列下标均为 DiseaseState::index()
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionMatrix {
    pub(crate) rows: [[f64; 4]; 4],
}

impl TransitionMatrix {
    pub fn row(&self, from: DiseaseState) -> &[f64; 4] {
        &self.rows[from.index()]
    }

    pub fn probability(&self, from: DiseaseState, to: DiseaseState) -> f64 {
        self.rows[from.index()][to.index()]
    }
}

/// 治疗效应乘子表（未列出的目标状态乘子为 1.0）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreatmentEffect {
    pub(crate) multipliers: [[f64; 4]; 4],
}

impl TreatmentEffect {
    pub fn multiplier(&self, from: DiseaseState, to: DiseaseState) -> f64 {
        self.multipliers[from.index()][to.index()]
    }

    /// 对基础行应用乘子并重新归一化
    ///
    /// # 返回
    /// - Some(row): 归一化后的行
    /// - None: 调整后行和为 0（配置错误,由 validator 拦截）
    pub fn apply(&self, from: DiseaseState, base: &[f64; 4]) -> Option<[f64; 4]> {
        let factors = &self.multipliers[from.index()];
        let mut adjusted = [0.0; 4];
        for i in 0..4 {
            adjusted[i] = base[i] * factors[i];
        }

        let sum: f64 = adjusted.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return None;
        }
        for p in adjusted.iter_mut() {
            *p /= sum;
        }
        Some(adjusted)
    }
}

// ==========================================
// 视力模型参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalParams {
    pub mean: f64,
    pub std: f64,
}

/// (疾病状态 × 是否治疗) → 正态分布参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisionChangeTable {
    /// [state][0=未治疗, 1=治疗]
    pub(crate) entries: [[NormalParams; 2]; 4],
}

impl VisionChangeTable {
    pub fn params(&self, state: DiseaseState, treated: bool) -> NormalParams {
        self.entries[state.index()][usize::from(treated)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaselineVision {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponderParams {
    pub proportion: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponderTable {
    pub good: ResponderParams,
    pub average: ResponderParams,
    pub poor: ResponderParams,
}

impl ResponderTable {
    pub fn params(&self, class: ResponderClass) -> ResponderParams {
        match class {
            ResponderClass::Good => self.good,
            ResponderClass::Average => self.average,
            ResponderClass::Poor => self.poor,
        }
    }
}

// ==========================================
// 停药规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdCriterion<T> {
    pub threshold: T,
    pub probability: f64,
    /// true → 进入监测; false → 直接终止随访
    pub monitored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RandomCriterion {
    pub probability: f64,
    pub monitored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitoringRules {
    pub cadence_days: u32,
    pub recurrence_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiscontinuationRules {
    pub enabled: bool,
    pub poor_vision: ThresholdCriterion<f64>,
    pub high_injection_burden: ThresholdCriterion<u32>,
    pub long_duration: ThresholdCriterion<u32>,
    pub random: RandomCriterion,
    pub monitoring: MonitoringRules,
}

// ==========================================
// ProtocolSpec - 方案参数包
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolSpec {
    pub(crate) name: String,
    pub(crate) protocol_type: ProtocolType,
    pub(crate) interval: IntervalRules,
    pub(crate) loading: LoadingPhase,
    pub(crate) transitions: TransitionMatrix,
    pub(crate) treatment_effect: TreatmentEffect,
    pub(crate) vision_change: VisionChangeTable,
    pub(crate) baseline_vision: BaselineVision,
    pub(crate) responders: ResponderTable,
    pub(crate) discontinuation: DiscontinuationRules,
}

impl ProtocolSpec {
    /// 校验方案文档并冻结
    pub fn from_document(doc: &ProtocolDocument) -> ConfigResult<Self> {
        ProtocolValidator::validate(doc)
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        Self::from_document(&ProtocolDocument::from_json_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_document(&ProtocolDocument::from_path(path)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol_type(&self) -> ProtocolType {
        self.protocol_type
    }

    pub fn interval(&self) -> &IntervalRules {
        &self.interval
    }

    pub fn loading(&self) -> &LoadingPhase {
        &self.loading
    }

    pub fn transitions(&self) -> &TransitionMatrix {
        &self.transitions
    }

    pub fn treatment_effect(&self) -> &TreatmentEffect {
        &self.treatment_effect
    }

    pub fn vision_change(&self) -> &VisionChangeTable {
        &self.vision_change
    }

    pub fn baseline_vision(&self) -> &BaselineVision {
        &self.baseline_vision
    }

    pub fn responders(&self) -> &ResponderTable {
        &self.responders
    }

    pub fn discontinuation(&self) -> &DiscontinuationRules {
        &self.discontinuation
    }

    /// 方案快照（JSON）
    ///
    /// # 用途
    /// - 随模拟结果一起落库,保证结果可追溯到具体参数
    pub fn snapshot_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
