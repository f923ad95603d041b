// ==========================================
// AMD 方案模拟引擎 - 停药管理器
// ==========================================
// 状态机: ACTIVE → MONITORING → {RETREATMENT(回到 ACTIVE) | DISCONTINUED}
// 判据(每次 ACTIVE 访视独立评估,各自伯努利试验):
// - 视力差:     vision < threshold            → INEFFECTIVE
// - 注射负担:   injections >= threshold        → ADVERSE
// - 疗程时长:   days_since_enrollment >= threshold → PLANNED
// - 随机:       每次访视                       → ACCESS
// 多个判据同时触发时按优先级取记录类型
// 红线: 规则结构在构造时校验一次,评估期间不再检查
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::protocol_document::DiscontinuationRulesDocument;
use crate::config::protocol_spec::{DiscontinuationRules, ProtocolSpec};
use crate::config::validator::ProtocolValidator;
use crate::domain::types::{DiscontinuationCriterion, DiscontinuationType, TreatmentStatus};
use rand::Rng;
use tracing::trace;

// ==========================================
// 评估输入 / 输出
// ==========================================

/// 停药评估上下文（访视前状态）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscontinuationContext {
    pub vision: f64,
    pub injections: u32,
    pub days_since_enrollment: u32,
}

/// 停药决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscontinuationDecision {
    /// 优先级最高的已触发判据
    pub criterion: DiscontinuationCriterion,
    pub discontinuation_type: DiscontinuationType,
    /// 本次全部触发的判据（按优先级排序）
    pub fired: Vec<DiscontinuationCriterion>,
    /// true → 进入监测
    pub monitored: bool,
}

impl DiscontinuationDecision {
    /// 停药后的治疗状态
    pub fn status_after(&self) -> TreatmentStatus {
        if self.monitored {
            TreatmentStatus::Monitoring
        } else {
            TreatmentStatus::Discontinued
        }
    }
}

// ==========================================
// DiscontinuationManager
// ==========================================
#[derive(Debug, Clone)]
pub struct DiscontinuationManager {
    rules: DiscontinuationRules,
}

impl DiscontinuationManager {
    pub fn new(protocol: &ProtocolSpec) -> Self {
        Self {
            rules: *protocol.discontinuation(),
        }
    }

    /// 从原始规则文档构造（缺 enabled 等结构错误在此处拒绝）
    pub fn from_document(doc: &DiscontinuationRulesDocument) -> ConfigResult<Self> {
        Ok(Self {
            rules: ProtocolValidator::validate_discontinuation(doc)?,
        })
    }

    pub fn rules(&self) -> &DiscontinuationRules {
        &self.rules
    }

    pub fn is_enabled(&self) -> bool {
        self.rules.enabled
    }

    /// 判据是否满足前置条件（满足后才做伯努利试验）
    fn eligible(&self, criterion: DiscontinuationCriterion, ctx: &DiscontinuationContext) -> bool {
        match criterion {
            DiscontinuationCriterion::PoorVision => ctx.vision < self.rules.poor_vision.threshold,
            DiscontinuationCriterion::HighInjectionBurden => {
                ctx.injections >= self.rules.high_injection_burden.threshold
            }
            DiscontinuationCriterion::LongDuration => {
                ctx.days_since_enrollment >= self.rules.long_duration.threshold
            }
            DiscontinuationCriterion::Random => true,
        }
    }

    fn probability(&self, criterion: DiscontinuationCriterion) -> f64 {
        match criterion {
            DiscontinuationCriterion::PoorVision => self.rules.poor_vision.probability,
            DiscontinuationCriterion::HighInjectionBurden => {
                self.rules.high_injection_burden.probability
            }
            DiscontinuationCriterion::LongDuration => self.rules.long_duration.probability,
            DiscontinuationCriterion::Random => self.rules.random.probability,
        }
    }

    fn monitored(&self, criterion: DiscontinuationCriterion) -> bool {
        match criterion {
            DiscontinuationCriterion::PoorVision => self.rules.poor_vision.monitored,
            DiscontinuationCriterion::HighInjectionBurden => {
                self.rules.high_injection_burden.monitored
            }
            DiscontinuationCriterion::LongDuration => self.rules.long_duration.monitored,
            DiscontinuationCriterion::Random => self.rules.random.monitored,
        }
    }

    /// 评估本次 ACTIVE 访视是否停药
    ///
    /// # 返回
    /// - None: 规则未启用或无判据触发
    /// - Some(decision): 按优先级取胜出判据
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        ctx: &DiscontinuationContext,
        rng: &mut R,
    ) -> Option<DiscontinuationDecision> {
        if !self.rules.enabled {
            return None;
        }

        let fired: Vec<DiscontinuationCriterion> = DiscontinuationCriterion::PRECEDENCE
            .into_iter()
            .filter(|c| self.eligible(*c, ctx))
            .filter(|c| rng.gen_bool(self.probability(*c)))
            .collect();

        let criterion = fired.first().copied()?;
        trace!(
            criterion = ?criterion,
            fired = fired.len(),
            vision = ctx.vision,
            injections = ctx.injections,
            "停药判据触发"
        );

        Some(DiscontinuationDecision {
            criterion,
            discontinuation_type: criterion.discontinuation_type(),
            monitored: self.monitored(criterion),
            fired,
        })
    }

    /// 监测访视间隔（天）
    pub fn monitoring_cadence(&self) -> u32 {
        self.rules.monitoring.cadence_days
    }

    /// 下一次监测访视日
    pub fn next_monitoring_day(&self, day: u32) -> u32 {
        day.saturating_add(self.rules.monitoring.cadence_days)
    }

    /// 监测访视复发抽样
    pub fn check_recurrence<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_bool(self.rules.monitoring.recurrence_probability)
    }
}
