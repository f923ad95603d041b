// ==========================================
// AMD 方案模拟引擎 - 访视记录
// ==========================================
// 红线: 访视记录只追加,写入患者历史后不可修改
// ==========================================

use crate::domain::types::{DiscontinuationType, DiseaseState, IntervalAction, VisitType};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

// ==========================================
// VisitActions - 访视动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitActions {
    pub assessment: bool, // 是否评估
    pub injection: bool,  // 是否注射
}

// ==========================================
// IntervalDecision - 间隔决策
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalDecision {
    pub action: IntervalAction,
    pub new_interval: u32, // 天
}

// ==========================================
// Visit - 单次访视
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub day: u32,                                         // 距入组天数
    pub visit_type: VisitType,                            // 访视类型
    pub actions: VisitActions,                            // 访视动作
    pub disease_before: DiseaseState,                     // 访视前疾病状态
    pub disease_after: DiseaseState,                      // 访视后疾病状态
    pub vision_before: f64,                               // 访视前视力 (ETDRS)
    pub vision_after: f64,                                // 访视后视力 (ETDRS)
    pub interval_decision: Option<IntervalDecision>,      // 间隔决策(仅治疗访视)
    pub discontinuation: Option<DiscontinuationType>,     // 本次停药类型
    pub recurrence_detected: Option<bool>,                // 复发标记(仅监测访视)
}

impl Visit {
    /// 是否在本次访视注射
    pub fn is_injection(&self) -> bool {
        self.actions.injection
    }

    /// 视力变化（字母数）
    pub fn vision_change(&self) -> f64 {
        self.vision_after - self.vision_before
    }

    /// 换算日历日期
    ///
    /// # 参数
    /// - start_date: 入组日期
    pub fn calendar_date(&self, start_date: NaiveDate) -> NaiveDate {
        start_date + Duration::days(i64::from(self.day))
    }
}
