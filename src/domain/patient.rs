// ==========================================
// AMD 方案模拟引擎 - 患者领域模型
// ==========================================
// 生命周期: 人群调度时创建(抽取基线视力) → 仅由访视处理修改 → 到达模拟终点时结束
// ==========================================

use crate::domain::types::{
    DiscontinuationType, DiseaseState, ResponderClass, SchedulerPhase, TreatmentStatus,
};
use crate::domain::visit::Visit;
use serde::{Deserialize, Serialize};

// ==========================================
// SchedulerState - 间隔调度状态
// ==========================================
// 不变量: min_interval <= interval <= max_interval,写入统一经由 IntervalScheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub phase: SchedulerPhase,
    pub remaining_loading_doses: u32,
    pub interval: u32,           // 当前间隔(天)
    pub consecutive_stable: u32, // 连续稳定访视计数
}

// ==========================================
// Patient - 模拟患者
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: usize,                                 // 人群内序号
    pub disease_state: DiseaseState,                       // 当前疾病状态
    pub vision: f64,                                       // 当前视力 (ETDRS)
    pub baseline_vision: f64,                              // 基线视力
    pub injections: u32,                                   // 累计注射次数
    pub responder_class: ResponderClass,                   // 应答分型(入组后固定)
    pub treatment_status: TreatmentStatus,                 // 治疗状态
    pub discontinuation_type: Option<DiscontinuationType>, // 停药类型
    pub next_monitoring_day: Option<u32>,                  // 下次监测访视
    pub schedule: SchedulerState,                          // 间隔调度状态
    pub enrollment_day: u32,                               // 入组日
    pub last_visit_day: Option<u32>,                       // 最近访视日
    pub retreatments: u32,                                 // 复发再治疗次数
}

impl Patient {
    /// 距入组天数
    pub fn days_since_enrollment(&self, day: u32) -> u32 {
        day.saturating_sub(self.enrollment_day)
    }

    pub fn is_terminal(&self) -> bool {
        self.treatment_status == TreatmentStatus::Discontinued
    }
}

// ==========================================
// PatientTrajectory - 单患者轨迹输出
// ==========================================
// 供下游统计(视力曲线/注射次数/停药类型计数)使用,本引擎不做汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientTrajectory {
    pub patient_id: usize,
    pub responder_class: ResponderClass,
    pub baseline_vision: f64,
    pub final_status: TreatmentStatus,
    pub final_discontinuation_type: Option<DiscontinuationType>,
    pub total_injections: u32,
    pub retreatments: u32,
    pub visits: Vec<Visit>,
}

impl PatientTrajectory {
    /// 最终视力（无访视时为基线视力）
    pub fn final_vision(&self) -> f64 {
        self.visits
            .last()
            .map(|v| v.vision_after)
            .unwrap_or(self.baseline_vision)
    }

    /// 本轨迹中的所有停药事件
    pub fn discontinuations(&self) -> Vec<(u32, DiscontinuationType)> {
        self.visits
            .iter()
            .filter_map(|v| v.discontinuation.map(|t| (v.day, t)))
            .collect()
    }
}
