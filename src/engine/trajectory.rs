// ==========================================
// AMD 方案模拟引擎 - 患者轨迹驱动
// ==========================================
// 每次访视流程:
// 1. ACTIVE: 停药判据 → (未停药) 注射 + 疾病转移(治疗) + 视力变化(治疗) → 间隔决策
// 2. MONITORING: 疾病转移(未治疗) + 视力变化(未治疗) → 复发抽样 → 再治疗或继续监测
// 3. DISCONTINUED: 不再产生访视
// 红线: 单患者访视严格串行;随机数只来自本患者的随机流
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::protocol_spec::ProtocolSpec;
use crate::domain::patient::{Patient, PatientTrajectory};
use crate::domain::types::{DiseaseState, SchedulerPhase, TreatmentStatus, VisitType};
use crate::domain::visit::{Visit, VisitActions};
use crate::engine::discontinuation::{DiscontinuationContext, DiscontinuationManager};
use crate::engine::disease::DiseaseTransitionModel;
use crate::engine::interval::IntervalScheduler;
use crate::engine::rng::patient_rng;
use crate::engine::vision::VisionOutcomeModel;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, trace};

/// 单次访视处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct VisitOutcome {
    pub visit: Visit,
    /// 下一次访视日; None 表示随访结束
    pub next_visit_day: Option<u32>,
}

// ==========================================
// PatientTrajectoryDriver
// ==========================================
#[derive(Debug, Clone)]
pub struct PatientTrajectoryDriver {
    protocol: Arc<ProtocolSpec>,
    disease: DiseaseTransitionModel,
    vision: VisionOutcomeModel,
    scheduler: IntervalScheduler,
    discontinuation: DiscontinuationManager,
}

impl PatientTrajectoryDriver {
    pub fn new(protocol: Arc<ProtocolSpec>) -> ConfigResult<Self> {
        Ok(Self {
            disease: DiseaseTransitionModel::new(&protocol),
            vision: VisionOutcomeModel::new(&protocol)?,
            scheduler: IntervalScheduler::new(&protocol),
            discontinuation: DiscontinuationManager::new(&protocol),
            protocol,
        })
    }

    pub fn protocol(&self) -> &ProtocolSpec {
        &self.protocol
    }

    pub fn scheduler(&self) -> &IntervalScheduler {
        &self.scheduler
    }

    /// 入组: 抽取基线视力与应答分型（顺序固定）
    pub fn enroll<R: Rng + ?Sized>(&self, patient_id: usize, rng: &mut R) -> Patient {
        let baseline_vision = self.vision.sample_baseline(rng);
        let responder_class = self.vision.sample_responder(rng);

        Patient {
            patient_id,
            disease_state: DiseaseState::Naive,
            vision: baseline_vision,
            baseline_vision,
            injections: 0,
            responder_class,
            treatment_status: TreatmentStatus::Active,
            discontinuation_type: None,
            next_monitoring_day: None,
            schedule: self.scheduler.initial_state(),
            enrollment_day: 0,
            last_visit_day: None,
            retreatments: 0,
        }
    }

    /// 处理一次访视
    ///
    /// # 参数
    /// - patient: 患者状态（就地更新）
    /// - day: 访视日（距入组天数）
    ///
    /// # 返回
    /// - None: 患者已终止随访,不产生访视
    /// - Some(outcome): 访视记录 + 下次访视日
    pub fn process_visit<R: Rng + ?Sized>(
        &self,
        patient: &mut Patient,
        day: u32,
        rng: &mut R,
    ) -> Option<VisitOutcome> {
        let outcome = match patient.treatment_status {
            TreatmentStatus::Active => self.process_active_visit(patient, day, rng),
            TreatmentStatus::Monitoring => self.process_monitoring_visit(patient, day, rng),
            TreatmentStatus::Discontinued => return None,
        };
        patient.last_visit_day = Some(day);
        Some(outcome)
    }

    fn active_visit_type(patient: &Patient) -> VisitType {
        match patient.schedule.phase {
            SchedulerPhase::Loading if patient.retreatments > 0 => VisitType::Retreatment,
            SchedulerPhase::Loading => VisitType::Loading,
            SchedulerPhase::Maintenance => VisitType::Maintenance,
        }
    }

    fn process_active_visit<R: Rng + ?Sized>(
        &self,
        patient: &mut Patient,
        day: u32,
        rng: &mut R,
    ) -> VisitOutcome {
        let visit_type = Self::active_visit_type(patient);
        let disease_before = patient.disease_state;
        let vision_before = patient.vision;

        // 1. 停药判据（访视前状态）
        let ctx = DiscontinuationContext {
            vision: vision_before,
            injections: patient.injections,
            days_since_enrollment: patient.days_since_enrollment(day),
        };
        if let Some(decision) = self.discontinuation.evaluate(&ctx, rng) {
            // 停药访视: 不注射,按未治疗演化,无间隔决策
            patient.disease_state = self.disease.sample(disease_before, false, rng);
            patient.vision = self.vision.next_vision(
                vision_before,
                patient.disease_state,
                false,
                patient.responder_class,
                rng,
            );
            patient.treatment_status = decision.status_after();
            patient.discontinuation_type = Some(decision.discontinuation_type);

            let next_visit_day = if decision.monitored {
                let next = self.discontinuation.next_monitoring_day(day);
                patient.next_monitoring_day = Some(next);
                Some(next)
            } else {
                patient.next_monitoring_day = None;
                None
            };

            debug!(
                patient_id = patient.patient_id,
                day,
                discontinuation_type = %decision.discontinuation_type,
                monitored = decision.monitored,
                "患者停药"
            );

            return VisitOutcome {
                visit: Visit {
                    day,
                    visit_type,
                    actions: VisitActions {
                        assessment: true,
                        injection: false,
                    },
                    disease_before,
                    disease_after: patient.disease_state,
                    vision_before,
                    vision_after: patient.vision,
                    interval_decision: None,
                    discontinuation: Some(decision.discontinuation_type),
                    recurrence_detected: None,
                },
                next_visit_day,
            };
        }

        // 2. 注射 + 治疗下演化
        patient.injections += 1;
        patient.disease_state = self.disease.sample(disease_before, true, rng);
        patient.vision = self.vision.next_vision(
            vision_before,
            patient.disease_state,
            true,
            patient.responder_class,
            rng,
        );

        // 3. 间隔决策
        let decision = self
            .scheduler
            .advance(&mut patient.schedule, patient.disease_state.activity());

        trace!(
            patient_id = patient.patient_id,
            day,
            state = %patient.disease_state,
            interval = decision.new_interval,
            action = decision.action.as_str(),
            "治疗访视"
        );

        VisitOutcome {
            visit: Visit {
                day,
                visit_type,
                actions: VisitActions {
                    assessment: true,
                    injection: true,
                },
                disease_before,
                disease_after: patient.disease_state,
                vision_before,
                vision_after: patient.vision,
                interval_decision: Some(decision),
                discontinuation: None,
                recurrence_detected: None,
            },
            next_visit_day: Some(day.saturating_add(decision.new_interval)),
        }
    }

    fn process_monitoring_visit<R: Rng + ?Sized>(
        &self,
        patient: &mut Patient,
        day: u32,
        rng: &mut R,
    ) -> VisitOutcome {
        let disease_before = patient.disease_state;
        let vision_before = patient.vision;

        patient.disease_state = self.disease.sample(disease_before, false, rng);
        patient.vision = self.vision.next_vision(
            vision_before,
            patient.disease_state,
            false,
            patient.responder_class,
            rng,
        );

        let recurrence = self.discontinuation.check_recurrence(rng);
        let next_visit_day = if recurrence {
            // 再治疗: 回到负荷期起点
            patient.treatment_status = TreatmentStatus::Active;
            patient.discontinuation_type = None;
            patient.next_monitoring_day = None;
            patient.retreatments += 1;
            self.scheduler.reset_for_retreatment(&mut patient.schedule);

            debug!(
                patient_id = patient.patient_id,
                day,
                retreatments = patient.retreatments,
                "监测期复发,重新治疗"
            );
            day.saturating_add(patient.schedule.interval)
        } else {
            let next = self.discontinuation.next_monitoring_day(day);
            patient.next_monitoring_day = Some(next);
            next
        };

        VisitOutcome {
            visit: Visit {
                day,
                visit_type: VisitType::Monitoring,
                actions: VisitActions {
                    assessment: true,
                    injection: false,
                },
                disease_before,
                disease_after: patient.disease_state,
                vision_before,
                vision_after: patient.vision,
                interval_decision: None,
                discontinuation: None,
                recurrence_detected: Some(recurrence),
            },
            next_visit_day: Some(next_visit_day),
        }
    }

    /// 模拟单个患者（使用 (seed, patient_id) 派生的随机流）
    pub fn simulate(&self, patient_id: usize, horizon_days: u32, seed: u64) -> PatientTrajectory {
        let mut rng = patient_rng(seed, patient_id);
        self.simulate_with_rng(patient_id, horizon_days, &mut rng)
    }

    /// 模拟单个患者: 入组日(第 0 天)首诊,访视日 < horizon_days 时继续
    pub fn simulate_with_rng<R: Rng + ?Sized>(
        &self,
        patient_id: usize,
        horizon_days: u32,
        rng: &mut R,
    ) -> PatientTrajectory {
        let mut patient = self.enroll(patient_id, rng);
        let mut visits = Vec::new();
        let mut day = patient.enrollment_day;

        while day < horizon_days {
            let Some(outcome) = self.process_visit(&mut patient, day, rng) else {
                break;
            };
            visits.push(outcome.visit);
            match outcome.next_visit_day {
                Some(next) => day = next,
                None => break,
            }
        }

        debug!(
            patient_id,
            visits = visits.len(),
            injections = patient.injections,
            status = %patient.treatment_status,
            "患者轨迹完成"
        );

        PatientTrajectory {
            patient_id,
            responder_class: patient.responder_class,
            baseline_vision: patient.baseline_vision,
            final_status: patient.treatment_status,
            final_discontinuation_type: patient.discontinuation_type,
            total_injections: patient.injections,
            retreatments: patient.retreatments,
            visits,
        }
    }
}
