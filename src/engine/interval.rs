// ==========================================
// AMD 方案模拟引擎 - 间隔调度器 (按需延长状态机)
// ==========================================
// 状态: LOADING(固定次数/固定间隔) → MAINTENANCE(按活动度调整)
// 规则:
// - 稳定: 计数 +1,达到阈值后延长 extension_step,仅当间隔实际变化时清零计数
// - 活动: 计数清零,缩短 shortening_step
// - fixed_interval 方案: 维持期间隔不变,计数照常维护
// 红线: 每次写入间隔都夹到 [min_interval, max_interval]
// ==========================================

use crate::config::protocol_spec::{IntervalRules, LoadingPhase, ProtocolSpec};
use crate::domain::patient::SchedulerState;
use crate::domain::types::{DiseaseActivity, IntervalAction, ProtocolType, SchedulerPhase};
use crate::domain::visit::IntervalDecision;

// ==========================================
// IntervalScheduler
// ==========================================
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    rules: IntervalRules,
    loading: LoadingPhase,
    protocol_type: ProtocolType,
}

impl IntervalScheduler {
    pub fn new(protocol: &ProtocolSpec) -> Self {
        Self {
            rules: *protocol.interval(),
            loading: *protocol.loading(),
            protocol_type: protocol.protocol_type(),
        }
    }

    pub fn rules(&self) -> &IntervalRules {
        &self.rules
    }

    /// 入组(或再治疗)时的调度状态
    pub fn initial_state(&self) -> SchedulerState {
        SchedulerState {
            phase: SchedulerPhase::Loading,
            remaining_loading_doses: self.loading.doses,
            interval: self.rules.clamp(i64::from(self.loading.interval)),
            consecutive_stable: 0,
        }
    }

    /// 复发再治疗: 回到负荷期起点(不是停药时的维持期间隔),清空稳定计数
    pub fn reset_for_retreatment(&self, state: &mut SchedulerState) {
        *state = self.initial_state();
    }

    fn write_interval(&self, state: &mut SchedulerState, candidate: i64) {
        state.interval = self.rules.clamp(candidate);
    }

    /// 处理一次治疗访视后的间隔决策
    ///
    /// # 参数
    /// - state: 患者调度状态（就地更新）
    /// - activity: 本次访视评估结果
    ///
    /// # 返回
    /// - IntervalDecision: 调整动作 + 新间隔（即到下次访视的天数）
    pub fn advance(&self, state: &mut SchedulerState, activity: DiseaseActivity) -> IntervalDecision {
        match state.phase {
            SchedulerPhase::Loading => self.advance_loading(state),
            SchedulerPhase::Maintenance => self.advance_maintenance(state, activity),
        }
    }

    fn advance_loading(&self, state: &mut SchedulerState) -> IntervalDecision {
        state.remaining_loading_doses = state.remaining_loading_doses.saturating_sub(1);
        state.consecutive_stable = 0;

        if state.remaining_loading_doses == 0 {
            state.phase = SchedulerPhase::Maintenance;
            self.write_interval(state, i64::from(self.rules.initial_maintenance_interval));
        } else {
            self.write_interval(state, i64::from(self.loading.interval));
        }

        IntervalDecision {
            action: IntervalAction::Maintain,
            new_interval: state.interval,
        }
    }

    fn advance_maintenance(&self, state: &mut SchedulerState, activity: DiseaseActivity) -> IntervalDecision {
        let previous = state.interval;

        let action = match activity {
            DiseaseActivity::Stable => {
                state.consecutive_stable = state.consecutive_stable.saturating_add(1);
                if self.protocol_type == ProtocolType::TreatAndExtend
                    && state.consecutive_stable >= self.rules.required_stable_visits
                {
                    self.write_interval(
                        state,
                        i64::from(previous) + i64::from(self.rules.extension_step),
                    );
                    if state.interval > previous {
                        state.consecutive_stable = 0;
                        IntervalAction::Extend
                    } else {
                        // 已在上限: 计数保留
                        IntervalAction::Maintain
                    }
                } else {
                    IntervalAction::Maintain
                }
            }
            DiseaseActivity::Active => {
                state.consecutive_stable = 0;
                if self.protocol_type == ProtocolType::TreatAndExtend {
                    self.write_interval(
                        state,
                        i64::from(previous) - i64::from(self.rules.shortening_step),
                    );
                }
                if state.interval < previous {
                    IntervalAction::Shorten
                } else {
                    IntervalAction::Maintain
                }
            }
        };

        IntervalDecision {
            action,
            new_interval: state.interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::{protocol_from_value, sample_protocol, sample_protocol_json};
    use serde_json::json;

    fn scheduler_with(interval: serde_json::Value) -> IntervalScheduler {
        let mut value = sample_protocol_json();
        value["interval"] = interval;
        IntervalScheduler::new(&protocol_from_value(value))
    }

    fn maintenance_state(interval: u32) -> SchedulerState {
        SchedulerState {
            phase: SchedulerPhase::Maintenance,
            remaining_loading_doses: 0,
            interval,
            consecutive_stable: 0,
        }
    }

    #[test]
    fn test_loading_phase_then_maintenance() {
        let scheduler = IntervalScheduler::new(&sample_protocol());
        let mut state = scheduler.initial_state();
        assert_eq!(state.interval, 28);
        assert_eq!(state.remaining_loading_doses, 3);

        // 负荷期与活动度无关
        let d1 = scheduler.advance(&mut state, DiseaseActivity::Active);
        assert_eq!(d1.new_interval, 28);
        assert_eq!(state.phase, SchedulerPhase::Loading);

        let d2 = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!(d2.new_interval, 28);

        let d3 = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!(state.phase, SchedulerPhase::Maintenance);
        assert_eq!(d3.new_interval, 56);
        assert_eq!(state.consecutive_stable, 0);
    }

    #[test]
    fn test_extension_clamped_at_max() {
        let scheduler = scheduler_with(json!({
            "min_interval": 28,
            "max_interval": 112,
            "initial_maintenance_interval": 56,
            "extension_step": 28,
            "shortening_step": 14,
            "required_stable_visits": 1
        }));
        let mut state = maintenance_state(56);

        let d = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Extend, 84));
        let d = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Extend, 112));
        let d = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Maintain, 112));
        let d = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!(d.new_interval, 112);
    }

    #[test]
    fn test_counter_not_reset_at_ceiling() {
        let scheduler = scheduler_with(json!({
            "min_interval": 28,
            "max_interval": 112,
            "initial_maintenance_interval": 56,
            "extension_step": 28,
            "shortening_step": 14,
            "required_stable_visits": 2
        }));
        let mut state = maintenance_state(112);

        scheduler.advance(&mut state, DiseaseActivity::Stable);
        scheduler.advance(&mut state, DiseaseActivity::Stable);
        scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!(state.consecutive_stable, 3);
        assert_eq!(state.interval, 112);
    }

    #[test]
    fn test_required_stable_visits_threshold() {
        let scheduler = scheduler_with(json!({
            "min_interval": 28,
            "max_interval": 112,
            "initial_maintenance_interval": 56,
            "extension_step": 28,
            "shortening_step": 14,
            "required_stable_visits": 2
        }));
        let mut state = maintenance_state(56);

        let d = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Maintain, 56));
        let d = scheduler.advance(&mut state, DiseaseActivity::Stable);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Extend, 84));
        assert_eq!(state.consecutive_stable, 0);
    }

    #[test]
    fn test_shortening_clamped_at_min() {
        let scheduler = IntervalScheduler::new(&sample_protocol());
        let mut state = maintenance_state(42);
        state.consecutive_stable = 5;

        let d = scheduler.advance(&mut state, DiseaseActivity::Active);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Shorten, 28));
        assert_eq!(state.consecutive_stable, 0);

        let d = scheduler.advance(&mut state, DiseaseActivity::Active);
        assert_eq!((d.action, d.new_interval), (IntervalAction::Maintain, 28));
    }

    #[test]
    fn test_practical_max_is_respected() {
        let scheduler = scheduler_with(json!({
            "min_interval": 28,
            "max_interval": 112,
            "practical_max_interval": 84,
            "initial_maintenance_interval": 56,
            "extension_step": 28,
            "shortening_step": 14,
            "required_stable_visits": 1
        }));
        let mut state = maintenance_state(56);
        for _ in 0..5 {
            scheduler.advance(&mut state, DiseaseActivity::Stable);
            assert!(state.interval <= 84);
        }
        assert_eq!(state.interval, 84);
    }

    #[test]
    fn test_fixed_interval_never_adjusts() {
        let mut value = sample_protocol_json();
        value["protocol_type"] = json!("fixed_interval");
        let scheduler = IntervalScheduler::new(&protocol_from_value(value));
        let mut state = maintenance_state(56);

        for activity in [DiseaseActivity::Stable, DiseaseActivity::Active, DiseaseActivity::Stable] {
            let d = scheduler.advance(&mut state, activity);
            assert_eq!((d.action, d.new_interval), (IntervalAction::Maintain, 56));
        }
        assert_eq!(state.consecutive_stable, 1);
    }

    #[test]
    fn test_reset_for_retreatment() {
        let scheduler = IntervalScheduler::new(&sample_protocol());
        let mut state = maintenance_state(112);
        state.consecutive_stable = 2;

        scheduler.reset_for_retreatment(&mut state);
        assert_eq!(state, scheduler.initial_state());
        assert_eq!(state.interval, 28);
        assert_eq!(state.phase, SchedulerPhase::Loading);
    }
}
