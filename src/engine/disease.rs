// ==========================================
// AMD 方案模拟引擎 - 疾病状态转移模型
// ==========================================
// 职责: 给定当前状态与是否治疗,抽样下一疾病状态
// 规则: 治疗时对基础行逐项乘以治疗效应乘子并重新归一化;
//       按 NAIVE, STABLE, ACTIVE, HIGHLY_ACTIVE 的固定顺序遍历累计分布
// 红线: "首诊后不再出现 NAIVE" 由矩阵 NAIVE 列恒为 0 保证,代码不做特判
// ==========================================

use crate::config::protocol_spec::ProtocolSpec;
use crate::domain::types::DiseaseState;
use rand::Rng;

// ==========================================
// DiseaseTransitionModel
// ==========================================
#[derive(Debug, Clone)]
pub struct DiseaseTransitionModel {
    untreated: [[f64; 4]; 4],
    treated: [[f64; 4]; 4],
}

impl DiseaseTransitionModel {
    /// 根据已校验方案预计算未治疗/治疗两套转移行
    pub fn new(protocol: &ProtocolSpec) -> Self {
        let matrix = protocol.transitions();
        let effect = protocol.treatment_effect();

        let mut untreated = [[0.0; 4]; 4];
        let mut treated = [[0.0; 4]; 4];
        for from in DiseaseState::ALL {
            let base = *matrix.row(from);
            untreated[from.index()] = base;
            // validator 已保证调整后行和 > 0
            treated[from.index()] = effect.apply(from, &base).unwrap_or(base);
        }

        Self { untreated, treated }
    }

    /// 当前状态对应的转移行
    pub fn row(&self, from: DiseaseState, treated: bool) -> &[f64; 4] {
        if treated {
            &self.treated[from.index()]
        } else {
            &self.untreated[from.index()]
        }
    }

    /// 用给定的 [0,1) 均匀抽样值确定下一状态
    ///
    /// 浮点舍入导致遍历结束仍未命中时,落到最后一个概率非零的状态
    pub fn next_state_from_draw(&self, from: DiseaseState, treated: bool, draw: f64) -> DiseaseState {
        let row = self.row(from, treated);
        let mut cumulative = 0.0;
        let mut fallback = from;

        for to in DiseaseState::ALL {
            let p = row[to.index()];
            if p <= 0.0 {
                continue;
            }
            cumulative += p;
            fallback = to;
            if draw < cumulative {
                return to;
            }
        }

        fallback
    }

    /// 抽样下一疾病状态
    pub fn sample<R: Rng + ?Sized>(&self, from: DiseaseState, treated: bool, rng: &mut R) -> DiseaseState {
        let draw: f64 = rng.gen();
        self.next_state_from_draw(from, treated, draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::protocol_spec::ROW_SUM_TOLERANCE;
    use crate::config::test_fixtures::sample_protocol;
    use crate::engine::rng::patient_rng;

    #[test]
    fn test_adjusted_rows_sum_to_one() {
        let model = DiseaseTransitionModel::new(&sample_protocol());
        for from in DiseaseState::ALL {
            for treated in [false, true] {
                let sum: f64 = model.row(from, treated).iter().sum();
                assert!(
                    (sum - 1.0).abs() < ROW_SUM_TOLERANCE,
                    "row {} treated={} sums to {}",
                    from,
                    treated,
                    sum
                );
            }
        }
    }

    #[test]
    fn test_treatment_shifts_mass_towards_stable() {
        let model = DiseaseTransitionModel::new(&sample_protocol());
        let untreated = model.row(DiseaseState::Active, false)[DiseaseState::Stable.index()];
        let treated = model.row(DiseaseState::Active, true)[DiseaseState::Stable.index()];
        assert!(treated > untreated);
    }

    #[test]
    fn test_cumulative_walk_order() {
        let model = DiseaseTransitionModel::new(&sample_protocol());
        // STABLE 未治疗行: [0, 0.83, 0.12, 0.05]
        assert_eq!(
            model.next_state_from_draw(DiseaseState::Stable, false, 0.0),
            DiseaseState::Stable
        );
        assert_eq!(
            model.next_state_from_draw(DiseaseState::Stable, false, 0.8299),
            DiseaseState::Stable
        );
        assert_eq!(
            model.next_state_from_draw(DiseaseState::Stable, false, 0.83),
            DiseaseState::Active
        );
        assert_eq!(
            model.next_state_from_draw(DiseaseState::Stable, false, 0.96),
            DiseaseState::HighlyActive
        );
    }

    #[test]
    fn test_draw_past_cumulative_falls_back_to_last_nonzero_state() {
        let model = DiseaseTransitionModel::new(&sample_protocol());
        let state = model.next_state_from_draw(DiseaseState::Active, true, 1.0);
        assert_eq!(state, DiseaseState::HighlyActive);
    }

    #[test]
    fn test_never_returns_naive() {
        let model = DiseaseTransitionModel::new(&sample_protocol());
        let mut rng = patient_rng(2024, 0);
        for from in DiseaseState::ALL {
            for treated in [false, true] {
                for _ in 0..500 {
                    assert_ne!(model.sample(from, treated, &mut rng), DiseaseState::Naive);
                }
            }
        }
    }
}
