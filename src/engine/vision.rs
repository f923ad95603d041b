// ==========================================
// AMD 方案模拟引擎 - 视力结局模型
// ==========================================
// 职责: 抽样每次访视的视力变化(ETDRS 字母数)
// 规则: (疾病状态 × 是否治疗) → Normal(mean, std);
//       应答分型乘子只作用于提升方向,不改变增减符号;
//       结果夹到 [baseline_vision.min, baseline_vision.max]
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::protocol_spec::{BaselineVision, ProtocolSpec, ResponderTable};
use crate::domain::types::{DiseaseState, ResponderClass};
use rand::Rng;
use rand_distr::{Distribution, Normal};

// ==========================================
// VisionOutcomeModel
// ==========================================
#[derive(Debug, Clone)]
pub struct VisionOutcomeModel {
    /// [state][0=未治疗, 1=治疗]
    changes: Vec<[Normal<f64>; 2]>,
    baseline: Normal<f64>,
    bounds: BaselineVision,
    responders: ResponderTable,
}

fn normal(mean: f64, std: f64, path: &str) -> ConfigResult<Normal<f64>> {
    Normal::new(mean, std).map_err(|e| ConfigError::invalid(path, e.to_string()))
}

impl VisionOutcomeModel {
    /// 构造视力模型
    ///
    /// 分布参数已由 validator 校验,此处的错误分支只在手工构造非法参数时触发
    pub fn new(protocol: &ProtocolSpec) -> ConfigResult<Self> {
        let table = protocol.vision_change();
        let mut changes = Vec::with_capacity(DiseaseState::ALL.len());
        for state in DiseaseState::ALL {
            let untreated = table.params(state, false);
            let treated = table.params(state, true);
            changes.push([
                normal(
                    untreated.mean,
                    untreated.std,
                    &format!("vision_change.{}.untreated", state),
                )?,
                normal(treated.mean, treated.std, &format!("vision_change.{}.treated", state))?,
            ]);
        }

        let bounds = *protocol.baseline_vision();
        Ok(Self {
            changes,
            baseline: normal(bounds.mean, bounds.std, "baseline_vision")?,
            bounds,
            responders: *protocol.responders(),
        })
    }

    /// 视力上下限
    pub fn bounds(&self) -> (f64, f64) {
        (self.bounds.min, self.bounds.max)
    }

    pub fn clamp(&self, vision: f64) -> f64 {
        vision.clamp(self.bounds.min, self.bounds.max)
    }

    /// 应答分型乘子: 只放大提升,下降不缩放
    pub fn apply_responder(raw_change: f64, multiplier: f64) -> f64 {
        if raw_change > 0.0 {
            raw_change * multiplier
        } else {
            raw_change
        }
    }

    /// 抽样视力变化（未夹取）
    pub fn letter_change<R: Rng + ?Sized>(
        &self,
        state: DiseaseState,
        treated: bool,
        responder: ResponderClass,
        rng: &mut R,
    ) -> f64 {
        let raw = self.changes[state.index()][usize::from(treated)].sample(rng);
        Self::apply_responder(raw, self.responders.params(responder).multiplier)
    }

    /// 计算访视后视力（已夹取）
    pub fn next_vision<R: Rng + ?Sized>(
        &self,
        current: f64,
        state: DiseaseState,
        treated: bool,
        responder: ResponderClass,
        rng: &mut R,
    ) -> f64 {
        self.clamp(current + self.letter_change(state, treated, responder, rng))
    }

    /// 入组基线视力
    pub fn sample_baseline<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.clamp(self.baseline.sample(rng))
    }

    /// 入组时抽样应答分型（遍历顺序 good, average, poor）
    pub fn sample_responder<R: Rng + ?Sized>(&self, rng: &mut R) -> ResponderClass {
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        let mut fallback = ResponderClass::Average;

        for class in ResponderClass::ALL {
            let proportion = self.responders.params(class).proportion;
            if proportion <= 0.0 {
                continue;
            }
            cumulative += proportion;
            fallback = class;
            if draw < cumulative {
                return class;
            }
        }

        fallback
    }
}
