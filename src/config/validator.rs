// ==========================================
// AMD 方案模拟引擎 - 方案校验器
// ==========================================
// 职责: ProtocolDocument → ProtocolSpec 的唯一校验边界
// 红线: 不做任何默认值替换;错误必须带出精确字段路径
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::protocol_document::{
    BaselineVisionDocument, DiscontinuationRulesDocument, IntervalDocument, LoadingDocument,
    NormalDocument, ProtocolDocument, RandomCriterionDocument, ResponderClassesDocument,
    ResponderDocument, StateTable, ThresholdCriterionDocument, VisionChangeDocument,
};
use crate::config::protocol_spec::{
    BaselineVision, DiscontinuationRules, IntervalRules, LoadingPhase, MonitoringRules,
    NormalParams, ProtocolSpec, RandomCriterion, ResponderParams, ResponderTable,
    ThresholdCriterion, TransitionMatrix, TreatmentEffect, VisionChangeTable, ROW_SUM_TOLERANCE,
};
use crate::domain::types::{DiseaseState, ProtocolType};
use std::collections::BTreeMap;
use tracing::debug;

// ==========================================
// 通用校验函数
// ==========================================

fn require<T: Clone>(value: &Option<T>, path: &str) -> ConfigResult<T> {
    value.clone().ok_or_else(|| ConfigError::missing(path))
}

fn require_ref<'a, T>(value: &'a Option<T>, path: &str) -> ConfigResult<&'a T> {
    value.as_ref().ok_or_else(|| ConfigError::missing(path))
}

fn require_finite(value: &Option<f64>, path: &str) -> ConfigResult<f64> {
    let v = require(value, path)?;
    if !v.is_finite() {
        return Err(ConfigError::invalid(path, format!("必须为有限数值, 实际 {}", v)));
    }
    Ok(v)
}

fn require_probability(value: &Option<f64>, path: &str) -> ConfigResult<f64> {
    let p = require_finite(value, path)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(ConfigError::invalid(path, format!("概率必须在 [0, 1], 实际 {}", p)));
    }
    Ok(p)
}

fn require_non_negative(value: &Option<f64>, path: &str) -> ConfigResult<f64> {
    let v = require_finite(value, path)?;
    if v < 0.0 {
        return Err(ConfigError::invalid(path, format!("不能为负数, 实际 {}", v)));
    }
    Ok(v)
}

/// 计数型阈值（注射次数/天数）: 非负整数
fn require_count(value: &Option<f64>, path: &str) -> ConfigResult<u32> {
    let v = require_non_negative(value, path)?;
    if v.fract() != 0.0 || v > f64::from(u32::MAX) {
        return Err(ConfigError::invalid(path, format!("必须为非负整数, 实际 {}", v)));
    }
    Ok(v as u32)
}

/// 将以状态名为键的表按 DiseaseState::index() 排列
///
/// 未知状态名、大小写变体重复均视为配置错误
fn index_states<'a, V>(
    map: &'a BTreeMap<String, V>,
    path: &str,
) -> ConfigResult<[Option<&'a V>; 4]> {
    let mut slots: [Option<&'a V>; 4] = [None, None, None, None];
    for (name, value) in map {
        let state = DiseaseState::parse(name).ok_or_else(|| ConfigError::UnknownState {
            path: path.to_string(),
            name: name.clone(),
        })?;
        if slots[state.index()].is_some() {
            return Err(ConfigError::invalid(
                format!("{}.{}", path, state),
                "状态重复定义",
            ));
        }
        slots[state.index()] = Some(value);
    }
    Ok(slots)
}

// ==========================================
// ProtocolValidator
// ==========================================
pub struct ProtocolValidator;

impl ProtocolValidator {
    /// 校验完整方案文档
    ///
    /// # 返回
    /// - Ok(ProtocolSpec): 全部字段齐备且合法
    /// - Err(ConfigError): 第一个不合法字段（含字段路径）
    pub fn validate(doc: &ProtocolDocument) -> ConfigResult<ProtocolSpec> {
        let name = require(&doc.name, "name")?;
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "方案名称不能为空"));
        }
        let protocol_type = require(&doc.protocol_type, "protocol_type")?;

        let interval = Self::validate_interval(require_ref(&doc.interval, "interval")?, protocol_type)?;
        let loading = Self::validate_loading(require_ref(&doc.loading, "loading")?, &interval)?;
        let transitions =
            Self::validate_transitions(require_ref(&doc.disease_transitions, "disease_transitions")?)?;
        let treatment_effect = Self::validate_treatment_effect(
            require_ref(&doc.treatment_effect, "treatment_effect")?,
            &transitions,
        )?;
        let vision_change =
            Self::validate_vision_change(require_ref(&doc.vision_change, "vision_change")?)?;
        let baseline_vision =
            Self::validate_baseline(require_ref(&doc.baseline_vision, "baseline_vision")?)?;
        let responders =
            Self::validate_responders(require_ref(&doc.responder_classes, "responder_classes")?)?;
        let discontinuation = Self::validate_discontinuation(require_ref(
            &doc.discontinuation_rules,
            "discontinuation_rules",
        )?)?;

        debug!(
            protocol = %name,
            protocol_type = %protocol_type,
            min_interval = interval.min_interval,
            max_interval = interval.max_interval,
            discontinuation_enabled = discontinuation.enabled,
            "方案校验通过"
        );

        Ok(ProtocolSpec {
            name,
            protocol_type,
            interval,
            loading,
            transitions,
            treatment_effect,
            vision_change,
            baseline_vision,
            responders,
            discontinuation,
        })
    }

    // ===== 间隔规则 =====

    fn validate_interval(doc: &IntervalDocument, protocol_type: ProtocolType) -> ConfigResult<IntervalRules> {
        let min_interval = require(&doc.min_interval, "interval.min_interval")?;
        if min_interval == 0 {
            return Err(ConfigError::invalid("interval.min_interval", "必须 > 0"));
        }

        let nominal_max = require(&doc.max_interval, "interval.max_interval")?;
        if nominal_max < min_interval {
            return Err(ConfigError::invalid(
                "interval.max_interval",
                format!("max_interval={} 小于 min_interval={}", nominal_max, min_interval),
            ));
        }

        if let Some(practical) = doc.practical_max_interval {
            if practical < min_interval {
                return Err(ConfigError::invalid(
                    "interval.practical_max_interval",
                    format!("practical_max_interval={} 小于 min_interval={}", practical, min_interval),
                ));
            }
        }
        let max_interval = doc
            .practical_max_interval
            .map_or(nominal_max, |practical| practical.min(nominal_max));

        let initial = require(
            &doc.initial_maintenance_interval,
            "interval.initial_maintenance_interval",
        )?;
        if initial < min_interval || initial > max_interval {
            return Err(ConfigError::invalid(
                "interval.initial_maintenance_interval",
                format!("{} 超出范围 [{}, {}]", initial, min_interval, max_interval),
            ));
        }

        let extension_step = require(&doc.extension_step, "interval.extension_step")?;
        let shortening_step = require(&doc.shortening_step, "interval.shortening_step")?;
        if protocol_type == ProtocolType::TreatAndExtend {
            if extension_step == 0 {
                return Err(ConfigError::invalid("interval.extension_step", "按需延长方案步长必须 > 0"));
            }
            if shortening_step == 0 {
                return Err(ConfigError::invalid("interval.shortening_step", "按需延长方案步长必须 > 0"));
            }
        }

        let required_stable_visits =
            require(&doc.required_stable_visits, "interval.required_stable_visits")?;
        if required_stable_visits == 0 {
            return Err(ConfigError::invalid("interval.required_stable_visits", "必须 >= 1"));
        }

        Ok(IntervalRules {
            min_interval,
            max_interval,
            nominal_max_interval: nominal_max,
            practical_max_interval: doc.practical_max_interval,
            initial_maintenance_interval: initial,
            extension_step,
            shortening_step,
            required_stable_visits,
        })
    }

    fn validate_loading(doc: &LoadingDocument, interval: &IntervalRules) -> ConfigResult<LoadingPhase> {
        let doses = require(&doc.doses, "loading.doses")?;
        if doses == 0 {
            return Err(ConfigError::invalid("loading.doses", "负荷期注射次数必须 >= 1"));
        }

        let loading_interval = require(&doc.interval, "loading.interval")?;
        if loading_interval < interval.min_interval || loading_interval > interval.max_interval {
            return Err(ConfigError::invalid(
                "loading.interval",
                format!(
                    "{} 超出范围 [{}, {}]",
                    loading_interval, interval.min_interval, interval.max_interval
                ),
            ));
        }

        Ok(LoadingPhase {
            doses,
            interval: loading_interval,
        })
    }

    // ===== 疾病转移 =====

    fn validate_transitions(table: &StateTable) -> ConfigResult<TransitionMatrix> {
        let rows = index_states(table, "disease_transitions")?;
        let mut matrix = [[0.0; 4]; 4];

        for from in DiseaseState::ALL {
            let row_path = format!("disease_transitions.{}", from);
            let row = rows[from.index()].ok_or_else(|| ConfigError::missing(row_path.as_str()))?;
            let targets = index_states(row, &row_path)?;

            for to in DiseaseState::ALL {
                let cell_path = format!("{}.{}", row_path, to);
                let p = require_probability(&targets[to.index()].copied(), &cell_path)?;
                if to == DiseaseState::Naive && p != 0.0 {
                    return Err(ConfigError::invalid(cell_path, "转入 NAIVE 的概率必须为 0"));
                }
                matrix[from.index()][to.index()] = p;
            }

            let sum: f64 = matrix[from.index()].iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ConfigError::RowSumMismatch {
                    path: row_path,
                    sum,
                });
            }
        }

        Ok(TransitionMatrix { rows: matrix })
    }

    fn validate_treatment_effect(
        table: &StateTable,
        transitions: &TransitionMatrix,
    ) -> ConfigResult<TreatmentEffect> {
        let rows = index_states(table, "treatment_effect")?;
        let mut multipliers = [[1.0; 4]; 4];

        for from in DiseaseState::ALL {
            let Some(row) = rows[from.index()] else {
                continue;
            };
            let row_path = format!("treatment_effect.{}", from);
            let targets = index_states(row, &row_path)?;
            for to in DiseaseState::ALL {
                if let Some(m) = targets[to.index()] {
                    let cell_path = format!("{}.{}", row_path, to);
                    multipliers[from.index()][to.index()] =
                        require_non_negative(&Some(*m), &cell_path)?;
                }
            }
        }

        let effect = TreatmentEffect { multipliers };
        for from in DiseaseState::ALL {
            if effect.apply(from, transitions.row(from)).is_none() {
                return Err(ConfigError::invalid(
                    format!("treatment_effect.{}", from),
                    "乘子调整后行和为 0, 无法归一化",
                ));
            }
        }

        Ok(effect)
    }

    // ===== 视力模型 =====

    fn validate_normal(doc: &Option<NormalDocument>, path: &str) -> ConfigResult<NormalParams> {
        let doc = require_ref(doc, path)?;
        let mean = require_finite(&doc.mean, &format!("{}.mean", path))?;
        let std = require_finite(&doc.std, &format!("{}.std", path))?;
        if std < 0.0 {
            return Err(ConfigError::invalid(
                format!("{}.std", path),
                format!("标准差不能为负, 实际 {}", std),
            ));
        }
        Ok(NormalParams { mean, std })
    }

    fn validate_vision_change(
        map: &BTreeMap<String, VisionChangeDocument>,
    ) -> ConfigResult<VisionChangeTable> {
        let states = index_states(map, "vision_change")?;
        let zero = NormalParams { mean: 0.0, std: 0.0 };
        let mut entries = [[zero; 2]; 4];

        for state in DiseaseState::ALL {
            let path = format!("vision_change.{}", state);
            let entry = states[state.index()].ok_or_else(|| ConfigError::missing(path.as_str()))?;
            let untreated = Self::validate_normal(&entry.untreated, &format!("{}.untreated", path))?;
            let treated = Self::validate_normal(&entry.treated, &format!("{}.treated", path))?;
            entries[state.index()] = [untreated, treated];
        }

        Ok(VisionChangeTable { entries })
    }

    fn validate_baseline(doc: &BaselineVisionDocument) -> ConfigResult<BaselineVision> {
        let mean = require_finite(&doc.mean, "baseline_vision.mean")?;
        let std = require_finite(&doc.std, "baseline_vision.std")?;
        if std < 0.0 {
            return Err(ConfigError::invalid(
                "baseline_vision.std",
                format!("标准差不能为负, 实际 {}", std),
            ));
        }
        let min = require_finite(&doc.min, "baseline_vision.min")?;
        let max = require_finite(&doc.max, "baseline_vision.max")?;
        if min >= max {
            return Err(ConfigError::invalid(
                "baseline_vision.max",
                format!("max={} 必须大于 min={}", max, min),
            ));
        }
        Ok(BaselineVision { mean, std, min, max })
    }

    fn validate_responder(doc: &Option<ResponderDocument>, path: &str) -> ConfigResult<ResponderParams> {
        let doc = require_ref(doc, path)?;
        Ok(ResponderParams {
            proportion: require_probability(&doc.proportion, &format!("{}.proportion", path))?,
            multiplier: require_non_negative(&doc.multiplier, &format!("{}.multiplier", path))?,
        })
    }

    fn validate_responders(doc: &ResponderClassesDocument) -> ConfigResult<ResponderTable> {
        let table = ResponderTable {
            good: Self::validate_responder(&doc.good, "responder_classes.good")?,
            average: Self::validate_responder(&doc.average, "responder_classes.average")?,
            poor: Self::validate_responder(&doc.poor, "responder_classes.poor")?,
        };

        let sum = table.good.proportion + table.average.proportion + table.poor.proportion;
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(ConfigError::invalid(
                "responder_classes",
                format!("各分型比例之和必须为 1, 实际 {}", sum),
            ));
        }
        if table.poor.multiplier > table.average.multiplier
            || table.average.multiplier > table.good.multiplier
        {
            return Err(ConfigError::invalid(
                "responder_classes",
                "乘子必须满足 poor <= average <= good",
            ));
        }

        Ok(table)
    }

    // ===== 停药规则 =====

    fn validate_threshold_vision(
        doc: &Option<ThresholdCriterionDocument>,
        path: &str,
    ) -> ConfigResult<ThresholdCriterion<f64>> {
        let doc = require_ref(doc, path)?;
        Ok(ThresholdCriterion {
            threshold: require_finite(&doc.threshold, &format!("{}.threshold", path))?,
            probability: require_probability(&doc.probability, &format!("{}.probability", path))?,
            monitored: require(&doc.monitored, &format!("{}.monitored", path))?,
        })
    }

    fn validate_threshold_count(
        doc: &Option<ThresholdCriterionDocument>,
        path: &str,
    ) -> ConfigResult<ThresholdCriterion<u32>> {
        let doc = require_ref(doc, path)?;
        Ok(ThresholdCriterion {
            threshold: require_count(&doc.threshold, &format!("{}.threshold", path))?,
            probability: require_probability(&doc.probability, &format!("{}.probability", path))?,
            monitored: require(&doc.monitored, &format!("{}.monitored", path))?,
        })
    }

    fn validate_random(doc: &Option<RandomCriterionDocument>, path: &str) -> ConfigResult<RandomCriterion> {
        let doc = require_ref(doc, path)?;
        Ok(RandomCriterion {
            probability: require_probability(&doc.probability, &format!("{}.probability", path))?,
            monitored: require(&doc.monitored, &format!("{}.monitored", path))?,
        })
    }

    /// 校验停药规则块
    ///
    /// # 说明
    /// - enabled 缺失直接报错,绝不按 false 处理
    /// - enabled=false 时其余判据块同样必须完整
    pub fn validate_discontinuation(
        doc: &DiscontinuationRulesDocument,
    ) -> ConfigResult<DiscontinuationRules> {
        const ROOT: &str = "discontinuation_rules";

        let enabled = require(&doc.enabled, "discontinuation_rules.enabled")?;
        let poor_vision =
            Self::validate_threshold_vision(&doc.poor_vision, &format!("{}.poor_vision", ROOT))?;
        let high_injection_burden = Self::validate_threshold_count(
            &doc.high_injection_burden,
            &format!("{}.high_injection_burden", ROOT),
        )?;
        let long_duration =
            Self::validate_threshold_count(&doc.long_duration, &format!("{}.long_duration", ROOT))?;
        let random = Self::validate_random(&doc.random, &format!("{}.random", ROOT))?;

        let monitoring_doc = require_ref(&doc.monitoring, "discontinuation_rules.monitoring")?;
        let cadence_days = require(
            &monitoring_doc.cadence_days,
            "discontinuation_rules.monitoring.cadence_days",
        )?;
        if cadence_days == 0 {
            return Err(ConfigError::invalid(
                "discontinuation_rules.monitoring.cadence_days",
                "监测间隔必须 > 0",
            ));
        }
        let recurrence_probability = require_probability(
            &monitoring_doc.recurrence_probability,
            "discontinuation_rules.monitoring.recurrence_probability",
        )?;

        Ok(DiscontinuationRules {
            enabled,
            poor_vision,
            high_injection_burden,
            long_duration,
            random,
            monitoring: MonitoringRules {
                cadence_days,
                recurrence_probability,
            },
        })
    }
}
