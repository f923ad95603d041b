// ==========================================
// AMD 方案模拟引擎 - 患者级随机流
// ==========================================
// 红线: 每名患者的随机流只由 (run_seed, patient_index) 决定,
//       不存在跨患者共享的全局随机源
// ==========================================

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// 患者随机流类型
pub type PatientRng = ChaCha8Rng;

/// 派生患者随机流
///
/// # 规则
/// - 同一 run_seed 下以 patient_index 作为 ChaCha 流编号
/// - 结果与并行度、完成顺序无关
pub fn patient_rng(run_seed: u64, patient_index: usize) -> PatientRng {
    let mut rng = ChaCha8Rng::seed_from_u64(run_seed);
    rng.set_stream(patient_index as u64);
    rng
}
