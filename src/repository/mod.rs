// ==========================================
// AMD 方案模拟引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含模拟逻辑,只落库/读取访视记录
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod trajectory_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use trajectory_repo::{PatientSummaryEntity, SimRunEntity, TrajectoryRepository, VisitEntity};
