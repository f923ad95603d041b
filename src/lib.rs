// ==========================================
// AMD 按需延长方案模拟引擎 - 核心库
// ==========================================
// 技术栈: Rust + rayon + SQLite
// 系统定位: 患者级随机模拟,输出逐次访视轨迹供下游统计
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 患者/访视/状态标签
pub mod domain;

// 配置层 - 方案解析与校验
pub mod config;

// 引擎层 - 随机模拟
pub mod engine;

// 数据仓储层 - 访视记录落库
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    DiscontinuationType, DiseaseState, IntervalAction, Patient, PatientTrajectory,
    ResponderClass, TreatmentStatus, Visit, VisitType,
};

// 配置
pub use config::{ConfigError, ConfigResult, ProtocolDocument, ProtocolSpec};

// 引擎
pub use engine::{
    run, CancellationToken, Parallelism, PatientTrajectoryDriver, PopulationResult,
    PopulationRunner, RunRequest, SimResult, SimulationError,
};

// 仓储
pub use repository::{RepositoryError, RepositoryResult, TrajectoryRepository};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "AMD 按需延长方案模拟引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
