// ==========================================
// AMD 方案模拟引擎 - 轨迹数据仓储
// ==========================================
// 表:
// - sim_run:      一次人群运行的元数据 + 方案快照
// - sim_patient:  每名患者的轨迹摘要
// - sim_visit:    每次访视一行（只追加）
// 红线: 一次运行在单个事务内写入,要么全部落库要么全部回滚
// ==========================================

use crate::db::{open_sqlite_connection, write_schema_version};
use crate::domain::patient::PatientTrajectory;
use crate::domain::types::{DiscontinuationType, DiseaseState, IntervalAction, VisitType};
use crate::domain::visit::{IntervalDecision, Visit, VisitActions};
use crate::engine::population::PopulationResult;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// 实体
// ==========================================

/// sim_run 行
#[derive(Debug, Clone, PartialEq)]
pub struct SimRunEntity {
    pub run_id: String,
    pub protocol_name: String,
    pub protocol_snapshot: String,
    pub seed: u64,
    pub population_size: i64,
    pub completed_patients: i64,
    pub horizon_days: i64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// sim_patient 行
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSummaryEntity {
    pub run_id: String,
    pub patient_id: i64,
    pub responder_class: String,
    pub baseline_vision: f64,
    pub final_vision: f64,
    pub final_status: String,
    pub final_discontinuation_type: Option<String>,
    pub total_injections: i64,
    pub retreatments: i64,
    pub visit_count: i64,
}

/// sim_visit 行
#[derive(Debug, Clone, PartialEq)]
pub struct VisitEntity {
    pub run_id: String,
    pub patient_id: i64,
    pub seq_no: i64,
    pub day: i64,
    pub visit_type: String,
    pub assessment: bool,
    pub injection: bool,
    pub disease_before: String,
    pub disease_after: String,
    pub vision_before: f64,
    pub vision_after: f64,
    pub interval_action: Option<String>,
    pub new_interval: Option<i64>,
    pub discontinuation_type: Option<String>,
    pub recurrence_detected: Option<bool>,
}

fn parse_disease(field: &str, value: &str) -> RepositoryResult<DiseaseState> {
    DiseaseState::parse(value)
        .ok_or_else(|| RepositoryError::field(field, format!("未知疾病状态: {}", value)))
}

fn to_u32(field: &str, value: i64) -> RepositoryResult<u32> {
    u32::try_from(value).map_err(|_| RepositoryError::field(field, format!("超出范围: {}", value)))
}

impl VisitEntity {
    fn from_visit(run_id: &str, patient_id: usize, seq_no: usize, visit: &Visit) -> Self {
        Self {
            run_id: run_id.to_string(),
            patient_id: patient_id as i64,
            seq_no: seq_no as i64,
            day: i64::from(visit.day),
            visit_type: visit.visit_type.as_str().to_string(),
            assessment: visit.actions.assessment,
            injection: visit.actions.injection,
            disease_before: visit.disease_before.as_str().to_string(),
            disease_after: visit.disease_after.as_str().to_string(),
            vision_before: visit.vision_before,
            vision_after: visit.vision_after,
            interval_action: visit
                .interval_decision
                .map(|d| d.action.as_str().to_string()),
            new_interval: visit.interval_decision.map(|d| i64::from(d.new_interval)),
            discontinuation_type: visit.discontinuation.map(|t| t.as_str().to_string()),
            recurrence_detected: visit.recurrence_detected,
        }
    }

    /// 还原为领域访视记录
    pub fn to_visit(&self) -> RepositoryResult<Visit> {
        let visit_type = VisitType::parse(&self.visit_type).ok_or_else(|| {
            RepositoryError::field("visit_type", format!("未知访视类型: {}", self.visit_type))
        })?;

        let interval_decision = match (&self.interval_action, self.new_interval) {
            (Some(action), Some(interval)) => Some(IntervalDecision {
                action: IntervalAction::parse(action).ok_or_else(|| {
                    RepositoryError::field("interval_action", format!("未知间隔动作: {}", action))
                })?,
                new_interval: to_u32("new_interval", interval)?,
            }),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::field(
                    "interval_action",
                    "interval_action 与 new_interval 必须同时为空或同时有值",
                ))
            }
        };

        let discontinuation = match &self.discontinuation_type {
            Some(t) => Some(DiscontinuationType::parse(t).ok_or_else(|| {
                RepositoryError::field("discontinuation_type", format!("未知停药类型: {}", t))
            })?),
            None => None,
        };

        Ok(Visit {
            day: to_u32("day", self.day)?,
            visit_type,
            actions: VisitActions {
                assessment: self.assessment,
                injection: self.injection,
            },
            disease_before: parse_disease("disease_before", &self.disease_before)?,
            disease_after: parse_disease("disease_after", &self.disease_after)?,
            vision_before: self.vision_before,
            vision_after: self.vision_after,
            interval_decision,
            discontinuation,
            recurrence_detected: self.recurrence_detected,
        })
    }
}

fn patient_summary(run_id: &str, trajectory: &PatientTrajectory) -> PatientSummaryEntity {
    PatientSummaryEntity {
        run_id: run_id.to_string(),
        patient_id: trajectory.patient_id as i64,
        responder_class: trajectory.responder_class.to_string(),
        baseline_vision: trajectory.baseline_vision,
        final_vision: trajectory.final_vision(),
        final_status: trajectory.final_status.to_string(),
        final_discontinuation_type: trajectory
            .final_discontinuation_type
            .map(|t| t.as_str().to_string()),
        total_injections: i64::from(trajectory.total_injections),
        retreatments: i64::from(trajectory.retreatments),
        visit_count: trajectory.visits.len() as i64,
    }
}

fn parse_timestamp(field: &str, value: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::field(field, e.to_string()))
}

// ==========================================
// TrajectoryRepository - 轨迹仓储
// ==========================================
pub struct TrajectoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TrajectoryRepository {
    /// 创建仓储实例（不自动建表）
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件并建表
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self::new(Arc::new(Mutex::new(conn)));
        repo.init_schema()?;
        Ok(repo)
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 建表（幂等）
    pub fn init_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sim_run (
              run_id TEXT PRIMARY KEY,
              protocol_name TEXT NOT NULL,
              protocol_snapshot TEXT NOT NULL,
              seed INTEGER NOT NULL,
              population_size INTEGER NOT NULL,
              completed_patients INTEGER NOT NULL,
              horizon_days INTEGER NOT NULL,
              cancelled INTEGER NOT NULL DEFAULT 0,
              started_at TEXT NOT NULL,
              finished_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sim_patient (
              run_id TEXT NOT NULL REFERENCES sim_run(run_id) ON DELETE CASCADE,
              patient_id INTEGER NOT NULL,
              responder_class TEXT NOT NULL,
              baseline_vision REAL NOT NULL,
              final_vision REAL NOT NULL,
              final_status TEXT NOT NULL,
              final_discontinuation_type TEXT,
              total_injections INTEGER NOT NULL,
              retreatments INTEGER NOT NULL,
              visit_count INTEGER NOT NULL,
              PRIMARY KEY (run_id, patient_id)
            );

            CREATE TABLE IF NOT EXISTS sim_visit (
              run_id TEXT NOT NULL,
              patient_id INTEGER NOT NULL,
              seq_no INTEGER NOT NULL,
              day INTEGER NOT NULL,
              visit_type TEXT NOT NULL,
              assessment INTEGER NOT NULL,
              injection INTEGER NOT NULL,
              disease_before TEXT NOT NULL,
              disease_after TEXT NOT NULL,
              vision_before REAL NOT NULL,
              vision_after REAL NOT NULL,
              interval_action TEXT,
              new_interval INTEGER,
              discontinuation_type TEXT,
              recurrence_detected INTEGER,
              PRIMARY KEY (run_id, patient_id, seq_no),
              FOREIGN KEY (run_id, patient_id)
                REFERENCES sim_patient(run_id, patient_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_sim_visit_discontinuation
              ON sim_visit(run_id, discontinuation_type);
            "#,
        )?;
        write_schema_version(&conn)?;
        Ok(())
    }

    /// 保存一次运行结果
    ///
    /// # 参数
    /// - `result`: 人群运行结果
    /// - `protocol_snapshot`: 方案快照 JSON（ProtocolSpec::snapshot_json）
    ///
    /// # 返回
    /// - `Ok(visit_rows)`: 写入的访视行数
    pub fn save_result(
        &self,
        result: &PopulationResult,
        protocol_snapshot: &str,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut visit_rows = 0usize;

        tx.execute(
            r#"INSERT INTO sim_run (
                run_id, protocol_name, protocol_snapshot, seed, population_size,
                completed_patients, horizon_days, cancelled, started_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                &result.run_id,
                &result.protocol_name,
                protocol_snapshot,
                // u64 种子按位存为 INTEGER
                result.seed as i64,
                result.population_size as i64,
                result.trajectories.len() as i64,
                i64::from(result.horizon_days),
                result.cancelled,
                result.started_at.to_rfc3339(),
                result.finished_at.to_rfc3339(),
            ],
        )?;

        {
            let mut patient_stmt = tx.prepare(
                r#"INSERT INTO sim_patient (
                    run_id, patient_id, responder_class, baseline_vision, final_vision,
                    final_status, final_discontinuation_type, total_injections,
                    retreatments, visit_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            )?;
            let mut visit_stmt = tx.prepare(
                r#"INSERT INTO sim_visit (
                    run_id, patient_id, seq_no, day, visit_type, assessment, injection,
                    disease_before, disease_after, vision_before, vision_after,
                    interval_action, new_interval, discontinuation_type, recurrence_detected
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
            )?;

            for trajectory in &result.trajectories {
                let summary = patient_summary(&result.run_id, trajectory);
                patient_stmt.execute(params![
                    &summary.run_id,
                    summary.patient_id,
                    &summary.responder_class,
                    summary.baseline_vision,
                    summary.final_vision,
                    &summary.final_status,
                    &summary.final_discontinuation_type,
                    summary.total_injections,
                    summary.retreatments,
                    summary.visit_count,
                ])?;

                for (seq_no, visit) in trajectory.visits.iter().enumerate() {
                    let row =
                        VisitEntity::from_visit(&result.run_id, trajectory.patient_id, seq_no, visit);
                    visit_stmt.execute(params![
                        &row.run_id,
                        row.patient_id,
                        row.seq_no,
                        row.day,
                        &row.visit_type,
                        row.assessment,
                        row.injection,
                        &row.disease_before,
                        &row.disease_after,
                        row.vision_before,
                        row.vision_after,
                        &row.interval_action,
                        row.new_interval,
                        &row.discontinuation_type,
                        row.recurrence_detected,
                    ])?;
                    visit_rows += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            run_id = %result.run_id,
            patients = result.trajectories.len(),
            visit_rows,
            "模拟结果已落库"
        );
        Ok(visit_rows)
    }

    /// 按 run_id 查询运行元数据
    pub fn load_run(&self, run_id: &str) -> RepositoryResult<Option<SimRunEntity>> {
        let conn = self.get_conn()?;

        let raw = conn
            .query_row(
                r#"SELECT run_id, protocol_name, protocol_snapshot, seed, population_size,
                          completed_patients, horizon_days, cancelled, started_at, finished_at
                   FROM sim_run
                   WHERE run_id = ?1"#,
                params![run_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, bool>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            run_id,
            protocol_name,
            protocol_snapshot,
            seed,
            population_size,
            completed_patients,
            horizon_days,
            cancelled,
            started_at,
            finished_at,
        )) = raw
        else {
            return Ok(None);
        };

        Ok(Some(SimRunEntity {
            run_id,
            protocol_name,
            protocol_snapshot,
            seed: seed as u64,
            population_size,
            completed_patients,
            horizon_days,
            cancelled,
            started_at: parse_timestamp("started_at", &started_at)?,
            finished_at: parse_timestamp("finished_at", &finished_at)?,
        }))
    }

    /// 查询一次运行的患者摘要（按 patient_id 升序）
    pub fn list_patients(&self, run_id: &str) -> RepositoryResult<Vec<PatientSummaryEntity>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT run_id, patient_id, responder_class, baseline_vision, final_vision,
                      final_status, final_discontinuation_type, total_injections,
                      retreatments, visit_count
               FROM sim_patient
               WHERE run_id = ?1
               ORDER BY patient_id"#,
        )?;

        let patients = stmt
            .query_map(params![run_id], |row| {
                Ok(PatientSummaryEntity {
                    run_id: row.get(0)?,
                    patient_id: row.get(1)?,
                    responder_class: row.get(2)?,
                    baseline_vision: row.get(3)?,
                    final_vision: row.get(4)?,
                    final_status: row.get(5)?,
                    final_discontinuation_type: row.get(6)?,
                    total_injections: row.get(7)?,
                    retreatments: row.get(8)?,
                    visit_count: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(patients)
    }

    /// 查询单个患者的访视记录（按访视顺序）
    pub fn list_visits(&self, run_id: &str, patient_id: usize) -> RepositoryResult<Vec<VisitEntity>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT run_id, patient_id, seq_no, day, visit_type, assessment, injection,
                      disease_before, disease_after, vision_before, vision_after,
                      interval_action, new_interval, discontinuation_type, recurrence_detected
               FROM sim_visit
               WHERE run_id = ?1 AND patient_id = ?2
               ORDER BY seq_no"#,
        )?;

        let visits = stmt
            .query_map(params![run_id, patient_id as i64], |row| self.map_visit_row(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(visits)
    }

    /// 一次运行的访视总行数
    pub fn count_visits(&self, run_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sim_visit WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 按停药类型统计停药访视数
    pub fn count_discontinuations(&self, run_id: &str) -> RepositoryResult<Vec<(String, i64)>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT discontinuation_type, COUNT(*)
               FROM sim_visit
               WHERE run_id = ?1 AND discontinuation_type IS NOT NULL
               GROUP BY discontinuation_type
               ORDER BY discontinuation_type"#,
        )?;

        let counts = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    /// 删除一次运行（级联删除患者与访视）
    pub fn delete_run(&self, run_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM sim_run WHERE run_id = ?1", params![run_id])?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "sim_run".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    fn map_visit_row(&self, row: &Row) -> rusqlite::Result<VisitEntity> {
        Ok(VisitEntity {
            run_id: row.get(0)?,
            patient_id: row.get(1)?,
            seq_no: row.get(2)?,
            day: row.get(3)?,
            visit_type: row.get(4)?,
            assessment: row.get(5)?,
            injection: row.get(6)?,
            disease_before: row.get(7)?,
            disease_after: row.get(8)?,
            vision_before: row.get(9)?,
            vision_after: row.get(10)?,
            interval_action: row.get(11)?,
            new_interval: row.get(12)?,
            discontinuation_type: row.get(13)?,
            recurrence_detected: row.get(14)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::sample_protocol;
    use crate::db::open_in_memory;
    use crate::engine::population::{Parallelism, PopulationRunner, RunRequest};

    fn memory_repo() -> TrajectoryRepository {
        let repo = TrajectoryRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())));
        repo.init_schema().unwrap();
        repo
    }

    fn sample_result() -> PopulationResult {
        PopulationRunner::new(sample_protocol())
            .unwrap()
            .run(&RunRequest::new(8, 2 * 365, 31).with_parallelism(Parallelism::Sequential))
            .unwrap()
    }

    #[test]
    fn test_save_and_reload_visits() {
        let repo = memory_repo();
        let result = sample_result();
        let snapshot = sample_protocol().snapshot_json().unwrap();

        let rows = repo.save_result(&result, &snapshot).unwrap();
        let expected: usize = result.trajectories.iter().map(|t| t.visits.len()).sum();
        assert_eq!(rows, expected);
        assert_eq!(repo.count_visits(&result.run_id).unwrap(), expected as i64);

        for trajectory in &result.trajectories {
            let visits: Vec<Visit> = repo
                .list_visits(&result.run_id, trajectory.patient_id)
                .unwrap()
                .iter()
                .map(|v| v.to_visit().unwrap())
                .collect();
            assert_eq!(visits, trajectory.visits);
        }
    }

    #[test]
    fn test_load_run_metadata() {
        let repo = memory_repo();
        let result = sample_result();
        repo.save_result(&result, "{}").unwrap();

        let run = repo.load_run(&result.run_id).unwrap().unwrap();
        assert_eq!(run.seed, 31);
        assert_eq!(run.population_size, 8);
        assert_eq!(run.completed_patients, 8);
        assert!(!run.cancelled);
        assert_eq!(run.started_at, result.started_at);

        assert!(repo.load_run("missing").unwrap().is_none());
        assert_eq!(repo.list_patients(&result.run_id).unwrap().len(), 8);
    }

    #[test]
    fn test_duplicate_run_rolls_back() {
        let repo = memory_repo();
        let result = sample_result();
        repo.save_result(&result, "{}").unwrap();
        let before = repo.count_visits(&result.run_id).unwrap();

        let err = repo.save_result(&result, "{}").unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(repo.count_visits(&result.run_id).unwrap(), before);
    }

    #[test]
    fn test_delete_run_cascades() {
        let repo = memory_repo();
        let result = sample_result();
        repo.save_result(&result, "{}").unwrap();

        repo.delete_run(&result.run_id).unwrap();
        assert_eq!(repo.count_visits(&result.run_id).unwrap(), 0);
        assert!(repo.list_patients(&result.run_id).unwrap().is_empty());
        assert!(matches!(
            repo.delete_run(&result.run_id),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
