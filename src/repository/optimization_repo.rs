// ==========================================
// 科研成果评估系统 - 选优结果仓储
// ==========================================
// 规则: 同一学科只保留最新一次运行（删除旧运行后新建，单事务）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::optimization::{
    OptimizationAuthorResult, OptimizationOutcome, OptimizationPublication, OptimizationRun,
};
use crate::domain::quota::YearRange;
use crate::repository::codec::{datetime_column, decimal_column, enum_column, format_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<OptimizationRun> {
    Ok(OptimizationRun {
        run_id: row.get(0)?,
        discipline_id: row.get(1)?,
        institution: row.get(2)?,
        years: YearRange::new(row.get(3)?, row.get(4)?),
        strategy: row.get(5)?,
        status: enum_column(row, 6)?,
        total_points: decimal_column(row, 7)?,
        total_slots: decimal_column(row, 8)?,
        mono_slots: decimal_column(row, 9)?,
        publication_count: row.get(10)?,
        low_mono_count: row.get(11)?,
        low_mono_percentage: decimal_column(row, 12)?,
        outside_n_percentage: decimal_column(row, 13)?,
        validation_passed: row.get::<_, i64>(14)? != 0,
        is_optimal: row.get::<_, i64>(15)? != 0,
        config_snapshot: row.get(16)?,
        created_at: datetime_column(row, 17)?,
    })
}

pub struct OptimizationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OptimizationRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 替换学科的选优结果
    pub fn replace_run(&self, outcome: &OptimizationOutcome) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let run = &outcome.run;

        // 子表 ON DELETE CASCADE
        tx.execute(
            "DELETE FROM optimization_run WHERE discipline_id = ?1",
            params![run.discipline_id],
        )?;

        tx.execute(
            r#"
            INSERT INTO optimization_run (
                run_id, discipline_id, institution, year_from, year_to, strategy, status,
                total_points, total_slots, mono_slots, publication_count,
                low_mono_count, low_mono_percentage, outside_n_percentage,
                validation_passed, is_optimal, config_snapshot, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18
            )
            "#,
            params![
                run.run_id,
                run.discipline_id,
                run.institution,
                run.years.from,
                run.years.to,
                run.strategy,
                run.status.as_str(),
                run.total_points.to_string(),
                run.total_slots.to_string(),
                run.mono_slots.to_string(),
                run.publication_count,
                run.low_mono_count,
                run.low_mono_percentage.to_string(),
                run.outside_n_percentage.to_string(),
                run.validation_passed as i64,
                run.is_optimal as i64,
                run.config_snapshot,
                format_datetime(&run.created_at),
            ],
        )?;

        for r in &outcome.author_results {
            tx.execute(
                r#"
                INSERT INTO optimization_author_result (
                    run_id, author_id, points_achieved, slots_achieved, mono_slots_achieved,
                    total_slot_ceiling, mono_slot_ceiling
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    r.run_id,
                    r.author_id,
                    r.points_achieved.to_string(),
                    r.slots_achieved.to_string(),
                    r.mono_slots_achieved.to_string(),
                    r.total_slot_ceiling.to_string(),
                    r.mono_slot_ceiling.to_string(),
                ],
            )?;
        }

        for p in &outcome.publications {
            tx.execute(
                r#"
                INSERT INTO optimization_publication (
                    run_id, author_id, publication_id, kind, points, slot_cost, is_low_mono
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    p.run_id,
                    p.author_id,
                    p.publication_id,
                    p.kind.as_str(),
                    p.points.to_string(),
                    p.slot_cost.to_string(),
                    p.is_low_mono as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn latest_run(&self, discipline_id: i64) -> RepositoryResult<Option<OptimizationRun>> {
        let conn = self.get_conn()?;
        let run = conn
            .query_row(
                r#"
                SELECT run_id, discipline_id, institution, year_from, year_to, strategy, status,
                       total_points, total_slots, mono_slots, publication_count,
                       low_mono_count, low_mono_percentage, outside_n_percentage,
                       validation_passed, is_optimal, config_snapshot, created_at
                FROM optimization_run
                WHERE discipline_id = ?1
                ORDER BY created_at DESC
                LIMIT 1
                "#,
                params![discipline_id],
                map_run,
            )
            .optional()?;
        Ok(run)
    }

    /// 学科在指定区间上的最新运行
    pub fn latest_run_for(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Option<OptimizationRun>> {
        let conn = self.get_conn()?;
        let run = conn
            .query_row(
                r#"
                SELECT run_id, discipline_id, institution, year_from, year_to, strategy, status,
                       total_points, total_slots, mono_slots, publication_count,
                       low_mono_count, low_mono_percentage, outside_n_percentage,
                       validation_passed, is_optimal, config_snapshot, created_at
                FROM optimization_run
                WHERE discipline_id = ?1 AND year_from = ?2 AND year_to = ?3
                ORDER BY created_at DESC
                LIMIT 1
                "#,
                params![discipline_id, years.from, years.to],
                map_run,
            )
            .optional()?;
        Ok(run)
    }

    pub fn author_results(&self, run_id: &str) -> RepositoryResult<Vec<OptimizationAuthorResult>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, author_id, points_achieved, slots_achieved, mono_slots_achieved,
                   total_slot_ceiling, mono_slot_ceiling
            FROM optimization_author_result
            WHERE run_id = ?1
            ORDER BY author_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(OptimizationAuthorResult {
                    run_id: row.get(0)?,
                    author_id: row.get(1)?,
                    points_achieved: decimal_column(row, 2)?,
                    slots_achieved: decimal_column(row, 3)?,
                    mono_slots_achieved: decimal_column(row, 4)?,
                    total_slot_ceiling: decimal_column(row, 5)?,
                    mono_slot_ceiling: decimal_column(row, 6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn publications(&self, run_id: &str) -> RepositoryResult<Vec<OptimizationPublication>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, author_id, publication_id, kind, points, slot_cost, is_low_mono
            FROM optimization_publication
            WHERE run_id = ?1
            ORDER BY author_id, publication_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(OptimizationPublication {
                    run_id: row.get(0)?,
                    author_id: row.get(1)?,
                    publication_id: row.get(2)?,
                    kind: enum_column(row, 3)?,
                    points: decimal_column(row, 4)?,
                    slot_cost: decimal_column(row, 5)?,
                    is_low_mono: row.get::<_, i64>(6)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 读取学科最新运行的完整结果
    pub fn latest_outcome(&self, discipline_id: i64) -> RepositoryResult<Option<OptimizationOutcome>> {
        match self.latest_run(discipline_id)? {
            Some(run) => self.load_outcome(run).map(Some),
            None => Ok(None),
        }
    }

    /// 读取学科在指定区间上的最新完整结果
    pub fn latest_outcome_for(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Option<OptimizationOutcome>> {
        match self.latest_run_for(discipline_id, years)? {
            Some(run) => self.load_outcome(run).map(Some),
            None => Ok(None),
        }
    }

    fn load_outcome(&self, run: OptimizationRun) -> RepositoryResult<OptimizationOutcome> {
        let author_results = self.author_results(&run.run_id)?;
        let publications = self.publications(&run.run_id)?;
        Ok(OptimizationOutcome {
            run,
            author_results,
            publications,
        })
    }
}
