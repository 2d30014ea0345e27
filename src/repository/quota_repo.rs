// ==========================================
// 科研成果评估系统 - 额度仓储
// ==========================================
// 额度是计算结果：按 (学科, 年度区间) 整体替换
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::quota::{DisciplineQuota, QuotaRecord, YearRange};
use crate::repository::codec::decimal_column;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn map_quota_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuotaRecord> {
    Ok(QuotaRecord {
        author_id: row.get(0)?,
        discipline_id: row.get(1)?,
        years: YearRange::new(row.get(2)?, row.get(3)?),
        n_value: decimal_column(row, 4)?,
        author_share: decimal_column(row, 5)?,
        total_slot_ceiling: decimal_column(row, 6)?,
        mono_slot_ceiling: decimal_column(row, 7)?,
        in_n: row.get::<_, i64>(8)? != 0,
    })
}

const QUOTA_COLUMNS: &str = "author_id, discipline_id, year_from, year_to, n_value, author_share, total_slot_ceiling, mono_slot_ceiling, in_n";

pub struct QuotaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuotaRepository {
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

    /// 替换学科额度及其作者额度（单事务）
    pub fn replace_for_discipline(
        &self,
        quota: &DisciplineQuota,
        records: &[QuotaRecord],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM discipline_quota WHERE discipline_id = ?1 AND year_from = ?2 AND year_to = ?3",
            params![quota.discipline_id, quota.years.from, quota.years.to],
        )?;
        tx.execute(
            "DELETE FROM quota_record WHERE discipline_id = ?1 AND year_from = ?2 AND year_to = ?3",
            params![quota.discipline_id, quota.years.from, quota.years.to],
        )?;

        tx.execute(
            r#"
            INSERT INTO discipline_quota (
                discipline_id, year_from, year_to, n_value,
                institution_total_ceiling, institution_mono_ceiling, excluded
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                quota.discipline_id,
                quota.years.from,
                quota.years.to,
                quota.n_value.to_string(),
                quota.institution_total_ceiling.to_string(),
                quota.institution_mono_ceiling.to_string(),
                quota.excluded as i64,
            ],
        )?;

        for r in records {
            tx.execute(
                r#"
                INSERT INTO quota_record (
                    author_id, discipline_id, year_from, year_to, n_value,
                    author_share, total_slot_ceiling, mono_slot_ceiling, in_n
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    r.author_id,
                    r.discipline_id,
                    r.years.from,
                    r.years.to,
                    r.n_value.to_string(),
                    r.author_share.to_string(),
                    r.total_slot_ceiling.to_string(),
                    r.mono_slot_ceiling.to_string(),
                    r.in_n as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn find_record(
        &self,
        author_id: i64,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Option<QuotaRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM quota_record WHERE author_id = ?1 AND discipline_id = ?2 AND year_from = ?3 AND year_to = ?4",
            QUOTA_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![author_id, discipline_id, years.from, years.to],
                map_quota_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn records_for_discipline(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Vec<QuotaRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM quota_record WHERE discipline_id = ?1 AND year_from = ?2 AND year_to = ?3 ORDER BY author_id",
            QUOTA_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![discipline_id, years.from, years.to], map_quota_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_discipline_quota(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Option<DisciplineQuota>> {
        let conn = self.get_conn()?;
        let quota = conn
            .query_row(
                r#"
                SELECT discipline_id, year_from, year_to, n_value,
                       institution_total_ceiling, institution_mono_ceiling, excluded
                FROM discipline_quota
                WHERE discipline_id = ?1 AND year_from = ?2 AND year_to = ?3
                "#,
                params![discipline_id, years.from, years.to],
                |row| {
                    Ok(DisciplineQuota {
                        discipline_id: row.get(0)?,
                        years: YearRange::new(row.get(1)?, row.get(2)?),
                        n_value: decimal_column(row, 3)?,
                        institution_total_ceiling: decimal_column(row, 4)?,
                        institution_mono_ceiling: decimal_column(row, 5)?,
                        excluded: row.get::<_, i64>(6)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(quota)
    }
}
