// ==========================================
// 科研成果评估系统 - 作者指标仓储
// ==========================================
// upsert 主键: (author_id, discipline_id)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::metric::AuthorMetric;
use crate::domain::quota::YearRange;
use crate::repository::codec::decimal_column;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct MetricRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MetricRepository {
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

    pub fn upsert(&self, m: &AuthorMetric) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let selected = serde_json::to_string(&m.selected_publication_ids)?;
        let unselected = serde_json::to_string(&m.unselected_publication_ids)?;
        conn.execute(
            r#"
            INSERT INTO author_metric (
                author_id, discipline_id, year_from, year_to,
                slot_ceiling, slot_achieved, points_achieved, avg_points_per_slot,
                slot_achieved_all_works, points_achieved_all_works, avg_points_per_slot_all_works,
                utilization_pct, selected_publication_ids, unselected_publication_ids
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(author_id, discipline_id) DO UPDATE SET
                year_from = excluded.year_from,
                year_to = excluded.year_to,
                slot_ceiling = excluded.slot_ceiling,
                slot_achieved = excluded.slot_achieved,
                points_achieved = excluded.points_achieved,
                avg_points_per_slot = excluded.avg_points_per_slot,
                slot_achieved_all_works = excluded.slot_achieved_all_works,
                points_achieved_all_works = excluded.points_achieved_all_works,
                avg_points_per_slot_all_works = excluded.avg_points_per_slot_all_works,
                utilization_pct = excluded.utilization_pct,
                selected_publication_ids = excluded.selected_publication_ids,
                unselected_publication_ids = excluded.unselected_publication_ids
            "#,
            params![
                m.author_id,
                m.discipline_id,
                m.years.from,
                m.years.to,
                m.slot_ceiling.to_string(),
                m.slot_achieved.to_string(),
                m.points_achieved.to_string(),
                m.avg_points_per_slot.to_string(),
                m.slot_achieved_all_works.to_string(),
                m.points_achieved_all_works.to_string(),
                m.avg_points_per_slot_all_works.to_string(),
                m.utilization_pct.to_string(),
                selected,
                unselected,
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, author_id: i64, discipline_id: i64) -> RepositoryResult<Option<AuthorMetric>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT author_id, discipline_id, year_from, year_to,
                       slot_ceiling, slot_achieved, points_achieved, avg_points_per_slot,
                       slot_achieved_all_works, points_achieved_all_works,
                       avg_points_per_slot_all_works, utilization_pct,
                       selected_publication_ids, unselected_publication_ids
                FROM author_metric
                WHERE author_id = ?1 AND discipline_id = ?2
                "#,
                params![author_id, discipline_id],
                |row| {
                    Ok((
                        AuthorMetric {
                            author_id: row.get(0)?,
                            discipline_id: row.get(1)?,
                            years: YearRange::new(row.get(2)?, row.get(3)?),
                            slot_ceiling: decimal_column(row, 4)?,
                            slot_achieved: decimal_column(row, 5)?,
                            points_achieved: decimal_column(row, 6)?,
                            avg_points_per_slot: decimal_column(row, 7)?,
                            slot_achieved_all_works: decimal_column(row, 8)?,
                            points_achieved_all_works: decimal_column(row, 9)?,
                            avg_points_per_slot_all_works: decimal_column(row, 10)?,
                            utilization_pct: decimal_column(row, 11)?,
                            selected_publication_ids: Vec::new(),
                            unselected_publication_ids: Vec::new(),
                        },
                        row.get::<_, String>(12)?,
                        row.get::<_, String>(13)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut metric, selected, unselected)) => {
                metric.selected_publication_ids = serde_json::from_str(&selected)?;
                metric.unselected_publication_ids = serde_json::from_str(&unselected)?;
                Ok(Some(metric))
            }
            None => Ok(None),
        }
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM author_metric", [], |row| row.get(0))?;
        Ok(n)
    }
}
