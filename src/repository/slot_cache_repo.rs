// ==========================================
// 科研成果评估系统 - 槽位缓存仓储
// ==========================================
// 红线: 缓存只允许整篇替换（同一事务内先删后建）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::quota::YearRange;
use crate::domain::slot_cache::{AuthorWork, SlotCacheAuthor, SlotCacheDiscipline};
use crate::repository::codec::{decimal_column, enum_column};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const AUTHOR_WORK_SELECT: &str = r#"
    SELECT
        c.publication_id, c.author_id, c.discipline_id,
        p.kind, p.year, c.slot, c.points,
        (SELECT COUNT(*) FROM publication_author_link l
          WHERE l.publication_id = c.publication_id
            AND l.affiliates = 1 AND l.pinned = 1 AND l.discipline_id IS NOT NULL) AS author_count
    FROM slot_cache_author c
    JOIN publication p ON p.publication_id = c.publication_id
"#;

fn map_author_work(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthorWork> {
    Ok(AuthorWork {
        publication_id: row.get(0)?,
        author_id: row.get(1)?,
        discipline_id: row.get(2)?,
        kind: enum_column(row, 3)?,
        year: row.get(4)?,
        slot: decimal_column(row, 5)?,
        points: decimal_column(row, 6)?,
        author_count: row.get::<_, i64>(7)?.max(0) as u32,
    })
}

pub struct SlotCacheRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SlotCacheRepository {
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

    /// 整篇替换缓存（删除 + 重建，单事务）
    pub fn replace_for_publication(
        &self,
        publication_id: i64,
        disciplines: &[SlotCacheDiscipline],
        authors: &[SlotCacheAuthor],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM slot_cache_discipline WHERE publication_id = ?1",
            params![publication_id],
        )?;
        tx.execute(
            "DELETE FROM slot_cache_author WHERE publication_id = ?1",
            params![publication_id],
        )?;

        for d in disciplines {
            tx.execute(
                r#"
                INSERT INTO slot_cache_discipline (
                    publication_id, discipline_id, tier, multiplier, points_share
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    d.publication_id,
                    d.discipline_id,
                    d.tier.as_str(),
                    d.multiplier.to_string(),
                    d.points_share.to_string(),
                ],
            )?;
        }

        for a in authors {
            tx.execute(
                r#"
                INSERT INTO slot_cache_author (
                    publication_id, author_id, discipline_id, slot, points
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    a.publication_id,
                    a.author_id,
                    a.discipline_id,
                    a.slot.to_string(),
                    a.points.to_string(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn find_discipline_entries(
        &self,
        publication_id: i64,
    ) -> RepositoryResult<Vec<SlotCacheDiscipline>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT publication_id, discipline_id, tier, multiplier, points_share
            FROM slot_cache_discipline
            WHERE publication_id = ?1
            ORDER BY discipline_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![publication_id], |row| {
                Ok(SlotCacheDiscipline {
                    publication_id: row.get(0)?,
                    discipline_id: row.get(1)?,
                    tier: enum_column(row, 2)?,
                    multiplier: decimal_column(row, 3)?,
                    points_share: decimal_column(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_author_entries(&self, publication_id: i64) -> RepositoryResult<Vec<SlotCacheAuthor>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT publication_id, author_id, discipline_id, slot, points
            FROM slot_cache_author
            WHERE publication_id = ?1
            ORDER BY discipline_id, author_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![publication_id], |row| {
                Ok(SlotCacheAuthor {
                    publication_id: row.get(0)?,
                    author_id: row.get(1)?,
                    discipline_id: row.get(2)?,
                    slot: decimal_column(row, 3)?,
                    points: decimal_column(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 学科内全部候选（选优输入）
    pub fn author_works_for_discipline(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Vec<AuthorWork>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE c.discipline_id = ?1 AND p.year BETWEEN ?2 AND ?3 ORDER BY c.author_id, c.publication_id",
            AUTHOR_WORK_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![discipline_id, years.from, years.to], map_author_work)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 单个作者在学科内的全部成果
    pub fn author_works(
        &self,
        author_id: i64,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Vec<AuthorWork>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE c.author_id = ?1 AND c.discipline_id = ?2 AND p.year BETWEEN ?3 AND ?4 ORDER BY c.publication_id",
            AUTHOR_WORK_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![author_id, discipline_id, years.from, years.to],
                map_author_work,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 区间内缓存中出现过的 (作者, 学科)
    pub fn author_discipline_pairs(&self, years: YearRange) -> RepositoryResult<Vec<(i64, i64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT c.author_id, c.discipline_id
            FROM slot_cache_author c
            JOIN publication p ON p.publication_id = c.publication_id
            WHERE p.year BETWEEN ?1 AND ?2
            ORDER BY c.author_id, c.discipline_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![years.from, years.to], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(i64, i64)>, _>>()?;
        Ok(rows)
    }
}
