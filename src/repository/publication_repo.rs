// ==========================================
// 科研成果评估系统 - 成果与作者关联仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 成果/关联由外部协作方写入；本系统只修改 pinned 标志
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::publication::{Publication, PublicationAuthorLink};
use crate::domain::quota::YearRange;
use crate::repository::codec::{decimal_column, enum_column};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

const PUBLICATION_COLUMNS: &str = "publication_id, title, kind, year, points, parent_id";
const LINK_COLUMNS: &str =
    "link_id, publication_id, author_id, discipline_id, affiliates, pinned, role, position";

fn map_publication(row: &rusqlite::Row<'_>) -> rusqlite::Result<Publication> {
    Ok(Publication {
        id: row.get(0)?,
        title: row.get(1)?,
        kind: enum_column(row, 2)?,
        year: row.get(3)?,
        points: decimal_column(row, 4)?,
        parent_id: row.get(5)?,
    })
}

fn map_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<PublicationAuthorLink> {
    Ok(PublicationAuthorLink {
        id: row.get(0)?,
        publication_id: row.get(1)?,
        author_id: row.get(2)?,
        discipline_id: row.get(3)?,
        affiliates: row.get::<_, i64>(4)? != 0,
        pinned: row.get::<_, i64>(5)? != 0,
        role: enum_column(row, 6)?,
        position: row.get(7)?,
    })
}

// ==========================================
// PublicationRepository
// ==========================================
pub struct PublicationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PublicationRepository {
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

    // ===== 成果 =====

    pub fn insert_publication(&self, publication: &Publication) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO publication (publication_id, title, kind, year, points, parent_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                publication.id,
                publication.title,
                publication.kind.as_str(),
                publication.year,
                publication.points.to_string(),
                publication.parent_id,
            ],
        )?;
        Ok(())
    }

    /// 修改分值（调用方必须随后重建缓存）
    pub fn update_points(&self, publication_id: i64, points: Decimal) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE publication SET points = ?1 WHERE publication_id = ?2",
            params![points.to_string(), publication_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("publication", publication_id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, publication_id: i64) -> RepositoryResult<Option<Publication>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM publication WHERE publication_id = ?1",
            PUBLICATION_COLUMNS
        );
        let publication = conn
            .query_row(&sql, params![publication_id], map_publication)
            .optional()?;
        Ok(publication)
    }

    pub fn list_ids(&self) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT publication_id FROM publication ORDER BY publication_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn list_ids_in_years(&self, years: YearRange) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT publication_id FROM publication WHERE year BETWEEN ?1 AND ?2 ORDER BY publication_id",
        )?;
        let ids = stmt
            .query_map(params![years.from, years.to], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    // ===== 关联 =====

    pub fn insert_link(&self, link: &PublicationAuthorLink) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO publication_author_link (
                link_id, publication_id, author_id, discipline_id,
                affiliates, pinned, role, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                link.id,
                link.publication_id,
                link.author_id,
                link.discipline_id,
                link.affiliates as i64,
                link.pinned as i64,
                link.role.as_str(),
                link.position,
            ],
        )?;
        Ok(())
    }

    pub fn find_links(&self, publication_id: i64) -> RepositoryResult<Vec<PublicationAuthorLink>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM publication_author_link WHERE publication_id = ?1 ORDER BY position, link_id",
            LINK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let links = stmt
            .query_map(params![publication_id], map_link)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn find_link(&self, link_id: i64) -> RepositoryResult<Option<PublicationAuthorLink>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM publication_author_link WHERE link_id = ?1",
            LINK_COLUMNS
        );
        let link = conn.query_row(&sql, params![link_id], map_link).optional()?;
        Ok(link)
    }

    /// 查找 (成果, 作者, 学科) 的计入关联
    pub fn find_credited_link(
        &self,
        publication_id: i64,
        author_id: i64,
        discipline_id: i64,
    ) -> RepositoryResult<Option<PublicationAuthorLink>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM publication_author_link
            WHERE publication_id = ?1 AND author_id = ?2 AND discipline_id = ?3
              AND affiliates = 1 AND pinned = 1
            ORDER BY position, link_id
            LIMIT 1
            "#,
            LINK_COLUMNS
        );
        let link = conn
            .query_row(&sql, params![publication_id, author_id, discipline_id], map_link)
            .optional()?;
        Ok(link)
    }

    /// 批量设置 pinned（单事务）
    ///
    /// # 返回
    /// 实际发生变化的行数
    pub fn set_pinned(&self, link_ids: &[i64], pinned: bool) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut changed = 0;
        for link_id in link_ids {
            changed += tx.execute(
                "UPDATE publication_author_link SET pinned = ?1 WHERE link_id = ?2 AND pinned <> ?1",
                params![pinned as i64, link_id],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    /// 学科内当前计入的关联集合（快照/回滚比对用）
    pub fn pinned_link_ids(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<BTreeSet<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.link_id
            FROM publication_author_link l
            JOIN publication p ON p.publication_id = l.publication_id
            WHERE l.discipline_id = ?1 AND l.affiliates = 1 AND l.pinned = 1
              AND p.year BETWEEN ?2 AND ?3
            "#,
        )?;
        let ids = stmt
            .query_map(params![discipline_id, years.from, years.to], |row| row.get(0))?
            .collect::<Result<BTreeSet<i64>, _>>()?;
        Ok(ids)
    }

    /// 年度区间内未绑定但可计入的关联
    ///
    /// # 返回
    /// (link_id, publication_id) 列表
    pub fn unpinned_eligible_links(&self, years: YearRange) -> RepositoryResult<Vec<(i64, i64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.link_id, l.publication_id
            FROM publication_author_link l
            JOIN publication p ON p.publication_id = l.publication_id
            WHERE l.pinned = 0 AND l.affiliates = 1 AND l.discipline_id IS NOT NULL
              AND p.year BETWEEN ?1 AND ?2
            ORDER BY l.link_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![years.from, years.to], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(i64, i64)>, _>>()?;
        Ok(rows)
    }
}
