// ==========================================
// 科研成果评估系统 - 作者/学科/年度申报仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::author::{Author, AuthorDisciplineAssignment, Discipline};
use crate::domain::quota::YearRange;
use crate::repository::codec::{decimal_column, enum_column, optional_decimal_column};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

fn map_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthorDisciplineAssignment> {
    Ok(AuthorDisciplineAssignment {
        author_id: row.get(0)?,
        year: row.get(1)?,
        discipline_id: row.get(2)?,
        sub_discipline_id: row.get(3)?,
        employment_fraction: optional_decimal_column(row, 4)?,
        declared_share: decimal_column(row, 5)?,
        author_kind: enum_column(row, 6)?,
    })
}

pub struct AuthorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuthorRepository {
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

    pub fn insert_author(&self, author: &Author) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO author (author_id, name) VALUES (?1, ?2)",
            params![author.id, author.name],
        )?;
        Ok(())
    }

    pub fn find_author(&self, author_id: i64) -> RepositoryResult<Option<Author>> {
        let conn = self.get_conn()?;
        let author = conn
            .query_row(
                "SELECT author_id, name FROM author WHERE author_id = ?1",
                params![author_id],
                |row| {
                    Ok(Author {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(author)
    }

    pub fn insert_discipline(&self, discipline: &Discipline) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO discipline (discipline_id, code, name) VALUES (?1, ?2, ?3)",
            params![discipline.id, discipline.code, discipline.name],
        )?;
        Ok(())
    }

    pub fn list_disciplines(&self) -> RepositoryResult<Vec<Discipline>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT discipline_id, code, name FROM discipline ORDER BY discipline_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Discipline {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 写入或更正年度申报
    pub fn upsert_assignment(&self, a: &AuthorDisciplineAssignment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO author_discipline_assignment (
                author_id, year, discipline_id, sub_discipline_id,
                employment_fraction, declared_share, author_kind
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(author_id, year, discipline_id) DO UPDATE SET
                sub_discipline_id = excluded.sub_discipline_id,
                employment_fraction = excluded.employment_fraction,
                declared_share = excluded.declared_share,
                author_kind = excluded.author_kind
            "#,
            params![
                a.author_id,
                a.year,
                a.discipline_id,
                a.sub_discipline_id,
                a.employment_fraction.map(|d| d.to_string()),
                a.declared_share.to_string(),
                a.author_kind.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn assignments_for_discipline(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> RepositoryResult<Vec<AuthorDisciplineAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT author_id, year, discipline_id, sub_discipline_id,
                   employment_fraction, declared_share, author_kind
            FROM author_discipline_assignment
            WHERE discipline_id = ?1 AND year BETWEEN ?2 AND ?3
            ORDER BY author_id, year
            "#,
        )?;
        let rows = stmt
            .query_map(params![discipline_id, years.from, years.to], map_assignment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 区间内有申报的学科
    pub fn discipline_ids_with_assignments(&self, years: YearRange) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT discipline_id FROM author_discipline_assignment
            WHERE year BETWEEN ?1 AND ?2
            ORDER BY discipline_id
            "#,
        )?;
        let ids = stmt
            .query_map(params![years.from, years.to], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}
