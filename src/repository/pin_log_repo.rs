// ==========================================
// 科研成果评估系统 - 绑定变更日志仓储
// ==========================================
// 只追加，不修改
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::pin_change::PinChange;
use crate::domain::types::PinAction;
use crate::repository::codec::{datetime_column, enum_column, format_datetime};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

fn map_change(row: &rusqlite::Row<'_>) -> rusqlite::Result<PinChange> {
    Ok(PinChange {
        round_id: row.get(0)?,
        discipline_id: row.get(1)?,
        link_id: row.get(2)?,
        action: enum_column(row, 3)?,
        detail: row.get(4)?,
        changed_at: datetime_column(row, 5)?,
    })
}

pub struct PinLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PinLogRepository {
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

    pub fn record(&self, changes: &[PinChange]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for c in changes {
            tx.execute(
                r#"
                INSERT INTO pin_change_log (round_id, discipline_id, link_id, action, detail, changed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    c.round_id,
                    c.discipline_id,
                    c.link_id,
                    c.action.as_str(),
                    c.detail,
                    format_datetime(&c.changed_at),
                ],
            )?;
        }
        tx.commit()?;
        Ok(changes.len())
    }

    pub fn find_by_round(&self, round_id: &str) -> RepositoryResult<Vec<PinChange>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT round_id, discipline_id, link_id, action, detail, changed_at
            FROM pin_change_log
            WHERE round_id = ?1
            ORDER BY log_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![round_id], map_change)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_by_discipline(
        &self,
        discipline_id: i64,
        action: Option<PinAction>,
    ) -> RepositoryResult<Vec<PinChange>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT round_id, discipline_id, link_id, action, detail, changed_at
            FROM pin_change_log
            WHERE discipline_id = ?1 AND (?2 IS NULL OR action = ?2)
            ORDER BY log_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![discipline_id, action.map(|a| a.as_str())], map_change)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
