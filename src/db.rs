// ==========================================
// 科研成果评估系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等建表（CREATE TABLE IF NOT EXISTS）
// 约定: 定点小数一律以 TEXT 存储，由仓储层解析为 rust_decimal::Decimal
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置（批量任务各学科各自持有连接）
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化全部表结构（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 组织数据 =====
CREATE TABLE IF NOT EXISTS discipline (
    discipline_id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS author (
    author_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS author_discipline_assignment (
    author_id INTEGER NOT NULL REFERENCES author(author_id),
    year INTEGER NOT NULL,
    discipline_id INTEGER NOT NULL REFERENCES discipline(discipline_id),
    sub_discipline_id INTEGER REFERENCES discipline(discipline_id),
    employment_fraction TEXT,
    declared_share TEXT NOT NULL,
    author_kind TEXT NOT NULL,
    PRIMARY KEY (author_id, year, discipline_id)
);

-- ===== 成果数据 =====
CREATE TABLE IF NOT EXISTS publication (
    publication_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    kind TEXT NOT NULL,
    year INTEGER NOT NULL,
    points TEXT NOT NULL,
    parent_id INTEGER REFERENCES publication(publication_id)
);

CREATE TABLE IF NOT EXISTS publication_author_link (
    link_id INTEGER PRIMARY KEY,
    publication_id INTEGER NOT NULL REFERENCES publication(publication_id),
    author_id INTEGER NOT NULL REFERENCES author(author_id),
    discipline_id INTEGER REFERENCES discipline(discipline_id),
    affiliates INTEGER NOT NULL DEFAULT 1,
    pinned INTEGER NOT NULL DEFAULT 1,
    role TEXT NOT NULL DEFAULT 'AUTHOR',
    position INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_link_publication ON publication_author_link(publication_id);
CREATE INDEX IF NOT EXISTS idx_link_discipline ON publication_author_link(discipline_id);

-- ===== 派生缓存 =====
CREATE TABLE IF NOT EXISTS slot_cache_discipline (
    publication_id INTEGER NOT NULL,
    discipline_id INTEGER NOT NULL,
    tier TEXT NOT NULL,
    multiplier TEXT NOT NULL,
    points_share TEXT NOT NULL,
    PRIMARY KEY (publication_id, discipline_id)
);

CREATE TABLE IF NOT EXISTS slot_cache_author (
    publication_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    discipline_id INTEGER NOT NULL,
    slot TEXT NOT NULL,
    points TEXT NOT NULL,
    PRIMARY KEY (publication_id, author_id)
);
CREATE INDEX IF NOT EXISTS idx_slot_cache_author_discipline ON slot_cache_author(discipline_id, author_id);

CREATE TABLE IF NOT EXISTS discipline_quota (
    discipline_id INTEGER NOT NULL,
    year_from INTEGER NOT NULL,
    year_to INTEGER NOT NULL,
    n_value TEXT NOT NULL,
    institution_total_ceiling TEXT NOT NULL,
    institution_mono_ceiling TEXT NOT NULL,
    excluded INTEGER NOT NULL,
    PRIMARY KEY (discipline_id, year_from, year_to)
);

CREATE TABLE IF NOT EXISTS quota_record (
    author_id INTEGER NOT NULL,
    discipline_id INTEGER NOT NULL,
    year_from INTEGER NOT NULL,
    year_to INTEGER NOT NULL,
    n_value TEXT NOT NULL,
    author_share TEXT NOT NULL,
    total_slot_ceiling TEXT NOT NULL,
    mono_slot_ceiling TEXT NOT NULL,
    in_n INTEGER NOT NULL,
    PRIMARY KEY (author_id, discipline_id, year_from, year_to)
);

-- ===== 选优结果 =====
CREATE TABLE IF NOT EXISTS optimization_run (
    run_id TEXT PRIMARY KEY,
    discipline_id INTEGER NOT NULL,
    institution TEXT NOT NULL,
    year_from INTEGER NOT NULL,
    year_to INTEGER NOT NULL,
    strategy TEXT NOT NULL,
    status TEXT NOT NULL,
    total_points TEXT NOT NULL,
    total_slots TEXT NOT NULL,
    mono_slots TEXT NOT NULL,
    publication_count INTEGER NOT NULL,
    low_mono_count INTEGER NOT NULL,
    low_mono_percentage TEXT NOT NULL,
    outside_n_percentage TEXT NOT NULL,
    validation_passed INTEGER NOT NULL,
    is_optimal INTEGER NOT NULL,
    config_snapshot TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_run_discipline ON optimization_run(discipline_id);

CREATE TABLE IF NOT EXISTS optimization_author_result (
    run_id TEXT NOT NULL REFERENCES optimization_run(run_id) ON DELETE CASCADE,
    author_id INTEGER NOT NULL,
    points_achieved TEXT NOT NULL,
    slots_achieved TEXT NOT NULL,
    mono_slots_achieved TEXT NOT NULL,
    total_slot_ceiling TEXT NOT NULL,
    mono_slot_ceiling TEXT NOT NULL,
    PRIMARY KEY (run_id, author_id)
);

CREATE TABLE IF NOT EXISTS optimization_publication (
    run_id TEXT NOT NULL REFERENCES optimization_run(run_id) ON DELETE CASCADE,
    author_id INTEGER NOT NULL,
    publication_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    points TEXT NOT NULL,
    slot_cost TEXT NOT NULL,
    is_low_mono INTEGER NOT NULL,
    PRIMARY KEY (run_id, author_id, publication_id)
);

-- ===== 指标 =====
CREATE TABLE IF NOT EXISTS author_metric (
    author_id INTEGER NOT NULL,
    discipline_id INTEGER NOT NULL,
    year_from INTEGER NOT NULL,
    year_to INTEGER NOT NULL,
    slot_ceiling TEXT NOT NULL,
    slot_achieved TEXT NOT NULL,
    points_achieved TEXT NOT NULL,
    avg_points_per_slot TEXT NOT NULL,
    slot_achieved_all_works TEXT NOT NULL,
    points_achieved_all_works TEXT NOT NULL,
    avg_points_per_slot_all_works TEXT NOT NULL,
    utilization_pct TEXT NOT NULL,
    selected_publication_ids TEXT NOT NULL,
    unselected_publication_ids TEXT NOT NULL,
    PRIMARY KEY (author_id, discipline_id)
);

-- ===== 绑定变更日志 =====
CREATE TABLE IF NOT EXISTS pin_change_log (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    round_id TEXT NOT NULL,
    discipline_id INTEGER,
    link_id INTEGER NOT NULL,
    action TEXT NOT NULL,
    detail TEXT,
    changed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pin_log_round ON pin_change_log(round_id);
"#;
