// ==========================================
// 科研成果评估系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 约定: 缺失或格式错误的配置一律回退默认值
// ==========================================

use crate::config::evaluation_config_trait::EvaluationConfigReader;
use crate::config::solver_profile::GeneticParameters;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    fn get_decimal_or_default(&self, key: &str, default: &str) -> Result<Decimal, Box<dyn Error>> {
        let value = self.get_config_or_default(key, default)?;
        match Decimal::from_str(value.trim()) {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %value, "配置格式错误，使用默认值");
                Ok(Decimal::from_str(default)?)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 每次选优运行记录配置快照，保证结果可复现
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

// ==========================================
// EvaluationConfigReader Trait 实现
// ==========================================
#[async_trait]
impl EvaluationConfigReader for ConfigManager {
    async fn get_reform_year(&self) -> Result<i32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::REFORM_YEAR, "2019")?;
        Ok(value.trim().parse::<i32>().unwrap_or(2019))
    }

    async fn get_first_evaluated_year(&self) -> Result<i32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::FIRST_EVALUATED_YEAR, "2017")?;
        Ok(value.trim().parse::<i32>().unwrap_or(2017))
    }

    async fn get_min_n(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::MIN_N, "12")
    }

    async fn get_author_max_slots(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::AUTHOR_MAX_SLOTS, "4")
    }

    async fn get_author_max_mono_slots(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::AUTHOR_MAX_MONO_SLOTS, "2")
    }

    async fn get_institution_total_multiplier(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::INSTITUTION_TOTAL_MULTIPLIER, "3")
    }

    async fn get_institution_mono_multiplier(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::INSTITUTION_MONO_MULTIPLIER, "0.8")
    }

    async fn get_low_mono_threshold(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::LOW_MONO_THRESHOLD, "200")
    }

    async fn get_low_mono_max_pct(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::LOW_MONO_MAX_PCT, "20")
    }

    async fn get_outside_n_max_pct(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::OUTSIDE_N_MAX_PCT, "20")
    }

    async fn get_convergence_max_rounds(&self) -> Result<u32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::CONVERGENCE_MAX_ROUNDS, "10")?;
        Ok(value.trim().parse::<u32>().unwrap_or(10))
    }

    async fn get_min_slot_filled(&self) -> Result<Decimal, Box<dyn Error>> {
        self.get_decimal_or_default(config_keys::MIN_SLOT_FILLED, "0.8")
    }

    async fn get_genetic_parameters(&self) -> Result<GeneticParameters, Box<dyn Error>> {
        let raw = match self.get_config_value(config_keys::GENETIC_PROFILE)? {
            Some(v) => v,
            None => return Ok(GeneticParameters::default()),
        };
        let params = serde_json::from_str::<GeneticParameters>(&raw).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::GENETIC_PROFILE,
                raw_value = %raw,
                "遗传参数配置格式错误，使用默认参数"
            );
            GeneticParameters::default()
        });
        Ok(params.normalized())
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 规则时期
    pub const REFORM_YEAR: &str = "reform_year";
    pub const FIRST_EVALUATED_YEAR: &str = "first_evaluated_year";

    // 额度
    pub const MIN_N: &str = "min_n";
    pub const AUTHOR_MAX_SLOTS: &str = "author_max_slots";
    pub const AUTHOR_MAX_MONO_SLOTS: &str = "author_max_mono_slots";
    pub const INSTITUTION_TOTAL_MULTIPLIER: &str = "institution_total_multiplier";
    pub const INSTITUTION_MONO_MULTIPLIER: &str = "institution_mono_multiplier";

    // 校验
    pub const LOW_MONO_THRESHOLD: &str = "low_mono_threshold";
    pub const LOW_MONO_MAX_PCT: &str = "low_mono_max_pct";
    pub const OUTSIDE_N_MAX_PCT: &str = "outside_n_max_pct";

    // 收敛
    pub const CONVERGENCE_MAX_ROUNDS: &str = "convergence_max_rounds";
    pub const MIN_SLOT_FILLED: &str = "min_slot_filled";

    // 求解器
    pub const GENETIC_PROFILE: &str = "genetic_profile"; // GeneticParameters (JSON)
}
