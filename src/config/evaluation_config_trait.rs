// ==========================================
// 科研成果评估系统 - 评估配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::solver_profile::GeneticParameters;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::error::Error;

// ==========================================
// EvaluationConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait EvaluationConfigReader: Send + Sync {
    // ===== 规则时期 =====

    /// 改革年份（该年及以后使用 B 时期分档表）
    ///
    /// # 默认值
    /// - 2019
    async fn get_reform_year(&self) -> Result<i32, Box<dyn Error>>;

    /// 最早可确定规则时期的年份
    ///
    /// # 默认值
    /// - 2017
    async fn get_first_evaluated_year(&self) -> Result<i32, Box<dyn Error>>;

    // ===== 额度 =====

    /// 学科最小 N（低于则整体排除）
    ///
    /// # 默认值
    /// - 12
    async fn get_min_n(&self) -> Result<Decimal, Box<dyn Error>>;

    async fn get_author_max_slots(&self) -> Result<Decimal, Box<dyn Error>>;

    async fn get_author_max_mono_slots(&self) -> Result<Decimal, Box<dyn Error>>;

    /// 机构总槽位 = 倍数 × N
    ///
    /// # 默认值
    /// - 3.0
    async fn get_institution_total_multiplier(&self) -> Result<Decimal, Box<dyn Error>>;

    /// 机构专著槽位 = 倍数 × N
    ///
    /// # 默认值
    /// - 0.8
    async fn get_institution_mono_multiplier(&self) -> Result<Decimal, Box<dyn Error>>;

    // ===== 校验 =====

    /// 低分专著阈值（分值低于该值的专著类成果）
    ///
    /// # 默认值
    /// - 200
    async fn get_low_mono_threshold(&self) -> Result<Decimal, Box<dyn Error>>;

    async fn get_low_mono_max_pct(&self) -> Result<Decimal, Box<dyn Error>>;

    async fn get_outside_n_max_pct(&self) -> Result<Decimal, Box<dyn Error>>;

    // ===== 收敛循环 =====

    /// # 默认值
    /// - 10
    async fn get_convergence_max_rounds(&self) -> Result<u32, Box<dyn Error>>;

    /// 饱和判定比例（已用槽位 ≥ 比例 × 上限）
    ///
    /// # 默认值
    /// - 0.8
    async fn get_min_slot_filled(&self) -> Result<Decimal, Box<dyn Error>>;

    // ===== 求解器 =====

    /// 遗传策略参数（JSON），缺失或格式错误时使用默认参数
    async fn get_genetic_parameters(&self) -> Result<GeneticParameters, Box<dyn Error>>;
}
