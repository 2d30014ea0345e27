// ==========================================
// 科研成果评估系统 - 评估参数快照
// ==========================================
// 引擎是同步的：参数在入口处一次性异步读取，之后按值传递
// ==========================================

use crate::config::evaluation_config_trait::EvaluationConfigReader;
use crate::config::solver_profile::GeneticParameters;
use crate::engine::quota_calculator::QuotaParameters;
use crate::engine::slot_calculator::{DEFAULT_FIRST_EVALUATED_YEAR, DEFAULT_REFORM_YEAR};
use rust_decimal::Decimal;
use std::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSettings {
    pub reform_year: i32,
    pub first_evaluated_year: i32,
    pub quota: QuotaParameters,
    pub low_mono_threshold: Decimal,
    pub low_mono_max_pct: Decimal,
    pub outside_n_max_pct: Decimal,
    pub convergence_max_rounds: u32,
    pub min_slot_filled: Decimal,
    pub genetic: GeneticParameters,
    /// 写入 OptimizationRun.config_snapshot
    pub config_snapshot: Option<String>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            reform_year: DEFAULT_REFORM_YEAR,
            first_evaluated_year: DEFAULT_FIRST_EVALUATED_YEAR,
            quota: QuotaParameters::default(),
            low_mono_threshold: Decimal::from(200),
            low_mono_max_pct: Decimal::from(20),
            outside_n_max_pct: Decimal::from(20),
            convergence_max_rounds: 10,
            min_slot_filled: Decimal::new(8, 1),
            genetic: GeneticParameters::default(),
            config_snapshot: None,
        }
    }
}

impl EvaluationSettings {
    /// 从配置读取器加载全部参数
    pub async fn load(reader: &dyn EvaluationConfigReader) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            reform_year: reader.get_reform_year().await?,
            first_evaluated_year: reader.get_first_evaluated_year().await?,
            quota: QuotaParameters {
                min_n: reader.get_min_n().await?,
                author_max_slots: reader.get_author_max_slots().await?,
                author_max_mono_slots: reader.get_author_max_mono_slots().await?,
                institution_total_multiplier: reader.get_institution_total_multiplier().await?,
                institution_mono_multiplier: reader.get_institution_mono_multiplier().await?,
            },
            low_mono_threshold: reader.get_low_mono_threshold().await?,
            low_mono_max_pct: reader.get_low_mono_max_pct().await?,
            outside_n_max_pct: reader.get_outside_n_max_pct().await?,
            convergence_max_rounds: reader.get_convergence_max_rounds().await?,
            min_slot_filled: reader.get_min_slot_filled().await?,
            genetic: reader.get_genetic_parameters().await?,
            config_snapshot: None,
        })
    }

    pub fn with_snapshot(mut self, snapshot: String) -> Self {
        self.config_snapshot = Some(snapshot);
        self
    }

    pub fn with_min_n(mut self, min_n: Decimal) -> Self {
        self.quota.min_n = min_n;
        self
    }
}
