// ==========================================
// 科研成果评估系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod evaluation_config_trait;
pub mod settings;
pub mod solver_profile;

pub use config_manager::{config_keys, ConfigManager};
pub use evaluation_config_trait::EvaluationConfigReader;
pub use settings::EvaluationSettings;
pub use solver_profile::GeneticParameters;
