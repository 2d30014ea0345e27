// ==========================================
// 科研成果评估系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 评估辅助（结果供人工复核，不自动上报）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 评估规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AuthorKind, ConvergenceState, CountMode, Era, PinAction, PublicationKind, ResponsibilityRole,
    RunStatus, Tier,
};

// 领域实体
pub use domain::{
    AuthorMetric, OptimizationOutcome, Publication, PublicationAuthorLink, QuotaRecord, YearRange,
};

// 引擎
pub use engine::{
    BatchRunner, ConvergenceController, DisciplineOptimizer, EngineError, EvaluationRepositories,
    MetricsAggregator, PointsCache, QuotaCalculator, SlotCalculator, SolverStrategy,
};

// 配置
pub use config::{ConfigManager, EvaluationSettings};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "科研成果评估系统";
