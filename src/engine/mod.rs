// ==========================================
// 科研成果评估系统 - 引擎层
// ==========================================
// 职责: 实现评估规则（槽位、额度、选优、收敛、指标），不拼 SQL
// 红线: 引擎只通过仓储读写；规则不适用时显式报错，不静默跳过
// ==========================================

pub mod batch;
pub mod convergence;
pub mod discipline_optimizer;
pub mod error;
pub mod events;
pub mod metrics;
pub mod points_cache;
pub mod quota_calculator;
pub mod repositories;
pub mod slot_calculator;
pub mod solver;
pub mod strategy;

// 重导出核心引擎
pub use batch::{BatchRunner, DisciplineBatchResult};
pub use convergence::{
    ConvergenceController, ConvergenceOptions, ConvergenceReport, RoundRecord, WeakLink,
};
pub use discipline_optimizer::DisciplineOptimizer;
pub use error::{EngineError, EngineResult};
pub use events::{
    ConvergenceEvent, ConvergenceEventPublisher, ConvergenceEventType, OptionalEventPublisher,
};
pub use metrics::MetricsAggregator;
pub use points_cache::{PointsCache, RebuildSummary, ResetPinsSummary};
pub use quota_calculator::{DisciplineQuotaResult, QuotaCalculator, QuotaParameters};
pub use repositories::EvaluationRepositories;
pub use slot_calculator::{PublicationSlots, SlotCalculator};
pub use solver::{Candidate, GeneticSolver, KnapsackSolver, Selection, SelectionSolver};
pub use strategy::SolverStrategy;
