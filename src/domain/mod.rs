// ==========================================
// 科研成果评估系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod author;
pub mod metric;
pub mod optimization;
pub mod pin_change;
pub mod publication;
pub mod quota;
pub mod slot_cache;
pub mod types;

// 重导出核心类型
pub use author::{Author, AuthorDisciplineAssignment, Discipline};
pub use metric::AuthorMetric;
pub use optimization::{
    OptimizationAuthorResult, OptimizationOutcome, OptimizationPublication, OptimizationRun,
};
pub use pin_change::PinChange;
pub use publication::{Publication, PublicationAuthorLink};
pub use quota::{DisciplineQuota, QuotaRecord, YearRange};
pub use slot_cache::{AuthorWork, SlotCacheAuthor, SlotCacheDiscipline};
pub use types::{
    AuthorKind, ConvergenceState, CountMode, Era, PinAction, PublicationKind, ResponsibilityRole,
    RunStatus, Tier,
};
