// ==========================================
// 科研成果评估系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod author_repo;
pub mod codec;
pub mod error;
pub mod metric_repo;
pub mod optimization_repo;
pub mod pin_log_repo;
pub mod publication_repo;
pub mod quota_repo;
pub mod slot_cache_repo;

pub use author_repo::AuthorRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use metric_repo::MetricRepository;
pub use optimization_repo::OptimizationRepository;
pub use pin_log_repo::PinLogRepository;
pub use publication_repo::PublicationRepository;
pub use quota_repo::QuotaRepository;
pub use slot_cache_repo::SlotCacheRepository;
