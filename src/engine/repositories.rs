// ==========================================
// 科研成果评估系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合评估引擎所需的所有 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db::open_sqlite_connection;
use crate::repository::{
    AuthorRepository, MetricRepository, OptimizationRepository, PinLogRepository,
    PublicationRepository, QuotaRepository, RepositoryResult, SlotCacheRepository,
};

/// 评估引擎仓储集合
///
/// 同一集合内的仓储共享一个连接；批量任务中每个学科各自打开一个集合。
#[derive(Clone)]
pub struct EvaluationRepositories {
    pub publication_repo: Arc<PublicationRepository>,
    pub author_repo: Arc<AuthorRepository>,
    pub slot_cache_repo: Arc<SlotCacheRepository>,
    pub quota_repo: Arc<QuotaRepository>,
    pub optimization_repo: Arc<OptimizationRepository>,
    pub metric_repo: Arc<MetricRepository>,
    pub pin_log_repo: Arc<PinLogRepository>,
}

impl EvaluationRepositories {
    /// 打开数据库并创建仓储集合
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            publication_repo: Arc::new(PublicationRepository::from_connection(conn.clone())),
            author_repo: Arc::new(AuthorRepository::from_connection(conn.clone())),
            slot_cache_repo: Arc::new(SlotCacheRepository::from_connection(conn.clone())),
            quota_repo: Arc::new(QuotaRepository::from_connection(conn.clone())),
            optimization_repo: Arc::new(OptimizationRepository::from_connection(conn.clone())),
            metric_repo: Arc::new(MetricRepository::from_connection(conn.clone())),
            pin_log_repo: Arc::new(PinLogRepository::from_connection(conn)),
        }
    }
}

// 注: EvaluationRepositories 的正确性由 tests/ 下的集成测试验证。
