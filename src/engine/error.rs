// ==========================================
// 科研成果评估系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 求解器超时不是错误（Selection.is_optimal = false 表示尽力解）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 规则错误 =====
    /// 分值非正或年份无法确定规则时期；修正数据后可恢复，不自动重试
    #[error("规则不适用: {reason} (publication_id={publication_id:?})")]
    InapplicableRule {
        publication_id: Option<i64>,
        reason: String,
    },

    /// 作者该年度无工作量比例；调用方应跳过该作者
    #[error("额度不可用: author_id={author_id}, discipline_id={discipline_id}")]
    QuotaUnavailable { author_id: i64, discipline_id: i64 },

    // ===== 收敛循环错误 =====
    #[error(
        "绑定回滚失败: discipline_id={discipline_id}, 未恢复={missing:?}, 意外绑定={unexpected:?}"
    )]
    ConvergenceRollbackFailure {
        discipline_id: i64,
        missing: Vec<i64>,
        unexpected: Vec<i64>,
    },

    #[error("任务已取消: discipline_id={0}")]
    Cancelled(i64),

    #[error("后台任务失败: {0}")]
    TaskFailed(String),

    // ===== 基础设施错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn inapplicable(publication_id: Option<i64>, reason: impl Into<String>) -> Self {
        EngineError::InapplicableRule {
            publication_id,
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
