// ==========================================
// 科研成果评估系统 - 全校批量选优
// ==========================================
// 学科之间并发（各自独立连接，运行于阻塞线程池）
// 学科内部严格串行（收敛循环逐轮依赖）
// 单个学科失败不影响其他学科
// ==========================================

use crate::config::settings::EvaluationSettings;
use crate::domain::quota::YearRange;
use crate::engine::convergence::{ConvergenceController, ConvergenceOptions, ConvergenceReport};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::EvaluationRepositories;
use futures::future::join_all;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{error, info};

/// 单学科批量结果
#[derive(Debug)]
pub struct DisciplineBatchResult {
    pub discipline_id: i64,
    pub result: Result<ConvergenceReport, EngineError>,
}

impl DisciplineBatchResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct BatchRunner {
    db_path: String,
    settings: EvaluationSettings,
}

impl BatchRunner {
    pub fn new(db_path: impl Into<String>, settings: EvaluationSettings) -> Self {
        Self {
            db_path: db_path.into(),
            settings,
        }
    }

    /// 对区间内有作者分配的全部学科运行收敛循环
    pub async fn run_all(
        &self,
        years: YearRange,
        options: ConvergenceOptions,
        cancel: Arc<AtomicBool>,
    ) -> EngineResult<Vec<DisciplineBatchResult>> {
        let disciplines = EvaluationRepositories::open(&self.db_path)?
            .author_repo
            .discipline_ids_with_assignments(years)?;

        info!(
            count = disciplines.len(),
            strategy = options.strategy.as_str(),
            unpin = options.unpin,
            "开始全校批量选优"
        );

        let tasks = disciplines.into_iter().map(|discipline_id| {
            let db_path = self.db_path.clone();
            let settings = self.settings.clone();
            let options = options.clone();
            let cancel = cancel.clone();
            async move {
                let handle = tokio::task::spawn_blocking(move || -> EngineResult<ConvergenceReport> {
                    let repos = EvaluationRepositories::open(&db_path)?;
                    ConvergenceController::new(repos, settings)
                        .with_cancel_flag(cancel)
                        .run(discipline_id, years, &options)
                });
                let result = match handle.await {
                    Ok(r) => r,
                    Err(e) => Err(EngineError::TaskFailed(e.to_string())),
                };
                if let Err(ref e) = result {
                    error!(discipline_id, error = %e, "学科选优失败");
                }
                DisciplineBatchResult {
                    discipline_id,
                    result,
                }
            }
        });

        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| !r.is_ok()).count(),
            "全校批量选优完成"
        );
        Ok(results)
    }
}
