// ==========================================
// 科研成果评估系统 - 收敛控制
// ==========================================
// 状态机: INITIAL → SOLVING → EVALUATING → {ACCEPTED, REJECTED} → (SOLVING | TERMINAL)
// 规则:
// - 得分 ≥ 历史最优: ACCEPTED，保存为新最优；可选解除弱绑定后继续
// - 得分 < 历史最优: REJECTED，恢复本轮解除的绑定（须与解除前快照完全一致）后终止
// - 本轮无可解除绑定 / 达到最大轮数: TERMINAL
// 单学科内严格串行：每轮依赖上一轮已保存的状态
// ==========================================

use crate::config::settings::EvaluationSettings;
use crate::domain::optimization::OptimizationOutcome;
use crate::domain::pin_change::PinChange;
use crate::domain::quota::YearRange;
use crate::domain::slot_cache::AuthorWork;
use crate::domain::types::{ConvergenceState, PinAction};
use crate::engine::discipline_optimizer::DisciplineOptimizer;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{
    ConvergenceEvent, ConvergenceEventPublisher, ConvergenceEventType, OptionalEventPublisher,
};
use crate::engine::points_cache::PointsCache;
use crate::engine::repositories::EvaluationRepositories;
use crate::engine::slot_calculator::SlotCalculator;
use crate::engine::strategy::SolverStrategy;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 单学科收敛参数
#[derive(Debug, Clone)]
pub struct ConvergenceOptions {
    pub strategy: SolverStrategy,
    /// 是否在轮间解除弱绑定
    pub unpin: bool,
    pub institution: String,
}

impl Default for ConvergenceOptions {
    fn default() -> Self {
        Self {
            strategy: SolverStrategy::default(),
            unpin: false,
            institution: String::from("default"),
        }
    }
}

/// 单轮记录
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub round: u32,
    pub state: ConvergenceState,
    pub total_points: Decimal,
    /// 本轮评估后解除的关联
    pub detached: Vec<i64>,
}

/// 收敛结果
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    pub discipline_id: i64,
    /// N 低于下限而未参与
    pub excluded: bool,
    /// 开始前已保存的最新运行得分
    pub baseline_points: Option<Decimal>,
    pub rounds: Vec<RoundRecord>,
    pub best: Option<OptimizationOutcome>,
    /// 回滚恢复的关联
    pub restored: Vec<i64>,
    pub final_state: ConvergenceState,
}

impl ConvergenceReport {
    pub fn best_points(&self) -> Decimal {
        self.best
            .as_ref()
            .map(|o| o.run.total_points)
            .unwrap_or(Decimal::ZERO)
    }
}

/// 弱绑定：作者已饱和且本次未选该成果，而同学科合作者仍有空余槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeakLink {
    pub author_id: i64,
    pub publication_id: i64,
}

/// 比对期望与实际绑定集合，返回 (未恢复, 意外绑定)
pub fn diff_pin_sets(
    expected: &BTreeSet<i64>,
    actual: &BTreeSet<i64>,
) -> Option<(Vec<i64>, Vec<i64>)> {
    if expected == actual {
        return None;
    }
    let missing = expected.difference(actual).copied().collect();
    let unexpected = actual.difference(expected).copied().collect();
    Some((missing, unexpected))
}

/// 从最新结果中识别弱绑定
pub fn find_weak_links(
    outcome: &OptimizationOutcome,
    works: &[AuthorWork],
    min_slot_filled: Decimal,
) -> Vec<WeakLink> {
    let selected: HashSet<(i64, i64)> = outcome
        .publications
        .iter()
        .map(|p| (p.author_id, p.publication_id))
        .collect();

    let saturated = |author_id: i64| {
        outcome
            .author_result(author_id)
            .map(|r| r.slots_achieved >= min_slot_filled * r.total_slot_ceiling)
            .unwrap_or(false)
    };
    let has_capacity = |author_id: i64| {
        outcome
            .author_result(author_id)
            .map(|r| r.slots_achieved < r.total_slot_ceiling)
            .unwrap_or(false)
    };

    let mut by_publication: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for w in works {
        by_publication.entry(w.publication_id).or_default().push(w.author_id);
    }

    let mut weak = Vec::new();
    for (publication_id, authors) in &by_publication {
        for &author_id in authors {
            if selected.contains(&(author_id, *publication_id)) || !saturated(author_id) {
                continue;
            }
            let coauthor_can_use = authors
                .iter()
                .any(|&other| other != author_id && has_capacity(other));
            if coauthor_can_use {
                weak.push(WeakLink {
                    author_id,
                    publication_id: *publication_id,
                });
            }
        }
    }
    weak
}

pub struct ConvergenceController {
    repos: EvaluationRepositories,
    settings: EvaluationSettings,
    optimizer: DisciplineOptimizer,
    cache: PointsCache,
    cancel: Option<Arc<AtomicBool>>,
    events: OptionalEventPublisher,
}

impl ConvergenceController {
    pub fn new(repos: EvaluationRepositories, settings: EvaluationSettings) -> Self {
        let calculator = SlotCalculator::new(settings.reform_year, settings.first_evaluated_year);
        Self {
            optimizer: DisciplineOptimizer::new(repos.clone(), settings.clone()),
            cache: PointsCache::new(repos.clone(), calculator),
            repos,
            settings,
            cancel: None,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn ConvergenceEventPublisher>) -> Self {
        self.events = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    /// 轮间检查的取消标志
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn transition(discipline_id: i64, from: &mut ConvergenceState, to: ConvergenceState) {
        if !from.can_transition_to(to) {
            warn!(discipline_id, from = %from, to = %to, "非法状态迁移");
        }
        debug!(discipline_id, from = %from, to = %to, "状态迁移");
        *from = to;
    }

    #[instrument(skip(self, options), fields(strategy = options.strategy.as_str(), unpin = options.unpin))]
    pub fn run(
        &self,
        discipline_id: i64,
        years: YearRange,
        options: &ConvergenceOptions,
    ) -> EngineResult<ConvergenceReport> {
        let mut state = ConvergenceState::Initial;
        let baseline_points = self
            .repos
            .optimization_repo
            .latest_run(discipline_id)?
            .map(|r| r.total_points);

        let mut report = ConvergenceReport {
            discipline_id,
            excluded: false,
            baseline_points,
            rounds: Vec::new(),
            best: None,
            restored: Vec::new(),
            final_state: ConvergenceState::Initial,
        };

        // 本轮解除的关联及解除前快照
        let mut pending: Option<(String, Vec<i64>, BTreeSet<i64>)> = None;
        let max_rounds = self.settings.convergence_max_rounds.max(1);

        for round in 1..=max_rounds {
            if self.is_cancelled() {
                warn!(discipline_id, round, "收到取消信号");
                return Err(EngineError::Cancelled(discipline_id));
            }

            Self::transition(discipline_id, &mut state, ConvergenceState::Solving);
            let outcome = match self.optimizer.solve(
                discipline_id,
                years,
                options.strategy,
                &options.institution,
            )? {
                Some(o) => o,
                None => {
                    info!(discipline_id, "学科 N 低于下限，不参与评估");
                    report.excluded = true;
                    report.final_state = ConvergenceState::Terminal;
                    return Ok(report);
                }
            };

            Self::transition(discipline_id, &mut state, ConvergenceState::Evaluating);
            let score = outcome.run.total_points;
            let best_score = report.best.as_ref().map(|b| b.run.total_points);

            if best_score.is_some_and(|best| score < best) {
                Self::transition(discipline_id, &mut state, ConvergenceState::Rejected);
                info!(discipline_id, round, score = %score, "得分下降，回滚本轮解除");
                self.events.publish(ConvergenceEvent::round_result(
                    discipline_id,
                    round,
                    ConvergenceEventType::RoundRejected,
                    score,
                ));
                if let Some((round_id, detached, snapshot)) = pending.take() {
                    self.rollback(discipline_id, years, &round_id, &detached, &snapshot)?;
                    self.events.publish(ConvergenceEvent::pin_change(
                        discipline_id,
                        round,
                        ConvergenceEventType::LinksRestored,
                        &round_id,
                        &detached,
                    ));
                    report.restored = detached;
                }
                report.rounds.push(RoundRecord {
                    round,
                    state: ConvergenceState::Rejected,
                    total_points: score,
                    detached: Vec::new(),
                });
                break;
            }

            Self::transition(discipline_id, &mut state, ConvergenceState::Accepted);
            self.optimizer.persist(&outcome)?;
            pending = None;
            info!(discipline_id, round, score = %score, "本轮结果已接受");
            self.events.publish(ConvergenceEvent::round_result(
                discipline_id,
                round,
                ConvergenceEventType::RoundAccepted,
                score,
            ));

            let mut detached = Vec::new();
            if options.unpin && round < max_rounds {
                if let Some((round_id, ids, snapshot)) = self.detach_weak(discipline_id, years, &outcome)? {
                    self.events.publish(ConvergenceEvent::pin_change(
                        discipline_id,
                        round,
                        ConvergenceEventType::LinksDetached,
                        &round_id,
                        &ids,
                    ));
                    detached = ids.clone();
                    pending = Some((round_id, ids, snapshot));
                }
            }

            report.rounds.push(RoundRecord {
                round,
                state: ConvergenceState::Accepted,
                total_points: score,
                detached: detached.clone(),
            });
            report.best = Some(outcome);

            if detached.is_empty() {
                break;
            }
        }

        Self::transition(discipline_id, &mut state, ConvergenceState::Terminal);
        report.final_state = state;
        info!(
            discipline_id,
            rounds = report.rounds.len(),
            best_points = %report.best_points(),
            "收敛结束"
        );
        Ok(report)
    }

    /// 解除弱绑定并重建缓存；无可解除时返回 None
    fn detach_weak(
        &self,
        discipline_id: i64,
        years: YearRange,
        outcome: &OptimizationOutcome,
    ) -> EngineResult<Option<(String, Vec<i64>, BTreeSet<i64>)>> {
        let works = self
            .repos
            .slot_cache_repo
            .author_works_for_discipline(discipline_id, years)?;
        let weak = find_weak_links(outcome, &works, self.settings.min_slot_filled);
        if weak.is_empty() {
            return Ok(None);
        }

        let mut link_ids = Vec::new();
        let mut publications = BTreeSet::new();
        for w in &weak {
            if let Some(link) = self.repos.publication_repo.find_credited_link(
                w.publication_id,
                w.author_id,
                discipline_id,
            )? {
                link_ids.push(link.id);
                publications.insert(w.publication_id);
            }
        }
        if link_ids.is_empty() {
            return Ok(None);
        }

        let snapshot = self.repos.publication_repo.pinned_link_ids(discipline_id, years)?;
        let round_id = Uuid::new_v4().to_string();
        self.repos.publication_repo.set_pinned(&link_ids, false)?;
        self.log_changes(&round_id, discipline_id, &link_ids, PinAction::Detach)?;

        let affected: Vec<i64> = publications.into_iter().collect();
        self.cache.rebuild_many(&affected)?;

        info!(discipline_id, round_id = %round_id, detached = link_ids.len(), "已解除弱绑定");
        Ok(Some((round_id, link_ids, snapshot)))
    }

    fn rollback(
        &self,
        discipline_id: i64,
        years: YearRange,
        round_id: &str,
        detached: &[i64],
        snapshot: &BTreeSet<i64>,
    ) -> EngineResult<()> {
        self.repos.publication_repo.set_pinned(detached, true)?;
        self.log_changes(round_id, discipline_id, detached, PinAction::Restore)?;

        let current = self.repos.publication_repo.pinned_link_ids(discipline_id, years)?;
        if let Some((missing, unexpected)) = diff_pin_sets(snapshot, &current) {
            return Err(EngineError::ConvergenceRollbackFailure {
                discipline_id,
                missing,
                unexpected,
            });
        }

        let mut publications = BTreeSet::new();
        for &link_id in detached {
            if let Some(link) = self.repos.publication_repo.find_link(link_id)? {
                publications.insert(link.publication_id);
            }
        }
        let affected: Vec<i64> = publications.into_iter().collect();
        self.cache.rebuild_many(&affected)?;
        Ok(())
    }

    fn log_changes(
        &self,
        round_id: &str,
        discipline_id: i64,
        link_ids: &[i64],
        action: PinAction,
    ) -> EngineResult<()> {
        let now = Utc::now().naive_utc();
        let changes: Vec<PinChange> = link_ids
            .iter()
            .map(|&link_id| PinChange {
                round_id: round_id.to_string(),
                discipline_id: Some(discipline_id),
                link_id,
                action,
                detail: None,
                changed_at: now,
            })
            .collect();
        self.repos.pin_log_repo.record(&changes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{OptimizationAuthorResult, OptimizationPublication, OptimizationRun};
    use crate::domain::types::{PublicationKind, RunStatus};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn work(author_id: i64, publication_id: i64) -> AuthorWork {
        AuthorWork {
            publication_id,
            author_id,
            discipline_id: 1,
            kind: PublicationKind::Article,
            year: 2022,
            slot: dec("1"),
            points: dec("100"),
            author_count: 2,
        }
    }

    fn result(author_id: i64, achieved: &str, ceiling: &str) -> OptimizationAuthorResult {
        OptimizationAuthorResult {
            run_id: "r".to_string(),
            author_id,
            points_achieved: Decimal::ZERO,
            slots_achieved: dec(achieved),
            mono_slots_achieved: Decimal::ZERO,
            total_slot_ceiling: dec(ceiling),
            mono_slot_ceiling: Decimal::ZERO,
        }
    }

    fn outcome(results: Vec<OptimizationAuthorResult>, selected: &[(i64, i64)]) -> OptimizationOutcome {
        OptimizationOutcome {
            run: OptimizationRun {
                run_id: "r".to_string(),
                discipline_id: 1,
                institution: "u".to_string(),
                years: YearRange::new(2022, 2023),
                strategy: "knapsack".to_string(),
                status: RunStatus::Completed,
                total_points: Decimal::ZERO,
                total_slots: Decimal::ZERO,
                mono_slots: Decimal::ZERO,
                publication_count: 0,
                low_mono_count: 0,
                low_mono_percentage: Decimal::ZERO,
                outside_n_percentage: Decimal::ZERO,
                validation_passed: true,
                is_optimal: true,
                config_snapshot: None,
                created_at: Utc::now().naive_utc(),
            },
            author_results: results,
            publications: selected
                .iter()
                .map(|&(author_id, publication_id)| OptimizationPublication {
                    run_id: "r".to_string(),
                    author_id,
                    publication_id,
                    kind: PublicationKind::Article,
                    points: dec("100"),
                    slot_cost: dec("1"),
                    is_low_mono: false,
                })
                .collect(),
        }
    }

    #[test]
    fn test_diff_pin_sets() {
        let expected: BTreeSet<i64> = [1, 2, 3].into_iter().collect();
        assert_eq!(diff_pin_sets(&expected, &expected.clone()), None);

        let actual: BTreeSet<i64> = [1, 3, 4].into_iter().collect();
        assert_eq!(diff_pin_sets(&expected, &actual), Some((vec![2], vec![4])));
    }

    #[test]
    fn test_weak_link_requires_saturated_author_and_free_coauthor() {
        // 作者 1 已满且未选成果 20；作者 2 仍有空余
        let o = outcome(
            vec![result(1, "1", "1"), result(2, "1", "2")],
            &[(1, 10), (2, 20)],
        );
        let works = vec![work(1, 10), work(1, 20), work(2, 20)];
        let weak = find_weak_links(&o, &works, dec("0.8"));
        assert_eq!(
            weak,
            vec![WeakLink {
                author_id: 1,
                publication_id: 20
            }]
        );
    }

    #[test]
    fn test_no_weak_link_when_coauthor_full() {
        let o = outcome(
            vec![result(1, "1", "1"), result(2, "2", "2")],
            &[(1, 10), (2, 20)],
        );
        let works = vec![work(1, 10), work(1, 20), work(2, 20)];
        assert!(find_weak_links(&o, &works, dec("0.8")).is_empty());
    }

    #[test]
    fn test_no_weak_link_when_author_not_saturated() {
        let o = outcome(
            vec![result(1, "0.5", "4"), result(2, "1", "2")],
            &[(1, 10), (2, 20)],
        );
        let works = vec![work(1, 10), work(1, 20), work(2, 20)];
        assert!(find_weak_links(&o, &works, dec("0.8")).is_empty());
    }
}
