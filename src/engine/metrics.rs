// ==========================================
// 科研成果评估系统 - 作者指标汇总
// ==========================================
// 输入: 额度记录 + 同区间的最新选优结果 + 分值缓存
// 区间内没有选优结果时，已入选值为 0
// 输出: author_metric（按 (author, discipline) 幂等更新）
// ==========================================

use crate::config::settings::EvaluationSettings;
use crate::domain::metric::AuthorMetric;
use crate::domain::optimization::OptimizationOutcome;
use crate::domain::quota::YearRange;
use crate::engine::error::EngineResult;
use crate::engine::repositories::EvaluationRepositories;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument};

fn average(points: Decimal, slots: Decimal) -> Decimal {
    if slots.is_zero() {
        Decimal::ZERO
    } else {
        (points / slots).round_dp(4)
    }
}

fn utilization(achieved: Decimal, ceiling: Decimal) -> Decimal {
    if ceiling.is_zero() {
        Decimal::ZERO
    } else {
        (achieved / ceiling * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

pub struct MetricsAggregator {
    repos: EvaluationRepositories,
    settings: EvaluationSettings,
}

impl MetricsAggregator {
    pub fn new(repos: EvaluationRepositories, settings: EvaluationSettings) -> Self {
        Self { repos, settings }
    }

    /// 计算并保存单个 (作者, 学科) 的指标
    #[instrument(skip(self))]
    pub fn compute(
        &self,
        author_id: i64,
        discipline_id: i64,
        years: YearRange,
    ) -> EngineResult<AuthorMetric> {
        let outcome = self
            .repos
            .optimization_repo
            .latest_outcome_for(discipline_id, years)?;
        let metric = self.build_metric(author_id, discipline_id, years, outcome.as_ref())?;
        self.repos.metric_repo.upsert(&metric)?;
        Ok(metric)
    }

    /// 区间内缓存出现过的全部 (作者, 学科)
    #[instrument(skip(self), fields(from = years.from, to = years.to))]
    pub fn compute_all(&self, years: YearRange) -> EngineResult<Vec<AuthorMetric>> {
        let pairs = self.repos.slot_cache_repo.author_discipline_pairs(years)?;

        // 同一学科只读取一次该区间的最新结果
        let mut outcomes: HashMap<i64, Option<OptimizationOutcome>> = HashMap::new();
        let mut metrics = Vec::with_capacity(pairs.len());
        for (author_id, discipline_id) in pairs {
            if !outcomes.contains_key(&discipline_id) {
                let outcome = self
                    .repos
                    .optimization_repo
                    .latest_outcome_for(discipline_id, years)?;
                outcomes.insert(discipline_id, outcome);
            }
            let outcome = outcomes.get(&discipline_id).and_then(|o| o.as_ref());
            let metric = self.build_metric(author_id, discipline_id, years, outcome)?;
            self.repos.metric_repo.upsert(&metric)?;
            metrics.push(metric);
        }

        info!(count = metrics.len(), "作者指标已更新");
        Ok(metrics)
    }

    fn build_metric(
        &self,
        author_id: i64,
        discipline_id: i64,
        years: YearRange,
        outcome: Option<&OptimizationOutcome>,
    ) -> EngineResult<AuthorMetric> {
        let slot_ceiling = self
            .repos
            .quota_repo
            .find_record(author_id, discipline_id, years)?
            .map(|r| r.total_slot_ceiling)
            .unwrap_or(self.settings.quota.author_max_slots);

        let mut slot_achieved = Decimal::ZERO;
        let mut points_achieved = Decimal::ZERO;
        let mut selected = BTreeSet::new();
        if let Some(outcome) = outcome {
            for p in outcome.selected_for(author_id) {
                slot_achieved += p.slot_cost;
                points_achieved += p.points;
                selected.insert(p.publication_id);
            }
        }

        let works = self
            .repos
            .slot_cache_repo
            .author_works(author_id, discipline_id, years)?;
        let slot_all: Decimal = works.iter().map(|w| w.slot).sum();
        let points_all: Decimal = works.iter().map(|w| w.points).sum();
        let unselected: Vec<i64> = works
            .iter()
            .map(|w| w.publication_id)
            .filter(|id| !selected.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            author_id,
            discipline_id,
            selected = selected.len(),
            unselected = unselected.len(),
            "指标计算完成"
        );

        Ok(AuthorMetric {
            author_id,
            discipline_id,
            years,
            slot_ceiling,
            slot_achieved,
            points_achieved,
            avg_points_per_slot: average(points_achieved, slot_achieved),
            slot_achieved_all_works: slot_all,
            points_achieved_all_works: points_all,
            avg_points_per_slot_all_works: average(points_all, slot_all),
            utilization_pct: utilization(slot_achieved, slot_ceiling),
            selected_publication_ids: selected.into_iter().collect(),
            unselected_publication_ids: unselected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_average_and_utilization_guard_zero() {
        assert_eq!(average(dec("100"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(utilization(dec("1"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(average(dec("100"), dec("3")), dec("33.3333"));
        assert_eq!(utilization(dec("1"), dec("3")), dec("33.33"));
        assert_eq!(utilization(dec("2"), dec("4")), dec("50"));
    }
}
