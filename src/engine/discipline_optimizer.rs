// ==========================================
// 科研成果评估系统 - 学科选优
// ==========================================
// 流程:
// 1. 计算并保存学科额度（N < min_n 的学科整体跳过）
// 2. 阶段一: 每位作者按自身上限独立求解
// 3. 阶段二: 机构层约束（总槽位 ≤ k×N、专著槽位 ≤ k×N、N 外作者槽位占比），
//    逐个剔除效率最低的入选项直至满足，再用未入选成果回填剩余空间
// 4. 校验: 作者上限（0.01 容差）+ 低分专著占比
// ==========================================

use crate::config::settings::EvaluationSettings;
use crate::domain::optimization::{
    OptimizationAuthorResult, OptimizationOutcome, OptimizationPublication, OptimizationRun,
};
use crate::domain::quota::{QuotaRecord, YearRange};
use crate::domain::slot_cache::AuthorWork;
use crate::domain::types::RunStatus;
use crate::engine::error::EngineResult;
use crate::engine::quota_calculator::{DisciplineQuotaResult, QuotaCalculator};
use crate::engine::repositories::EvaluationRepositories;
use crate::engine::solver::Candidate;
use crate::engine::strategy::SolverStrategy;
use chrono::Utc;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 作者上限校验容差
const LIMIT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// 阶段一入选项（作者 × 成果）
#[derive(Debug, Clone)]
struct PoolItem {
    work: AuthorWork,
    in_n: bool,
}

impl PoolItem {
    fn efficiency(&self) -> Decimal {
        if self.work.slot <= Decimal::ZERO {
            Decimal::MAX
        } else {
            self.work.points / self.work.slot
        }
    }

    fn is_mono(&self) -> bool {
        self.work.kind.is_monograph_kind()
    }
}

/// 最先被剔除的排在前面：效率低 → 分值低 → 作者数多 → id 大
fn removal_order(a: &PoolItem, b: &PoolItem) -> Ordering {
    a.efficiency()
        .cmp(&b.efficiency())
        .then_with(|| a.work.points.cmp(&b.work.points))
        .then_with(|| b.work.author_count.cmp(&a.work.author_count))
        .then_with(|| b.work.publication_id.cmp(&a.work.publication_id))
        .then_with(|| b.work.author_id.cmp(&a.work.author_id))
}

/// (作者, 成果)
type ItemKey = (i64, i64);

fn item_key(work: &AuthorWork) -> ItemKey {
    (work.author_id, work.publication_id)
}

/// 机构层上限
#[derive(Debug, Clone, Copy)]
struct InstitutionLimits {
    total: Decimal,
    mono: Decimal,
    ignore_total: bool,
    max_outside_pct: Decimal,
}

fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part / whole * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

pub struct DisciplineOptimizer {
    repos: EvaluationRepositories,
    settings: EvaluationSettings,
}

impl DisciplineOptimizer {
    pub fn new(repos: EvaluationRepositories, settings: EvaluationSettings) -> Self {
        Self { repos, settings }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// 计算并保存学科额度
    pub fn compute_quotas(
        &self,
        discipline_id: i64,
        years: YearRange,
    ) -> EngineResult<DisciplineQuotaResult> {
        let assignments = self
            .repos
            .author_repo
            .assignments_for_discipline(discipline_id, years)?;
        let calculator = QuotaCalculator::new(self.settings.quota.clone());
        let result = calculator.compute_discipline(discipline_id, &assignments, years);
        self.repos
            .quota_repo
            .replace_for_discipline(&result.quota, &result.author_records)?;
        Ok(result)
    }

    /// 求解但不保存选优结果；学科被排除时返回 None
    #[instrument(skip(self, institution))]
    pub fn solve(
        &self,
        discipline_id: i64,
        years: YearRange,
        strategy: SolverStrategy,
        institution: &str,
    ) -> EngineResult<Option<OptimizationOutcome>> {
        let quotas = self.compute_quotas(discipline_id, years)?;
        if quotas.quota.excluded {
            info!(
                discipline_id,
                n_value = %quotas.quota.n_value,
                min_n = %self.settings.quota.min_n,
                "N 低于下限，学科不参与选优"
            );
            return Ok(None);
        }

        let works = self
            .repos
            .slot_cache_repo
            .author_works_for_discipline(discipline_id, years)?;
        let mut works_by_author: BTreeMap<i64, Vec<AuthorWork>> = BTreeMap::new();
        for w in works {
            works_by_author.entry(w.author_id).or_default().push(w);
        }

        // ===== 阶段一: 作者层 =====
        let solver = strategy.build_solver(&self.settings.genetic);
        let mut pool: Vec<PoolItem> = Vec::new();
        let mut all_optimal = true;
        for record in &quotas.author_records {
            let author_works = match works_by_author.get(&record.author_id) {
                Some(w) => w,
                None => continue,
            };
            let candidates: Vec<Candidate> = author_works
                .iter()
                .map(|w| Candidate {
                    id: w.publication_id,
                    points: w.points,
                    slot_cost: w.slot,
                    kind: w.kind,
                    author_count: w.author_count,
                })
                .collect();
            let selection = solver.solve(
                &candidates,
                record.total_slot_ceiling,
                record.mono_slot_ceiling,
            );
            all_optimal &= selection.is_optimal;
            debug!(
                author_id = record.author_id,
                selected = selection.selected.len(),
                points = %selection.total_points,
                "作者求解完成"
            );
            for work in author_works.iter().filter(|w| selection.contains(w.publication_id)) {
                pool.push(PoolItem {
                    work: work.clone(),
                    in_n: record.in_n,
                });
            }
        }

        // ===== 阶段二: 机构层 =====
        let limits = InstitutionLimits {
            total: quotas.quota.institution_total_ceiling,
            mono: quotas.quota.institution_mono_ceiling,
            ignore_total: strategy.ignores_institution_total(),
            max_outside_pct: self.settings.outside_n_max_pct,
        };
        let removed = Self::apply_institution_constraints(&mut pool, limits);
        let trimmed = removed.len();
        if trimmed > 0 {
            let records: HashMap<i64, &QuotaRecord> =
                quotas.author_records.iter().map(|r| (r.author_id, r)).collect();
            let backfilled =
                Self::backfill(&mut pool, &works_by_author, &records, &removed, limits);
            info!(discipline_id, trimmed, backfilled, "机构层约束剔除入选项");
        }

        let outcome = self.build_outcome(
            discipline_id,
            years,
            strategy,
            institution,
            &quotas.author_records,
            pool,
            all_optimal && trimmed == 0,
        );
        info!(
            discipline_id,
            strategy = strategy.as_str(),
            total_points = %outcome.run.total_points,
            total_slots = %outcome.run.total_slots,
            validation_passed = outcome.run.validation_passed,
            "学科选优完成"
        );
        Ok(Some(outcome))
    }

    /// 求解并保存（替换该学科的旧运行）
    pub fn optimize(
        &self,
        discipline_id: i64,
        years: YearRange,
        strategy: SolverStrategy,
        institution: &str,
    ) -> EngineResult<Option<OptimizationOutcome>> {
        let outcome = self.solve(discipline_id, years, strategy, institution)?;
        if let Some(ref o) = outcome {
            self.persist(o)?;
        }
        Ok(outcome)
    }

    pub fn persist(&self, outcome: &OptimizationOutcome) -> EngineResult<()> {
        self.repos.optimization_repo.replace_run(outcome)?;
        Ok(())
    }

    /// 返回被剔除的入选项
    fn apply_institution_constraints(
        pool: &mut Vec<PoolItem>,
        limits: InstitutionLimits,
    ) -> BTreeSet<ItemKey> {
        let mut removed = BTreeSet::new();

        loop {
            let total: Decimal = pool.iter().map(|p| p.work.slot).sum();
            let mono: Decimal = pool.iter().filter(|p| p.is_mono()).map(|p| p.work.slot).sum();
            let outside: Decimal = pool.iter().filter(|p| !p.in_n).map(|p| p.work.slot).sum();

            let victim = if !limits.ignore_total && total > limits.total {
                Self::lowest(pool, |_| true)
            } else if mono > limits.mono {
                Self::lowest(pool, |p| p.is_mono())
            } else if percentage(outside, total) > limits.max_outside_pct {
                Self::lowest(pool, |p| !p.in_n)
            } else {
                None
            };

            match victim {
                Some(idx) => {
                    let item = pool.remove(idx);
                    debug!(
                        author_id = item.work.author_id,
                        publication_id = item.work.publication_id,
                        "剔除入选项"
                    );
                    removed.insert(item_key(&item.work));
                }
                None => break,
            }
        }
        removed
    }

    /// 剔除后用未入选的成果回填：按剔除顺序的逆序尝试，
    /// 只接受同时满足作者上限与全部机构层约束的项；被剔除项不再回填。
    /// 返回回填数量
    fn backfill(
        pool: &mut Vec<PoolItem>,
        works_by_author: &BTreeMap<i64, Vec<AuthorWork>>,
        records: &HashMap<i64, &QuotaRecord>,
        removed: &BTreeSet<ItemKey>,
        limits: InstitutionLimits,
    ) -> usize {
        let selected: BTreeSet<ItemKey> = pool.iter().map(|p| item_key(&p.work)).collect();
        let mut candidates: Vec<PoolItem> = works_by_author
            .iter()
            .filter_map(|(author_id, works)| records.get(author_id).map(|r| (r, works)))
            .flat_map(|(record, works)| {
                works.iter().map(move |w| PoolItem {
                    work: w.clone(),
                    in_n: record.in_n,
                })
            })
            .filter(|c| {
                let key = item_key(&c.work);
                !selected.contains(&key) && !removed.contains(&key)
            })
            .collect();
        candidates.sort_by(|a, b| removal_order(b, a));

        let mut added = 0;
        // 加入 N 内成果可能为 N 外成果腾出占比，重复直至无新增
        loop {
            let mut progressed = false;
            let mut i = 0;
            while i < candidates.len() {
                if Self::fits(pool, &candidates[i], records, limits) {
                    let item = candidates.remove(i);
                    debug!(
                        author_id = item.work.author_id,
                        publication_id = item.work.publication_id,
                        "回填入选项"
                    );
                    pool.push(item);
                    added += 1;
                    progressed = true;
                } else {
                    i += 1;
                }
            }
            if !progressed {
                break;
            }
        }
        added
    }

    fn fits(
        pool: &[PoolItem],
        candidate: &PoolItem,
        records: &HashMap<i64, &QuotaRecord>,
        limits: InstitutionLimits,
    ) -> bool {
        let record = match records.get(&candidate.work.author_id) {
            Some(r) => r,
            None => return false,
        };
        let slot = candidate.work.slot;
        let mono_slot = if candidate.is_mono() { slot } else { Decimal::ZERO };

        let mine = pool.iter().filter(|p| p.work.author_id == candidate.work.author_id);
        let (author_total, author_mono) = mine.fold((Decimal::ZERO, Decimal::ZERO), |(t, m), p| {
            let pm = if p.is_mono() { p.work.slot } else { Decimal::ZERO };
            (t + p.work.slot, m + pm)
        });
        if author_total + slot > record.total_slot_ceiling
            || author_mono + mono_slot > record.mono_slot_ceiling
        {
            return false;
        }

        let total: Decimal = pool.iter().map(|p| p.work.slot).sum::<Decimal>() + slot;
        let mono: Decimal =
            pool.iter().filter(|p| p.is_mono()).map(|p| p.work.slot).sum::<Decimal>() + mono_slot;
        let mut outside: Decimal = pool.iter().filter(|p| !p.in_n).map(|p| p.work.slot).sum();
        if !candidate.in_n {
            outside += slot;
        }

        (limits.ignore_total || total <= limits.total)
            && mono <= limits.mono
            && percentage(outside, total) <= limits.max_outside_pct
    }

    fn lowest(pool: &[PoolItem], filter: impl Fn(&PoolItem) -> bool) -> Option<usize> {
        pool.iter()
            .enumerate()
            .filter(|(_, p)| filter(p))
            .min_by(|(_, a), (_, b)| removal_order(a, b))
            .map(|(idx, _)| idx)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_outcome(
        &self,
        discipline_id: i64,
        years: YearRange,
        strategy: SolverStrategy,
        institution: &str,
        records: &[QuotaRecord],
        pool: Vec<PoolItem>,
        is_optimal: bool,
    ) -> OptimizationOutcome {
        let run_id = Uuid::new_v4().to_string();
        let threshold = self.settings.low_mono_threshold;

        let publications: Vec<OptimizationPublication> = pool
            .iter()
            .map(|p| OptimizationPublication {
                run_id: run_id.clone(),
                author_id: p.work.author_id,
                publication_id: p.work.publication_id,
                kind: p.work.kind,
                points: p.work.points,
                slot_cost: p.work.slot,
                is_low_mono: p.is_mono() && p.work.points < threshold,
            })
            .collect();

        let mut limits_ok = true;
        let author_results: Vec<OptimizationAuthorResult> = records
            .iter()
            .map(|r| {
                let mine = publications.iter().filter(|p| p.author_id == r.author_id);
                let (points, slots, mono) = mine.fold(
                    (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
                    |(pt, sl, mo), p| {
                        let m = if p.kind.is_monograph_kind() { p.slot_cost } else { Decimal::ZERO };
                        (pt + p.points, sl + p.slot_cost, mo + m)
                    },
                );
                if slots > r.total_slot_ceiling + LIMIT_EPSILON
                    || mono > r.mono_slot_ceiling + LIMIT_EPSILON
                {
                    warn!(author_id = r.author_id, slots = %slots, mono = %mono, "作者上限校验失败");
                    limits_ok = false;
                }
                OptimizationAuthorResult {
                    run_id: run_id.clone(),
                    author_id: r.author_id,
                    points_achieved: points,
                    slots_achieved: slots,
                    mono_slots_achieved: mono,
                    total_slot_ceiling: r.total_slot_ceiling,
                    mono_slot_ceiling: r.mono_slot_ceiling,
                }
            })
            .collect();

        let total_points: Decimal = publications.iter().map(|p| p.points).sum();
        let total_slots: Decimal = publications.iter().map(|p| p.slot_cost).sum();
        let mono_slots: Decimal = publications
            .iter()
            .filter(|p| p.kind.is_monograph_kind())
            .map(|p| p.slot_cost)
            .sum();
        let outside_slots: Decimal = pool.iter().filter(|p| !p.in_n).map(|p| p.work.slot).sum();

        let publication_count = publications.len() as i64;
        let low_mono_count = publications.iter().filter(|p| p.is_low_mono).count() as i64;
        let low_mono_percentage =
            percentage(Decimal::from(low_mono_count), Decimal::from(publication_count));
        let validation_passed = limits_ok && low_mono_percentage <= self.settings.low_mono_max_pct;

        OptimizationOutcome {
            run: OptimizationRun {
                run_id,
                discipline_id,
                institution: institution.to_string(),
                years,
                strategy: strategy.as_str().to_string(),
                status: RunStatus::Completed,
                total_points,
                total_slots,
                mono_slots,
                publication_count,
                low_mono_count,
                low_mono_percentage,
                outside_n_percentage: percentage(outside_slots, total_slots),
                validation_passed,
                is_optimal,
                config_snapshot: self.settings.config_snapshot.clone(),
                created_at: Utc::now().naive_utc(),
            },
            author_results,
            publications,
        }
    }
}
