// ==========================================
// 科研成果评估系统 - 分值缓存
// ==========================================
// 职责: 将 SlotCalculator 的结果按成果物化为缓存行
// 红线:
// - 只写缓存表，不修改成果与关联
// - 先完整计算再写入；规则不适用时清空该成果的缓存行
// - 缓存不会自动失效：作者关系、学科绑定、分值变更后必须显式重建
// ==========================================

use crate::domain::pin_change::PinChange;
use crate::domain::quota::YearRange;
use crate::domain::types::PinAction;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::EvaluationRepositories;
use crate::engine::slot_calculator::{PublicationSlots, SlotCalculator};
use crate::repository::RepositoryError;
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 全量重建汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildSummary {
    pub rebuilt: usize,
    /// 规则不适用而被清空缓存的成果
    pub inapplicable: Vec<i64>,
}

/// 绑定重置汇总
#[derive(Debug, Clone, PartialEq)]
pub struct ResetPinsSummary {
    pub round_id: String,
    pub repinned: usize,
    pub rebuilt: usize,
    pub inapplicable: Vec<i64>,
}

pub struct PointsCache {
    repos: EvaluationRepositories,
    calculator: SlotCalculator,
}

impl PointsCache {
    pub fn new(repos: EvaluationRepositories, calculator: SlotCalculator) -> Self {
        Self { repos, calculator }
    }

    pub fn calculator(&self) -> &SlotCalculator {
        &self.calculator
    }

    /// 分值是否可用于评估
    pub fn can_adapt(&self, publication_id: i64) -> EngineResult<bool> {
        let publication = self
            .repos
            .publication_repo
            .find_by_id(publication_id)?
            .ok_or_else(|| RepositoryError::not_found("publication", publication_id))?;
        Ok(self.calculator.can_adapt(&publication))
    }

    /// 重建单篇成果的缓存（删除 + 重建，单事务）；规则不适用时清空后返回错误
    #[instrument(skip(self))]
    pub fn rebuild(&self, publication_id: i64) -> EngineResult<PublicationSlots> {
        let publication = self
            .repos
            .publication_repo
            .find_by_id(publication_id)?
            .ok_or_else(|| RepositoryError::not_found("publication", publication_id))?;
        let links = self.repos.publication_repo.find_links(publication_id)?;

        let slots = match self.calculator.evaluate(&publication, &links, None) {
            Ok(slots) => slots,
            Err(e @ EngineError::InapplicableRule { .. }) => {
                // 旧缓存行必须随之清空
                self.repos
                    .slot_cache_repo
                    .replace_for_publication(publication_id, &[], &[])?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.repos.slot_cache_repo.replace_for_publication(
            publication_id,
            &slots.disciplines,
            &slots.authors,
        )?;

        tracing::debug!(
            publication_id,
            tier = slots.tier.as_str(),
            disciplines = slots.disciplines.len(),
            authors = slots.authors.len(),
            "缓存已重建"
        );
        Ok(slots)
    }

    /// 批量重建；规则不适用的成果清空缓存并记录
    pub fn rebuild_many(&self, publication_ids: &[i64]) -> EngineResult<RebuildSummary> {
        let mut summary = RebuildSummary::default();
        for &publication_id in publication_ids {
            match self.rebuild(publication_id) {
                Ok(_) => summary.rebuilt += 1,
                Err(EngineError::InapplicableRule { reason, .. }) => {
                    warn!(publication_id, reason = %reason, "规则不适用，缓存已清空");
                    summary.inapplicable.push(publication_id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    /// 全量重建
    #[instrument(skip(self))]
    pub fn rebuild_all(&self) -> EngineResult<RebuildSummary> {
        let ids = self.repos.publication_repo.list_ids()?;
        let summary = self.rebuild_many(&ids)?;
        info!(
            rebuilt = summary.rebuilt,
            inapplicable = summary.inapplicable.len(),
            "缓存全量重建完成"
        );
        Ok(summary)
    }

    /// 重新绑定区间内全部可计入关联，并重建受影响成果的缓存
    #[instrument(skip(self), fields(from = years.from, to = years.to))]
    pub fn reset_pins(&self, years: YearRange) -> EngineResult<ResetPinsSummary> {
        let round_id = Uuid::new_v4().to_string();
        let links = self.repos.publication_repo.unpinned_eligible_links(years)?;
        let link_ids: Vec<i64> = links.iter().map(|(link_id, _)| *link_id).collect();
        let repinned = self.repos.publication_repo.set_pinned(&link_ids, true)?;

        let now = Utc::now().naive_utc();
        let changes: Vec<PinChange> = link_ids
            .iter()
            .map(|&link_id| PinChange {
                round_id: round_id.clone(),
                discipline_id: None,
                link_id,
                action: PinAction::Reset,
                detail: Some(format!("reset {}-{}", years.from, years.to)),
                changed_at: now,
            })
            .collect();
        self.repos.pin_log_repo.record(&changes)?;

        let affected: Vec<i64> = links
            .iter()
            .map(|(_, publication_id)| *publication_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let summary = self.rebuild_many(&affected)?;

        info!(round_id = %round_id, repinned, rebuilt = summary.rebuilt, "绑定已重置");
        Ok(ResetPinsSummary {
            round_id,
            repinned,
            rebuilt: summary.rebuilt,
            inapplicable: summary.inapplicable,
        })
    }
}
