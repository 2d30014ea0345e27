// ==========================================
// 科研成果评估系统 - 额度计算引擎
// ==========================================
// 职责: 学科 N、作者槽位上限、机构层上限
// 规则:
// - 年度份额 = 工作量比例 × 申报占比 / 100
// - N = 计入类别作者的份额之和 / 年度数
// - 作者上限 = min(份额之和, author_max_slots)；专著上限 = min(上限/2, author_max_mono_slots)
// - N < min_n 的学科整体排除
// ==========================================

use crate::domain::author::AuthorDisciplineAssignment;
use crate::domain::quota::{DisciplineQuota, QuotaRecord, YearRange};
use crate::engine::error::{EngineError, EngineResult};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

/// 额度参数（由配置加载）
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaParameters {
    pub min_n: Decimal,
    pub author_max_slots: Decimal,
    pub author_max_mono_slots: Decimal,
    pub institution_total_multiplier: Decimal,
    pub institution_mono_multiplier: Decimal,
}

impl Default for QuotaParameters {
    fn default() -> Self {
        Self {
            min_n: Decimal::from(12),
            author_max_slots: Decimal::from(4),
            author_max_mono_slots: Decimal::from(2),
            institution_total_multiplier: Decimal::from(3),
            institution_mono_multiplier: Decimal::new(8, 1),
        }
    }
}

/// 学科额度计算结果
#[derive(Debug, Clone, PartialEq)]
pub struct DisciplineQuotaResult {
    pub quota: DisciplineQuota,
    pub author_records: Vec<QuotaRecord>,
    pub skipped_authors: Vec<i64>,
}

pub struct QuotaCalculator {
    params: QuotaParameters,
}

impl QuotaCalculator {
    pub fn new(params: QuotaParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &QuotaParameters {
        &self.params
    }

    /// 年度份额；无工作量比例时返回 None
    pub fn yearly_share(assignment: &AuthorDisciplineAssignment) -> Option<Decimal> {
        let fraction = assignment.employment_fraction?;
        let fraction = fraction.max(Decimal::ZERO).min(Decimal::ONE);
        Some(fraction * assignment.declared_share / Decimal::from(100))
    }

    /// 学科 N
    pub fn discipline_n(
        &self,
        discipline_id: i64,
        assignments: &[AuthorDisciplineAssignment],
        years: YearRange,
    ) -> Decimal {
        let total: Decimal = assignments
            .iter()
            .filter(|a| {
                a.discipline_id == discipline_id
                    && years.contains(a.year)
                    && a.author_kind.counts_toward_n()
            })
            .filter_map(Self::yearly_share)
            .sum();
        total / Decimal::from(years.year_count())
    }

    /// 作者上限 (total, mono)
    ///
    /// 区间内没有任何可用工作量比例时返回 QuotaUnavailable。
    pub fn author_ceiling(
        &self,
        author_id: i64,
        discipline_id: i64,
        assignments: &[AuthorDisciplineAssignment],
        years: YearRange,
    ) -> EngineResult<(Decimal, Decimal, Decimal)> {
        let shares: Vec<Decimal> = assignments
            .iter()
            .filter(|a| {
                a.author_id == author_id && a.discipline_id == discipline_id && years.contains(a.year)
            })
            .filter_map(Self::yearly_share)
            .collect();

        if shares.is_empty() {
            return Err(EngineError::QuotaUnavailable {
                author_id,
                discipline_id,
            });
        }

        let share: Decimal = shares.into_iter().sum();
        let total = share.min(self.params.author_max_slots).round_dp(4);
        let mono = (total / Decimal::from(2))
            .min(self.params.author_max_mono_slots)
            .round_dp(4);
        Ok((share, total, mono))
    }

    /// 计算整个学科的额度
    pub fn compute_discipline(
        &self,
        discipline_id: i64,
        assignments: &[AuthorDisciplineAssignment],
        years: YearRange,
    ) -> DisciplineQuotaResult {
        let n_value = self.discipline_n(discipline_id, assignments, years).round_dp(4);
        let excluded = n_value < self.params.min_n;

        let quota = DisciplineQuota {
            discipline_id,
            years,
            n_value,
            institution_total_ceiling: (n_value * self.params.institution_total_multiplier)
                .round_dp(4),
            institution_mono_ceiling: (n_value * self.params.institution_mono_multiplier)
                .round_dp(4),
            excluded,
        };

        // 作者是否计入 N 以区间内最后一次申报为准
        let mut latest_kind = BTreeMap::new();
        for a in assignments
            .iter()
            .filter(|a| a.discipline_id == discipline_id && years.contains(a.year))
        {
            let entry = latest_kind.entry(a.author_id).or_insert((a.year, a.author_kind));
            if a.year >= entry.0 {
                *entry = (a.year, a.author_kind);
            }
        }

        let mut author_records = Vec::new();
        let mut skipped_authors = Vec::new();
        for (author_id, (_, kind)) in latest_kind {
            match self.author_ceiling(author_id, discipline_id, assignments, years) {
                Ok((share, total, mono)) => author_records.push(QuotaRecord {
                    author_id,
                    discipline_id,
                    years,
                    n_value,
                    author_share: share.round_dp(4),
                    total_slot_ceiling: total,
                    mono_slot_ceiling: mono,
                    in_n: kind.counts_toward_n(),
                }),
                Err(_) => {
                    debug!(author_id, discipline_id, "无工作量比例，跳过作者");
                    skipped_authors.push(author_id);
                }
            }
        }

        DisciplineQuotaResult {
            quota,
            author_records,
            skipped_authors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::AuthorKind;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn assignment(
        author_id: i64,
        year: i32,
        fraction: Option<&str>,
        share: &str,
        kind: AuthorKind,
    ) -> AuthorDisciplineAssignment {
        AuthorDisciplineAssignment {
            author_id,
            year,
            discipline_id: 1,
            sub_discipline_id: None,
            employment_fraction: fraction.map(dec),
            declared_share: dec(share),
            author_kind: kind,
        }
    }

    #[test]
    fn test_discipline_n_excludes_doctoral_students() {
        let calc = QuotaCalculator::new(QuotaParameters::default());
        let years = YearRange::new(2022, 2023);
        let assignments = vec![
            assignment(1, 2022, Some("1.0"), "100", AuthorKind::ResearchOnly),
            assignment(1, 2023, Some("1.0"), "100", AuthorKind::ResearchOnly),
            assignment(2, 2022, Some("0.5"), "50", AuthorKind::ResearchAndTeaching),
            assignment(2, 2023, Some("0.5"), "50", AuthorKind::ResearchAndTeaching),
            assignment(3, 2022, Some("1.0"), "100", AuthorKind::DoctoralStudent),
        ];
        // (1 + 1 + 0.25 + 0.25) / 2
        assert_eq!(calc.discipline_n(1, &assignments, years), dec("1.25"));
    }

    #[test]
    fn test_author_ceiling_capped() {
        let calc = QuotaCalculator::new(QuotaParameters::default());
        let years = YearRange::new(2019, 2023);
        let assignments: Vec<_> = (2019..=2023)
            .map(|y| assignment(1, y, Some("1"), "100", AuthorKind::ResearchOnly))
            .collect();
        let (share, total, mono) = calc.author_ceiling(1, 1, &assignments, years).unwrap();
        assert_eq!(share, dec("5"));
        assert_eq!(total, dec("4"));
        assert_eq!(mono, dec("2"));
    }

    #[test]
    fn test_author_without_fraction_is_skipped() {
        let calc = QuotaCalculator::new(QuotaParameters {
            min_n: Decimal::ZERO,
            ..QuotaParameters::default()
        });
        let years = YearRange::new(2022, 2022);
        let assignments = vec![
            assignment(1, 2022, Some("1"), "100", AuthorKind::ResearchOnly),
            assignment(2, 2022, None, "100", AuthorKind::ResearchOnly),
        ];
        let err = calc.author_ceiling(2, 1, &assignments, years).unwrap_err();
        assert!(matches!(err, EngineError::QuotaUnavailable { author_id: 2, .. }));

        let result = calc.compute_discipline(1, &assignments, years);
        assert_eq!(result.author_records.len(), 1);
        assert_eq!(result.skipped_authors, vec![2]);
    }

    #[test]
    fn test_small_discipline_excluded() {
        let calc = QuotaCalculator::new(QuotaParameters::default());
        let years = YearRange::new(2022, 2022);
        let assignments: Vec<_> = (1..=11)
            .map(|id| assignment(id, 2022, Some("1"), "100", AuthorKind::ResearchOnly))
            .collect();
        let result = calc.compute_discipline(1, &assignments, years);
        assert_eq!(result.quota.n_value, dec("11"));
        assert!(result.quota.excluded);

        let mut twelve = assignments.clone();
        twelve.push(assignment(12, 2022, Some("1"), "100", AuthorKind::ResearchOnly));
        let result = calc.compute_discipline(1, &twelve, years);
        assert!(!result.quota.excluded);
        assert_eq!(result.quota.institution_total_ceiling, dec("36"));
        assert_eq!(result.quota.institution_mono_ceiling, dec("9.6"));
    }

    #[test]
    fn test_in_n_flag_follows_author_kind() {
        let calc = QuotaCalculator::new(QuotaParameters::default());
        let years = YearRange::new(2022, 2022);
        let assignments = vec![
            assignment(1, 2022, Some("1"), "100", AuthorKind::ResearchOnly),
            assignment(2, 2022, Some("1"), "100", AuthorKind::DoctoralStudent),
        ];
        let result = calc.compute_discipline(1, &assignments, years);
        let phd = result.author_records.iter().find(|r| r.author_id == 2).unwrap();
        assert!(!phd.in_n);
        assert_eq!(phd.total_slot_ceiling, dec("1"));
    }
}
