// ==========================================
// 科研成果评估系统 - 槽位计算引擎
// ==========================================
// 职责: 分值 → 档位 → 系数；学科分值份额(PKD)；作者槽位
// 规则: 档位表按 (时期, 成果类型) 选取，见 TierRule
// 红线: 分值必须为正，否则 InapplicableRule
// ==========================================

use crate::domain::publication::{Publication, PublicationAuthorLink};
use crate::domain::slot_cache::{SlotCacheAuthor, SlotCacheDiscipline};
use crate::domain::types::{CountMode, Era, PublicationKind, ResponsibilityRole, Tier};
use crate::engine::error::{EngineError, EngineResult};
use rust_decimal::{Decimal, MathematicalOps};
use std::collections::{BTreeMap, HashSet};

/// 改革年份（含）起使用 B 表
pub const DEFAULT_REFORM_YEAR: i32 = 2019;

/// 最早可确定规则时期的年份
pub const DEFAULT_FIRST_EVALUATED_YEAR: i32 = 2017;

/// 落库小数位
pub const CACHE_DECIMAL_PLACES: u32 = 4;

/// √0.5，28 位精度
fn sqrt_half() -> Decimal {
    Decimal::from_i128_with_scale(7_071_067_811_865_475_244_008_443_621, 28)
}

/// 档位系数: TOP=1, MID=√0.5, LOW=0.5
pub fn multiplier(tier: Tier) -> Decimal {
    match tier {
        Tier::Top => Decimal::ONE,
        Tier::Mid => sqrt_half(),
        Tier::Low => Decimal::new(5, 1),
    }
}

/// 学科分值份额，不按合作者人数拆分
pub fn points_for_discipline(points: Decimal, tier: Tier) -> Decimal {
    points * multiplier(tier)
}

/// 作者槽位 = 系数 × sqrt(k/m)
///
/// k = 该学科计入的关联数, m = 成果上同口径参与者总数。
/// k == m 时直接返回系数（不经过开方）。
pub fn slot_for_author(tier: Tier, k: u32, m: u32) -> Decimal {
    let base = multiplier(tier);
    if k == m && k > 0 {
        return base;
    }
    if k == 0 || m == 0 {
        return Decimal::ZERO;
    }
    let ratio = Decimal::from(k.min(m)) / Decimal::from(m);
    ratio.sqrt().map(|s| base * s).unwrap_or(Decimal::ZERO)
}

// ==========================================
// TierRule - 档位规则（策略枚举）
// ==========================================
// 每条规则是一对递减阈值 (top_min, mid_min)，天然保证单调
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierRule {
    /// A 时期：所有类型统一
    EraAUniform,
    /// B 时期：连续出版物
    EraBArticle,
    /// B 时期：专著
    EraBMonograph,
    /// B 时期：章节
    EraBChapter,
}

impl TierRule {
    pub fn select(era: Era, kind: PublicationKind, is_chapter: bool) -> Self {
        match (era, kind, is_chapter) {
            (Era::A, _, _) => TierRule::EraAUniform,
            (Era::B, PublicationKind::Article, _) => TierRule::EraBArticle,
            (Era::B, PublicationKind::Book, false) => TierRule::EraBMonograph,
            (Era::B, PublicationKind::Book, true) => TierRule::EraBChapter,
        }
    }

    fn thresholds(&self) -> (Decimal, Decimal) {
        match self {
            TierRule::EraAUniform => (Decimal::from(30), Decimal::from(20)),
            TierRule::EraBArticle => (Decimal::from(100), Decimal::from(40)),
            TierRule::EraBMonograph => (Decimal::from(100), Decimal::from(40)),
            TierRule::EraBChapter => (Decimal::from(50), Decimal::from(20)),
        }
    }

    pub fn classify(&self, points: Decimal) -> Tier {
        let (top_min, mid_min) = self.thresholds();
        if points >= top_min {
            Tier::Top
        } else if points >= mid_min {
            Tier::Mid
        } else {
            Tier::Low
        }
    }
}

/// 单篇成果的计算结果（缓存行的来源）
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationSlots {
    pub publication_id: i64,
    pub tier: Tier,
    pub multiplier: Decimal,
    pub count_mode: CountMode,
    pub disciplines: Vec<SlotCacheDiscipline>,
    pub authors: Vec<SlotCacheAuthor>,
}

// ==========================================
// SlotCalculator - 槽位计算器
// ==========================================
#[derive(Debug, Clone)]
pub struct SlotCalculator {
    reform_year: i32,
    first_evaluated_year: i32,
}

impl Default for SlotCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_REFORM_YEAR, DEFAULT_FIRST_EVALUATED_YEAR)
    }
}

impl SlotCalculator {
    pub fn new(reform_year: i32, first_evaluated_year: i32) -> Self {
        Self {
            reform_year,
            first_evaluated_year: first_evaluated_year.min(reform_year),
        }
    }

    pub fn era_for_year(&self, year: i32) -> Option<Era> {
        if year < self.first_evaluated_year {
            None
        } else if year < self.reform_year {
            Some(Era::A)
        } else {
            Some(Era::B)
        }
    }

    /// 按连续出版物规则定档
    pub fn classify(&self, points: Decimal, year: i32) -> EngineResult<Tier> {
        self.classify_as(None, points, year, PublicationKind::Article, false)
    }

    pub fn classify_publication(&self, publication: &Publication) -> EngineResult<Tier> {
        self.classify_as(
            Some(publication.id),
            publication.points,
            publication.year,
            publication.kind,
            publication.is_chapter(),
        )
    }

    fn classify_as(
        &self,
        publication_id: Option<i64>,
        points: Decimal,
        year: i32,
        kind: PublicationKind,
        is_chapter: bool,
    ) -> EngineResult<Tier> {
        if points <= Decimal::ZERO {
            return Err(EngineError::inapplicable(
                publication_id,
                format!("分值必须为正: points={}", points),
            ));
        }
        let era = self.era_for_year(year).ok_or_else(|| {
            EngineError::inapplicable(publication_id, format!("无法确定规则时期: year={}", year))
        })?;
        Ok(TierRule::select(era, kind, is_chapter).classify(points))
    }

    /// 分值是否可用于评估（失败即关闭）
    pub fn can_adapt(&self, publication: &Publication) -> bool {
        self.classify_publication(publication).is_ok()
    }

    /// 默认计数口径：有计入的作者则只计作者，否则只计编者
    pub fn resolve_count_mode(links: &[PublicationAuthorLink]) -> CountMode {
        let has_credited_author = links
            .iter()
            .any(|l| l.is_credited() && l.role == ResponsibilityRole::Author);
        if has_credited_author {
            CountMode::AuthorsOnly
        } else {
            CountMode::EditorsOnly
        }
    }

    /// 计算单篇成果的学科份额与作者槽位
    ///
    /// # 参数
    /// - mode: None 时按 resolve_count_mode 自动选择
    pub fn evaluate(
        &self,
        publication: &Publication,
        links: &[PublicationAuthorLink],
        mode: Option<CountMode>,
    ) -> EngineResult<PublicationSlots> {
        let tier = self.classify_publication(publication)?;
        let count_mode = mode.unwrap_or_else(|| Self::resolve_count_mode(links));

        let mut ordered: Vec<&PublicationAuthorLink> = links
            .iter()
            .filter(|l| l.publication_id == publication.id && count_mode.includes(l.role))
            .collect();
        ordered.sort_by_key(|l| (l.position, l.id));

        let m = ordered.len() as u32;

        // 同一作者只取首条计入关联
        let mut seen_authors = HashSet::new();
        let mut by_discipline: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for link in ordered.iter().filter(|l| l.is_credited()) {
            if !seen_authors.insert(link.author_id) {
                continue;
            }
            if let Some(discipline_id) = link.discipline_id {
                by_discipline.entry(discipline_id).or_default().push(link.author_id);
            }
        }

        let share = points_for_discipline(publication.points, tier).round_dp(CACHE_DECIMAL_PLACES);
        let mut disciplines = Vec::with_capacity(by_discipline.len());
        let mut authors = Vec::new();

        for (discipline_id, mut author_ids) in by_discipline {
            disciplines.push(SlotCacheDiscipline {
                publication_id: publication.id,
                discipline_id,
                tier,
                multiplier: multiplier(tier).round_dp(CACHE_DECIMAL_PLACES),
                points_share: share,
            });

            let k = author_ids.len() as u32;
            let slot = slot_for_author(tier, k, m);
            author_ids.sort_unstable();
            for author_id in author_ids {
                authors.push(SlotCacheAuthor {
                    publication_id: publication.id,
                    author_id,
                    discipline_id,
                    slot: slot.round_dp(CACHE_DECIMAL_PLACES),
                    points: (publication.points * slot).round_dp(CACHE_DECIMAL_PLACES),
                });
            }
        }

        Ok(PublicationSlots {
            publication_id: publication.id,
            tier,
            multiplier: multiplier(tier),
            count_mode,
            disciplines,
            authors,
        })
    }
}
