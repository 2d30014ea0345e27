// ==========================================
// 科研成果评估系统 - 选优求解器
// ==========================================
// 问题: 0/1 选择，双容量约束
// - Σ 槽位 ≤ total_ceiling
// - Σ 专著类槽位 ≤ mono_ceiling
// 目标: 最大化 Σ 分值
// ==========================================
// 离散化: 槽位按 1/SLOT_SCALE 取整（成本向上，上限向下），
// 离散可行 ⇒ 精确可行
// ==========================================

pub mod genetic;
pub mod knapsack;

pub use genetic::GeneticSolver;
pub use knapsack::KnapsackSolver;

use crate::domain::types::PublicationKind;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// 每个槽位的离散单位数
pub const SLOT_SCALE: i64 = 100;

/// 分值定点放大倍数（4 位小数）
pub const POINT_SCALE: i64 = 10_000;

/// 候选成果
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub points: Decimal,
    pub slot_cost: Decimal,
    pub kind: PublicationKind,
    /// 计入作者数（同效率时少作者优先）
    pub author_count: u32,
}

impl Candidate {
    pub fn is_monograph(&self) -> bool {
        self.kind.is_monograph_kind()
    }

    /// 单位槽位分值
    pub fn efficiency(&self) -> Decimal {
        if self.slot_cost <= Decimal::ZERO {
            Decimal::MAX
        } else {
            self.points / self.slot_cost
        }
    }
}

/// 求解结果
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub selected: Vec<Candidate>,
    pub total_points: Decimal,
    pub total_slots: Decimal,
    pub mono_slots: Decimal,
    /// false 表示尽力解（未证明最优）
    pub is_optimal: bool,
}

impl Selection {
    pub fn empty() -> Self {
        Self {
            selected: Vec::new(),
            total_points: Decimal::ZERO,
            total_slots: Decimal::ZERO,
            mono_slots: Decimal::ZERO,
            is_optimal: true,
        }
    }

    pub fn from_candidates(selected: Vec<Candidate>, is_optimal: bool) -> Self {
        let total_points = selected.iter().map(|c| c.points).sum();
        let total_slots = selected.iter().map(|c| c.slot_cost).sum();
        let mono_slots = selected
            .iter()
            .filter(|c| c.is_monograph())
            .map(|c| c.slot_cost)
            .sum();
        Self {
            selected,
            total_points,
            total_slots,
            mono_slots,
            is_optimal,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.selected.iter().any(|c| c.id == id)
    }
}

/// 求解器接口
pub trait SelectionSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// 空候选或 total_ceiling < 0 时返回空结果（不是错误）
    fn solve(&self, candidates: &[Candidate], total_ceiling: Decimal, mono_ceiling: Decimal)
        -> Selection;
}

// ==========================================
// 离散化工具
// ==========================================

/// 成本单位（向上取整）
pub(crate) fn cost_units(slot_cost: Decimal) -> i64 {
    (slot_cost.max(Decimal::ZERO) * Decimal::from(SLOT_SCALE))
        .ceil()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// 容量单位（向下取整）
pub(crate) fn capacity_units(ceiling: Decimal) -> i64 {
    (ceiling.max(Decimal::ZERO) * Decimal::from(SLOT_SCALE))
        .floor()
        .to_i64()
        .unwrap_or(i64::MAX)
}

pub(crate) fn point_units(points: Decimal) -> i64 {
    (points.max(Decimal::ZERO) * Decimal::from(POINT_SCALE))
        .round()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// 效率降序 → 作者数升序 → id 升序
pub(crate) fn compare_by_efficiency(a: &Candidate, b: &Candidate) -> Ordering {
    b.efficiency()
        .cmp(&a.efficiency())
        .then_with(|| a.author_count.cmp(&b.author_count))
        .then_with(|| a.id.cmp(&b.id))
}

pub(crate) fn efficiency_order(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut ordered = candidates.to_vec();
    ordered.sort_by(compare_by_efficiency);
    ordered
}

/// 离散化后的候选（求解器内部表示）
#[derive(Debug, Clone, Copy)]
pub(crate) struct Item {
    pub cost: i64,
    pub value: i64,
    pub mono: bool,
}

impl Item {
    pub fn from_candidate(c: &Candidate) -> Self {
        Self {
            cost: cost_units(c.slot_cost),
            value: point_units(c.points),
            mono: c.is_monograph(),
        }
    }
}
