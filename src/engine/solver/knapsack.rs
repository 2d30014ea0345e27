// ==========================================
// 科研成果评估系统 - 确定性背包求解器
// ==========================================
// 二维 0/1 背包: dp[total_units][mono_units]，逐项保留选择位图，回溯取解
// 专著维度上限取 min(M, T)：专著槽位同时占用总槽位
// ==========================================

use super::{capacity_units, efficiency_order, Candidate, Item, Selection, SelectionSolver};
use rust_decimal::Decimal;
use tracing::debug;

/// 选择位图（每个候选一份）
struct KeepBits {
    words: Vec<u64>,
}

impl KeepBits {
    fn new(cells: usize) -> Self {
        Self {
            words: vec![0; cells.div_ceil(64)],
        }
    }

    fn set(&mut self, idx: usize) {
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    fn get(&self, idx: usize) -> bool {
        self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KnapsackSolver;

impl KnapsackSolver {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionSolver for KnapsackSolver {
    fn name(&self) -> &'static str {
        "knapsack"
    }

    fn solve(
        &self,
        candidates: &[Candidate],
        total_ceiling: Decimal,
        mono_ceiling: Decimal,
    ) -> Selection {
        if candidates.is_empty() || total_ceiling < Decimal::ZERO {
            return Selection::empty();
        }

        let ordered = efficiency_order(candidates);
        let items: Vec<Item> = ordered.iter().map(Item::from_candidate).collect();

        // 容量不超过全部候选成本之和，避免无意义的大表
        let total_cost: i64 = items.iter().map(|i| i.cost).fold(0, i64::saturating_add);
        let mono_cost: i64 = items
            .iter()
            .filter(|i| i.mono)
            .map(|i| i.cost)
            .fold(0, i64::saturating_add);
        let t = capacity_units(total_ceiling).min(total_cost);
        let m = capacity_units(mono_ceiling).min(t).min(mono_cost);

        // 全部可放入
        if total_cost <= t && mono_cost <= m {
            debug!(count = ordered.len(), "全部候选均可选入");
            return Selection::from_candidates(ordered, true);
        }

        let (t, m) = (t as usize, m as usize);
        let width = m + 1;
        let cells = (t + 1) * width;
        let mut dp = vec![0i64; cells];
        let mut keep: Vec<KeepBits> = Vec::with_capacity(items.len());

        for item in &items {
            let mut bits = KeepBits::new(cells);
            let cost = item.cost as usize;
            let fits = item.value > 0 && cost <= t && (!item.mono || cost <= m);
            if fits {
                let mono_cost = if item.mono { cost } else { 0 };
                for a in (cost..=t).rev() {
                    for b in (mono_cost..=m).rev() {
                        let idx = a * width + b;
                        let prev = (a - cost) * width + (b - mono_cost);
                        let candidate = dp[prev] + item.value;
                        if candidate > dp[idx] {
                            dp[idx] = candidate;
                            bits.set(idx);
                        }
                    }
                }
            }
            keep.push(bits);
        }

        // 回溯
        let (mut a, mut b) = (t, m);
        let mut picked = vec![false; items.len()];
        for i in (0..items.len()).rev() {
            if keep[i].get(a * width + b) {
                picked[i] = true;
                let cost = items[i].cost as usize;
                a -= cost;
                if items[i].mono {
                    b -= cost;
                }
            }
        }

        let selected: Vec<Candidate> = ordered
            .into_iter()
            .zip(picked)
            .filter_map(|(c, p)| p.then_some(c))
            .collect();

        debug!(
            selected = selected.len(),
            total_units = t,
            mono_units = m,
            "背包求解完成"
        );
        Selection::from_candidates(selected, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PublicationKind;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cand(id: i64, points: &str, slot: &str, kind: PublicationKind) -> Candidate {
        Candidate {
            id,
            points: dec(points),
            slot_cost: dec(slot),
            kind,
            author_count: 1,
        }
    }

    #[test]
    fn test_empty_or_negative_ceiling_returns_empty() {
        let solver = KnapsackSolver::new();
        let s = solver.solve(&[], dec("4"), dec("2"));
        assert!(s.selected.is_empty());
        assert_eq!(s.total_points, Decimal::ZERO);

        let c = [cand(1, "100", "1", PublicationKind::Article)];
        let s = solver.solve(&c, dec("-1"), dec("2"));
        assert!(s.selected.is_empty());
    }

    #[test]
    fn test_prefers_better_combination_over_greedy() {
        // 贪心按效率会先拿 #1(效率 140) 再无法放 #2、#3；最优是 #2 + #3
        let c = [
            cand(1, "140", "1", PublicationKind::Article),
            cand(2, "100", "0.75", PublicationKind::Article),
            cand(3, "100", "0.75", PublicationKind::Article),
        ];
        let s = KnapsackSolver::new().solve(&c, dec("1.5"), dec("0"));
        assert_eq!(s.total_points, dec("200"));
        assert!(s.contains(2) && s.contains(3));
        assert!(s.is_optimal);
    }

    #[test]
    fn test_mono_sub_ceiling_respected() {
        let c = [
            cand(1, "300", "1", PublicationKind::Book),
            cand(2, "250", "1", PublicationKind::Book),
            cand(3, "100", "1", PublicationKind::Article),
        ];
        let s = KnapsackSolver::new().solve(&c, dec("3"), dec("1"));
        assert!(s.mono_slots <= dec("1"));
        assert_eq!(s.total_points, dec("400"));
        assert!(s.contains(1) && s.contains(3));
    }

    #[test]
    fn test_all_fit_fast_path() {
        let c = [
            cand(1, "20", "0.5", PublicationKind::Article),
            cand(2, "70", "0.7071", PublicationKind::Article),
        ];
        let s = KnapsackSolver::new().solve(&c, dec("4"), dec("2"));
        assert_eq!(s.selected.len(), 2);
        assert_eq!(s.total_slots, dec("1.2071"));
    }

    #[test]
    fn test_rounding_never_overfills() {
        // 两篇 0.7071 精确合计 1.4142，离散后 142 > 141，只能选一篇
        let c = [
            cand(1, "70.71", "0.7071", PublicationKind::Article),
            cand(2, "70.71", "0.7071", PublicationKind::Article),
        ];
        let s = KnapsackSolver::new().solve(&c, dec("1.4142"), dec("0"));
        assert_eq!(s.selected.len(), 1);
        assert!(s.total_slots <= dec("1.4142"));
    }
}
