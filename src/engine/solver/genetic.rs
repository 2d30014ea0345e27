// ==========================================
// 科研成果评估系统 - 遗传算法求解器
// ==========================================
// 编码: 候选排列；解码: 按排列顺序贪心放入（始终可行）
// 适应度: Σ 分值（下限 0，等价于"不选"）
// 终止: 饱和代数 / 最大代数 / 墙钟预算，返回当前最优可行解
// ==========================================

use super::{
    capacity_units, compare_by_efficiency, Candidate, Item, Selection, SelectionSolver,
};
use crate::config::solver_profile::GeneticParameters;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};
use tracing::debug;

const TOURNAMENT_SIZE: usize = 3;

#[derive(Debug, Clone)]
struct Individual {
    order: Vec<usize>,
    fitness: i64,
}

/// 解码上下文
struct Decoder<'a> {
    items: &'a [Item],
    total_capacity: i64,
    mono_capacity: i64,
}

impl<'a> Decoder<'a> {
    /// 按顺序贪心放入，返回 (选中标记, 适应度)
    fn decode(&self, order: &[usize]) -> (Vec<bool>, i64) {
        let mut picked = vec![false; self.items.len()];
        let mut used_total = 0i64;
        let mut used_mono = 0i64;
        let mut fitness = 0i64;
        for &i in order {
            let item = &self.items[i];
            if item.value <= 0 || used_total + item.cost > self.total_capacity {
                continue;
            }
            if item.mono && used_mono + item.cost > self.mono_capacity {
                continue;
            }
            used_total += item.cost;
            if item.mono {
                used_mono += item.cost;
            }
            fitness += item.value;
            picked[i] = true;
        }
        (picked, fitness)
    }

    fn evaluate(&self, order: Vec<usize>) -> Individual {
        let (_, fitness) = self.decode(&order);
        Individual { order, fitness }
    }
}

pub struct GeneticSolver {
    params: GeneticParameters,
}

impl GeneticSolver {
    pub fn new(params: GeneticParameters) -> Self {
        Self {
            params: params.normalized(),
        }
    }

    pub fn params(&self) -> &GeneticParameters {
        &self.params
    }

    fn initial_population(
        &self,
        decoder: &Decoder<'_>,
        efficiency: &[usize],
        by_points: &[usize],
        rng: &mut SmallRng,
    ) -> Vec<Individual> {
        let size = self.params.population_size;
        let n = efficiency.len();
        let mut population = Vec::with_capacity(size);
        population.push(decoder.evaluate(efficiency.to_vec()));
        population.push(decoder.evaluate(by_points.to_vec()));

        // 一半随机排列，一半在效率序上做少量扰动
        while population.len() < size {
            let mut order = efficiency.to_vec();
            if population.len() % 2 == 0 {
                order.shuffle(rng);
            } else if n >= 2 {
                let swaps = (n / 4).max(1);
                for _ in 0..swaps {
                    let i = rng.random_range(0..n);
                    let j = rng.random_range(0..n);
                    order.swap(i, j);
                }
            }
            population.push(decoder.evaluate(order));
        }
        population.truncate(size);
        population
    }

    fn tournament<'p>(&self, population: &'p [Individual], rng: &mut SmallRng) -> &'p Individual {
        let mut best = &population[rng.random_range(0..population.len())];
        for _ in 1..TOURNAMENT_SIZE {
            let other = &population[rng.random_range(0..population.len())];
            if other.fitness > best.fitness {
                best = other;
            }
        }
        best
    }

    /// 相邻交换局部搜索（首次改进即接受）；与进化阶段共用墙钟预算
    fn local_search(
        &self,
        decoder: &Decoder<'_>,
        mut best: Individual,
        started: Instant,
        budget: Duration,
    ) -> Individual {
        let n = best.order.len();
        if n < 2 {
            return best;
        }
        for _ in 0..n {
            let mut improved = false;
            for i in 0..n - 1 {
                if started.elapsed() >= budget {
                    return best;
                }
                let mut order = best.order.clone();
                order.swap(i, i + 1);
                let trial = decoder.evaluate(order);
                if trial.fitness > best.fitness {
                    best = trial;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        best
    }
}

/// 顺序交叉 (OX1)：保留 p1 的一段，其余按 p2 中的相对顺序填充
fn order_crossover(p1: &[usize], p2: &[usize], rng: &mut SmallRng) -> Vec<usize> {
    let n = p1.len();
    if n < 2 {
        return p1.to_vec();
    }
    let mut a = rng.random_range(0..n);
    let mut b = rng.random_range(0..n);
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }

    let mut child = vec![usize::MAX; n];
    let mut used = vec![false; n];
    for i in a..=b {
        child[i] = p1[i];
        used[p1[i]] = true;
    }

    let mut fill = p2.iter().copied().filter(|g| !used[*g]);
    for slot in child.iter_mut() {
        if *slot == usize::MAX {
            if let Some(g) = fill.next() {
                *slot = g;
            }
        }
    }
    child
}

fn swap_mutation(order: &mut [usize], rng: &mut SmallRng) {
    let n = order.len();
    if n < 2 {
        return;
    }
    let i = rng.random_range(0..n);
    let j = rng.random_range(0..n);
    order.swap(i, j);
}

impl SelectionSolver for GeneticSolver {
    fn name(&self) -> &'static str {
        "genetic"
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

        let started = Instant::now();
        let budget = Duration::from_millis(self.params.time_budget_ms);
        let mut rng = SmallRng::seed_from_u64(self.params.seed);

        let items: Vec<Item> = candidates.iter().map(Item::from_candidate).collect();
        let total_capacity = capacity_units(total_ceiling);
        let decoder = Decoder {
            items: &items,
            total_capacity,
            mono_capacity: capacity_units(mono_ceiling).min(total_capacity),
        };

        let n = candidates.len();
        let mut efficiency: Vec<usize> = (0..n).collect();
        efficiency.sort_by(|&a, &b| compare_by_efficiency(&candidates[a], &candidates[b]));
        let mut by_points: Vec<usize> = (0..n).collect();
        by_points.sort_by(|&a, &b| {
            candidates[b]
                .points
                .cmp(&candidates[a].points)
                .then_with(|| candidates[a].id.cmp(&candidates[b].id))
        });

        let mut population = self.initial_population(&decoder, &efficiency, &by_points, &mut rng);
        population.sort_by(|a, b| b.fitness.cmp(&a.fitness));
        let mut best = population[0].clone();
        let mut stale = 0usize;
        let mut generation = 0usize;

        while generation < self.params.max_generations {
            if stale >= self.params.saturate_generations || started.elapsed() >= budget {
                break;
            }
            generation += 1;

            let mut next: Vec<Individual> = population
                .iter()
                .take(self.params.elite_count)
                .cloned()
                .collect();

            while next.len() < self.params.population_size {
                let p1 = self.tournament(&population, &mut rng);
                let p2 = self.tournament(&population, &mut rng);
                let mut order = if rng.random_bool(self.params.crossover_rate) {
                    order_crossover(&p1.order, &p2.order, &mut rng)
                } else {
                    p1.order.clone()
                };
                if rng.random_bool(self.params.mutation_rate) {
                    swap_mutation(&mut order, &mut rng);
                }
                next.push(decoder.evaluate(order));
            }

            next.sort_by(|a, b| b.fitness.cmp(&a.fitness));
            population = next;

            if population[0].fitness > best.fitness {
                best = population[0].clone();
                stale = 0;
            } else {
                stale += 1;
            }
        }

        if self.params.local_search {
            best = self.local_search(&decoder, best, started, budget);
        }

        let (picked, fitness) = decoder.decode(&best.order);
        let selected: Vec<Candidate> = best
            .order
            .iter()
            .filter(|&&i| picked[i])
            .map(|&i| candidates[i].clone())
            .collect();

        debug!(
            generation,
            fitness,
            selected = selected.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "遗传算法求解完成"
        );

        // 全部选中时平凡最优，其余情况均为尽力解
        let is_optimal = selected.len() == n;
        Selection::from_candidates(selected, is_optimal)
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
    fn test_order_crossover_is_permutation() {
        let mut rng = SmallRng::seed_from_u64(42);
        let p1: Vec<usize> = (0..10).collect();
        let mut p2 = p1.clone();
        p2.reverse();
        for _ in 0..50 {
            let mut child = order_crossover(&p1, &p2, &mut rng);
            child.sort_unstable();
            assert_eq!(child, p1);
        }
    }

    #[test]
    fn test_finds_better_combination_than_efficiency_greedy() {
        let c = [
            cand(1, "140", "1", PublicationKind::Article),
            cand(2, "100", "0.75", PublicationKind::Article),
            cand(3, "100", "0.75", PublicationKind::Article),
        ];
        let s = GeneticSolver::new(GeneticParameters::default()).solve(&c, dec("1.5"), dec("0"));
        assert_eq!(s.total_points, dec("200"));
        assert!(!s.is_optimal);
    }

    #[test]
    fn test_same_seed_same_result() {
        let c: Vec<Candidate> = (1..=12)
            .map(|i| {
                cand(
                    i,
                    &format!("{}", 20 + i * 7),
                    if i % 3 == 0 { "0.7071" } else { "0.5" },
                    if i % 4 == 0 { PublicationKind::Book } else { PublicationKind::Article },
                )
            })
            .collect();
        let solver = GeneticSolver::new(GeneticParameters::default());
        let a = solver.solve(&c, dec("2.5"), dec("0.5"));
        let b = solver.solve(&c, dec("2.5"), dec("0.5"));
        assert_eq!(a, b);
        assert!(a.total_slots <= dec("2.5"));
        assert!(a.mono_slots <= dec("0.5"));
    }

    #[test]
    fn test_zero_budget_still_returns_feasible() {
        let params = GeneticParameters {
            max_generations: 0,
            local_search: false,
            ..Default::default()
        };
        let c = [
            cand(1, "200", "1", PublicationKind::Book),
            cand(2, "100", "1", PublicationKind::Article),
        ];
        let s = GeneticSolver::new(params).solve(&c, dec("1"), dec("1"));
        assert_eq!(s.total_points, dec("200"));
    }

    #[test]
    fn test_local_search_stops_when_budget_spent() {
        let c = [
            cand(1, "50", "1", PublicationKind::Article),
            cand(2, "100", "1", PublicationKind::Article),
        ];
        let items: Vec<Item> = c.iter().map(Item::from_candidate).collect();
        let decoder = Decoder {
            items: &items,
            total_capacity: capacity_units(dec("1")),
            mono_capacity: 0,
        };
        let solver = GeneticSolver::new(GeneticParameters::default());
        // 贪心按 [1, 2] 只能放入 1；交换后可放入 2
        let start = decoder.evaluate(vec![0, 1]);

        let spent = solver.local_search(&decoder, start.clone(), Instant::now(), Duration::ZERO);
        assert_eq!(spent.order, vec![0, 1]);
        assert_eq!(spent.fitness, start.fitness);

        let improved =
            solver.local_search(&decoder, start.clone(), Instant::now(), Duration::from_secs(60));
        assert_eq!(improved.order, vec![1, 0]);
        assert!(improved.fitness > start.fitness);
    }

    #[test]
    fn test_all_selected_is_optimal() {
        let c = [cand(1, "20", "0.5", PublicationKind::Article)];
        let s = GeneticSolver::new(GeneticParameters::default()).solve(&c, dec("4"), dec("2"));
        assert!(s.is_optimal);
        assert_eq!(s.selected.len(), 1);
    }
}
