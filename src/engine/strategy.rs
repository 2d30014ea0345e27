// ==========================================
// 科研成果评估系统 - 选优策略定义
// ==========================================
// 用途：
// - 学科选优时选择求解器（确定性背包 / 遗传算法）；
// - 不限机构总槽位的试算变体（只影响机构层约束，不影响作者专著上限）。

use crate::config::solver_profile::GeneticParameters;
use crate::engine::solver::{GeneticSolver, KnapsackSolver, SelectionSolver};
use serde::{Deserialize, Serialize};

/// 选优策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStrategy {
    Knapsack,
    KnapsackUnbounded,
    Genetic,
}

impl SolverStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStrategy::Knapsack => "knapsack",
            SolverStrategy::KnapsackUnbounded => "knapsack_unbounded",
            SolverStrategy::Genetic => "genetic",
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            SolverStrategy::Knapsack => "背包算法",
            SolverStrategy::KnapsackUnbounded => "背包算法（不限机构总量）",
            SolverStrategy::Genetic => "遗传算法",
        }
    }

    /// 是否忽略机构总槽位上限
    pub fn ignores_institution_total(&self) -> bool {
        matches!(self, SolverStrategy::KnapsackUnbounded)
    }

    /// 构造作者层求解器；遗传参数只对 Genetic 生效
    pub fn build_solver(&self, genetic: &GeneticParameters) -> Box<dyn SelectionSolver> {
        match self {
            SolverStrategy::Knapsack | SolverStrategy::KnapsackUnbounded => {
                Box::new(KnapsackSolver::new())
            }
            SolverStrategy::Genetic => Box::new(GeneticSolver::new(genetic.clone())),
        }
    }
}

impl Default for SolverStrategy {
    fn default() -> Self {
        SolverStrategy::Knapsack
    }
}

impl std::fmt::Display for SolverStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SolverStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "knapsack" => Ok(SolverStrategy::Knapsack),
            "knapsack_unbounded" | "knapsack-unbounded" => Ok(SolverStrategy::KnapsackUnbounded),
            "genetic" => Ok(SolverStrategy::Genetic),
            other => Err(format!("未知策略类型: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_str_accepts_both_separators() {
        assert_eq!(
            SolverStrategy::from_str("knapsack-unbounded").unwrap(),
            SolverStrategy::KnapsackUnbounded
        );
        assert_eq!(SolverStrategy::from_str(" Genetic ").unwrap(), SolverStrategy::Genetic);
        assert!(SolverStrategy::from_str("simplex").is_err());
    }

    #[test]
    fn test_build_solver_by_strategy() {
        let params = GeneticParameters::default();
        assert_eq!(SolverStrategy::Knapsack.build_solver(&params).name(), "knapsack");
        assert_eq!(SolverStrategy::KnapsackUnbounded.build_solver(&params).name(), "knapsack");
        assert_eq!(SolverStrategy::Genetic.build_solver(&params).name(), "genetic");
    }

    #[test]
    fn test_only_unbounded_ignores_institution_total() {
        assert!(SolverStrategy::KnapsackUnbounded.ignores_institution_total());
        assert!(!SolverStrategy::Knapsack.ignores_institution_total());
        assert!(!SolverStrategy::Genetic.ignores_institution_total());
    }
}
