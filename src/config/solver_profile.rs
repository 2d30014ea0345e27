use serde::{Deserialize, Serialize};

/// 遗传策略参数（持久化对象）
///
/// 存储位置：config_kv（scope_id='global'，key='genetic_profile'）
/// 缺省字段取默认值，允许只覆盖部分参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticParameters {
    /// 种群规模
    pub population_size: usize,

    /// 最大代数
    pub max_generations: usize,

    /// 变异概率（0~1）
    pub mutation_rate: f64,

    /// 交叉概率（0~1）
    pub crossover_rate: f64,

    /// 每代直接保留的精英个体数
    pub elite_count: usize,

    /// 连续多少代最优值不变即停止
    pub saturate_generations: usize,

    /// 随机种子（固定种子保证可复现）
    pub seed: u64,

    /// 墙钟预算（毫秒）
    pub time_budget_ms: u64,

    /// 结束后是否做相邻交换局部搜索
    pub local_search: bool,
}

impl Default for GeneticParameters {
    fn default() -> Self {
        Self {
            population_size: 60,
            max_generations: 300,
            mutation_rate: 0.2,
            crossover_rate: 0.8,
            elite_count: 2,
            saturate_generations: 40,
            seed: 42,
            time_budget_ms: 2_000,
            local_search: true,
        }
    }
}

impl GeneticParameters {
    /// 修正越界参数
    pub fn normalized(mut self) -> Self {
        self.population_size = self.population_size.max(2);
        self.elite_count = self.elite_count.min(self.population_size);
        self.mutation_rate = self.mutation_rate.clamp(0.0, 1.0);
        self.crossover_rate = self.crossover_rate.clamp(0.0, 1.0);
        self
    }
}
