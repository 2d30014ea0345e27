// ==========================================
// 科研成果评估系统 - 选优运行领域模型
// ==========================================
// OptimizationRun 1─N OptimizationAuthorResult 1─N OptimizationPublication
// 每次求解新建；同一学科的旧运行被整体替换
// ==========================================

use crate::domain::quota::YearRange;
use crate::domain::types::{PublicationKind, RunStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub run_id: String,
    pub discipline_id: i64,
    pub institution: String,
    pub years: YearRange,
    pub strategy: String,
    pub status: RunStatus,

    // ===== 汇总 =====
    pub total_points: Decimal,
    pub total_slots: Decimal,
    pub mono_slots: Decimal,
    pub publication_count: i64,

    // ===== 校验 =====
    pub low_mono_count: i64,
    pub low_mono_percentage: Decimal,
    pub outside_n_percentage: Decimal,
    pub validation_passed: bool,
    pub is_optimal: bool,             // false = 尽力解（未证明最优）

    pub config_snapshot: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationAuthorResult {
    pub run_id: String,
    pub author_id: i64,
    pub points_achieved: Decimal,
    pub slots_achieved: Decimal,
    pub mono_slots_achieved: Decimal,
    pub total_slot_ceiling: Decimal,  // 额度快照
    pub mono_slot_ceiling: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationPublication {
    pub run_id: String,
    pub author_id: i64,
    pub publication_id: i64,
    pub kind: PublicationKind,
    pub points: Decimal,
    pub slot_cost: Decimal,
    pub is_low_mono: bool,
}

/// 一次学科选优的完整输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub run: OptimizationRun,
    pub author_results: Vec<OptimizationAuthorResult>,
    pub publications: Vec<OptimizationPublication>,
}

impl OptimizationOutcome {
    pub fn total_points(&self) -> Decimal {
        self.run.total_points
    }

    /// 某作者入选的成果
    pub fn selected_for(&self, author_id: i64) -> impl Iterator<Item = &OptimizationPublication> {
        self.publications
            .iter()
            .filter(move |p| p.author_id == author_id)
    }

    pub fn author_result(&self, author_id: i64) -> Option<&OptimizationAuthorResult> {
        self.author_results.iter().find(|r| r.author_id == author_id)
    }
}
