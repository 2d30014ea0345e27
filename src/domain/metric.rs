// ==========================================
// 科研成果评估系统 - 作者指标领域模型
// ==========================================
// 按 (author, discipline) 幂等更新
// ==========================================

use crate::domain::quota::YearRange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorMetric {
    pub author_id: i64,
    pub discipline_id: i64,
    pub years: YearRange,

    // ===== 额度与入选 =====
    pub slot_ceiling: Decimal,
    pub slot_achieved: Decimal,
    pub points_achieved: Decimal,
    pub avg_points_per_slot: Decimal,

    // ===== 全部成果 =====
    pub slot_achieved_all_works: Decimal,
    pub points_achieved_all_works: Decimal,
    pub avg_points_per_slot_all_works: Decimal,

    pub utilization_pct: Decimal,

    pub selected_publication_ids: Vec<i64>,
    pub unselected_publication_ids: Vec<i64>,
}
