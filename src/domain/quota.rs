// ==========================================
// 科研成果评估系统 - 额度领域模型
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 评估年度区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl YearRange {
    pub fn new(from: i32, to: i32) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.from && year <= self.to
    }

    pub fn year_count(&self) -> i32 {
        self.to - self.from + 1
    }
}

// ==========================================
// QuotaRecord - 作者额度
// ==========================================
// 计算得出，不允许直接录入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub author_id: i64,
    pub discipline_id: i64,
    pub years: YearRange,
    pub n_value: Decimal,            // 学科 N
    pub author_share: Decimal,       // 作者年度份额之和
    pub total_slot_ceiling: Decimal, // 总槽位上限
    pub mono_slot_ceiling: Decimal,  // 专著槽位上限
    pub in_n: bool,                  // 作者类别是否计入 N
}

// ==========================================
// DisciplineQuota - 学科（机构层）额度
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineQuota {
    pub discipline_id: i64,
    pub years: YearRange,
    pub n_value: Decimal,
    pub institution_total_ceiling: Decimal,
    pub institution_mono_ceiling: Decimal,
    pub excluded: bool,              // N 低于阈值，不参与选优
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_range_normalizes_order() {
        let r = YearRange::new(2021, 2019);
        assert_eq!(r.from, 2019);
        assert_eq!(r.to, 2021);
        assert_eq!(r.year_count(), 3);
        assert!(r.contains(2020));
        assert!(!r.contains(2022));
    }
}
