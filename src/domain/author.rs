// ==========================================
// 科研成果评估系统 - 作者与学科领域模型
// ==========================================
// 来源: 组织人事数据（按年度申报）
// ==========================================

use crate::domain::types::AuthorKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discipline {
    pub id: i64,
    pub code: String,
    pub name: String,
}

// ==========================================
// AuthorDisciplineAssignment - 年度学科申报
// ==========================================
// 每个作者每年一条；除显式更正外不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorDisciplineAssignment {
    pub author_id: i64,
    pub year: i32,
    pub discipline_id: i64,
    pub sub_discipline_id: Option<i64>,
    pub employment_fraction: Option<Decimal>, // 工作量比例 [0,1]，缺失则无法计算额度
    pub declared_share: Decimal,              // 申报学科占比（百分数）
    pub author_kind: AuthorKind,
}
