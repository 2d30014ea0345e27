// ==========================================
// 科研成果评估系统 - 槽位缓存领域模型
// ==========================================
// 派生数据: 只能由 PointsCache 从成果 + 关联 + 规则表重建，禁止手工修改
// ==========================================

use crate::domain::types::{PublicationKind, Tier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// (成果, 学科) 维度缓存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCacheDiscipline {
    pub publication_id: i64,
    pub discipline_id: i64,
    pub tier: Tier,
    pub multiplier: Decimal,
    pub points_share: Decimal,   // PKD: 学科分得分值
}

/// (成果, 作者) 维度缓存
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCacheAuthor {
    pub publication_id: i64,
    pub author_id: i64,
    pub discipline_id: i64,
    pub slot: Decimal,           // 作者槽位
    pub points: Decimal,         // 作者分得分值
}

/// 选优候选行（缓存 + 成果元数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorWork {
    pub publication_id: i64,
    pub author_id: i64,
    pub discipline_id: i64,
    pub kind: PublicationKind,
    pub year: i32,
    pub slot: Decimal,
    pub points: Decimal,
    pub author_count: u32,       // 成果上已绑定学科的作者数
}
