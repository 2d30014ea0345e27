// ==========================================
// 科研成果评估系统 - 成果领域模型
// ==========================================
// 来源: 成果/作者管理模块（外部协作方写入，本系统只读）
// ==========================================

use crate::domain::types::{PublicationKind, ResponsibilityRole};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Publication - 成果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: i64,
    pub title: String,
    pub kind: PublicationKind,
    pub year: i32,
    pub points: Decimal,          // 部颁分值（定点小数）
    pub parent_id: Option<i64>,   // 章节所属图书
}

impl Publication {
    /// 图书章节（有上级图书）
    pub fn is_chapter(&self) -> bool {
        self.kind == PublicationKind::Book && self.parent_id.is_some()
    }
}

// ==========================================
// PublicationAuthorLink - 成果-作者关联
// ==========================================
// 计入评估的前提: affiliates = true && pinned = true && discipline_id 非空
// 解除绑定(pinned=false)只是不计分，不删除关联
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationAuthorLink {
    pub id: i64,
    pub publication_id: i64,
    pub author_id: i64,
    pub discipline_id: Option<i64>,
    pub affiliates: bool,
    pub pinned: bool,
    pub role: ResponsibilityRole,
    pub position: i32,            // 作者顺序
}

impl PublicationAuthorLink {
    pub fn is_credited(&self) -> bool {
        self.affiliates && self.pinned && self.discipline_id.is_some()
    }
}
