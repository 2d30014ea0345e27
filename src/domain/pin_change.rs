// ==========================================
// 科研成果评估系统 - 绑定变更日志
// ==========================================
// 每次解除/恢复/重置绑定都留痕，回滚依据本轮记录
// ==========================================

use crate::domain::types::PinAction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinChange {
    pub round_id: String,
    pub discipline_id: Option<i64>,
    pub link_id: i64,
    pub action: PinAction,
    pub detail: Option<String>,
    pub changed_at: NaiveDateTime,
}
