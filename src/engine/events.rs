// ==========================================
// 科研成果评估系统 - 收敛事件发布
// ==========================================
// 职责: 收敛循环在轮间对外通知（进度展示、审计、外部联动）
// 说明: Engine 层只定义 trait，调用方按需实现；发布失败只记日志，不中断收敛
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

/// 收敛事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceEventType {
    /// 本轮结果已接受并保存
    RoundAccepted,
    /// 本轮结果被拒绝
    RoundRejected,
    /// 已解除弱绑定（下一轮开始前）
    LinksDetached,
    /// 已恢复本轮解除的绑定
    LinksRestored,
}

impl ConvergenceEventType {
    pub fn as_str(&self) -> &str {
        match self {
            ConvergenceEventType::RoundAccepted => "RoundAccepted",
            ConvergenceEventType::RoundRejected => "RoundRejected",
            ConvergenceEventType::LinksDetached => "LinksDetached",
            ConvergenceEventType::LinksRestored => "LinksRestored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceEvent {
    pub discipline_id: i64,
    pub round: u32,
    pub event_type: ConvergenceEventType,
    /// 解除/恢复批次号
    pub round_id: Option<String>,
    pub total_points: Option<Decimal>,
    pub link_ids: Vec<i64>,
}

impl ConvergenceEvent {
    pub fn round_result(
        discipline_id: i64,
        round: u32,
        event_type: ConvergenceEventType,
        total_points: Decimal,
    ) -> Self {
        Self {
            discipline_id,
            round,
            event_type,
            round_id: None,
            total_points: Some(total_points),
            link_ids: Vec::new(),
        }
    }

    pub fn pin_change(
        discipline_id: i64,
        round: u32,
        event_type: ConvergenceEventType,
        round_id: &str,
        link_ids: &[i64],
    ) -> Self {
        Self {
            discipline_id,
            round,
            event_type,
            round_id: Some(round_id.to_string()),
            total_points: None,
            link_ids: link_ids.to_vec(),
        }
    }
}

/// 收敛事件发布者
///
/// 在收敛线程内同步调用；实现方不得长时间阻塞
pub trait ConvergenceEventPublisher: Send + Sync {
    fn publish(&self, event: &ConvergenceEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 可选的事件发布者包装
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ConvergenceEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn ConvergenceEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件；失败只告警
    pub fn publish(&self, event: ConvergenceEvent) {
        match &self.inner {
            Some(publisher) => {
                if let Err(e) = publisher.publish(&event) {
                    tracing::warn!(
                        discipline_id = event.discipline_id,
                        round = event.round,
                        event_type = event.event_type.as_str(),
                        error = %e,
                        "收敛事件发布失败"
                    );
                }
            }
            None => {
                tracing::trace!(
                    discipline_id = event.discipline_id,
                    event_type = event.event_type.as_str(),
                    "未配置发布者，跳过事件"
                );
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}
