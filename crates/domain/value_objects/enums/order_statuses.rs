use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Active,
    Failed,
    Canceled,
    Completed,
}

impl OrderStatus {
    /// Statuses from which a customer may still pick an installment plan.
    pub const PLAN_SELECTABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Active => "active",
            OrderStatus::Failed => "failed",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "active" => Some(OrderStatus::Active),
            "failed" => Some(OrderStatus::Failed),
            "canceled" => Some(OrderStatus::Canceled),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    /// `completed` and `canceled` orders never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Completed)
    }

    /// Whether a customer may still pick an installment plan for the order.
    pub fn accepts_plan_selection(&self) -> bool {
        Self::PLAN_SELECTABLE.contains(self)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        match (self, next) {
            (current, next) if *current == next => true,
            (Pending | Failed, Processing) => true,
            (Processing | Failed | Active, Active) => true,
            (Processing | Active, Failed) => true,
            (Active, Completed) => true,
            (current, Canceled) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
