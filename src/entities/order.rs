use sea_orm::entity::prelude::*;
use serde::Serialize;
use std::str::FromStr;

use crate::entities::order_item::Entity as OrderItem;
use crate::entities::user::Entity as User;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Assigned once at creation, never regenerated.
    #[sea_orm(unique)]
    pub order_number: String,
    #[sea_orm(indexed)]
    pub user_id: i32,
    pub status: Status,
    /// Sum of line subtotals, computed at placement and immutable after.
    pub total_amount: f32,
    pub shipping_address: String,
    pub contact_phone: Option<String>,
    pub contact_email: String,
    pub payment_method: PaymentMethod,
    pub payment_status: String,
    pub notes: Option<String>,
    pub prescription_id: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(
    enum_name = "order_status_enum",
    db_type = "String(StringLen::N(16))",
    rs_type = "String"
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Status {
    /// pending -> approved | rejected | cancelled
    /// approved -> completed | cancelled
    /// Terminal states admit nothing.
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Approved)
                | (Status::Pending, Status::Rejected)
                | (Status::Pending, Status::Cancelled)
                | (Status::Approved, Status::Completed)
                | (Status::Approved, Status::Cancelled)
        )
    }

    /// Whether a transition into `next` from this state touches drug stock.
    pub fn stock_effect(&self, next: Status) -> StockEffect {
        match (self, next) {
            (Status::Pending, Status::Approved) => StockEffect::Deduct,
            (Status::Approved, Status::Cancelled) => StockEffect::Restock,
            _ => StockEffect::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StockEffect {
    None,
    Deduct,
    Restock,
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(
    enum_name = "payment_method_enum",
    db_type = "String(StringLen::N(32))",
    rs_type = "String"
)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "bank-transfer")]
    BankTransfer,
    #[sea_orm(string_value = "cash-on-delivery")]
    CashOnDelivery,
    #[sea_orm(string_value = "wallet")]
    Wallet,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "bank-transfer" => Ok(Self::BankTransfer),
            "cash-on-delivery" => Ok(Self::CashOnDelivery),
            "wallet" => Ok(Self::Wallet),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "User",
        from = "Column::UserId",
        to = "crate::entities::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "OrderItem")]
    Items,
}

impl Related<User> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<OrderItem> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
