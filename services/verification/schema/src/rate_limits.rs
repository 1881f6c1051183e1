use sea_orm::entity::prelude::*;

/// One accepted action. Rows are append-only; the live count for a window is
/// `SUM(count)` over rows whose `window_start` falls inside it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rate_limits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: i64,
    /// `code_request` or `code_verify`.
    pub action_kind: String,
    pub window_start: chrono::DateTime<chrono::Utc>,
    pub count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
