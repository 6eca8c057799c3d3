use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::products;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = products)]
pub struct ProductEntity {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub stripe_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
