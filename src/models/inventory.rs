use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Material catalog entry. The catalog is maintained elsewhere; this service
/// only reads it to validate item references.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Material {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub active: bool,
}

/// Per-material stock counters, split into available and committed.
/// Total stock is derived and never stored or set directly.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub material_id: Uuid,
    pub available: Decimal,
    pub committed: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn total(&self) -> Decimal {
        self.available + self.committed
    }
}

/// Reorder threshold configuration for one material.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReorderConfig {
    pub id: Uuid,
    pub material_id: Uuid,
    pub min_stock: Decimal,
    pub reorder_point: Decimal,
    pub alert_enabled: bool,
}
