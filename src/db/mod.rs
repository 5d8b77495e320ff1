use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::workflow::StockEffect;

const WARRANTY_COLUMNS: &str = "id, code, legacy_return_id, client_name, client_document, motive, \
     general_observations, state, disposition, mixed_disposition, inspector_id, \
     inspection_observations, inspected_at, responsible_user_id, decision_comment, decided_at, \
     version, created_at, updated_at, created_by, updated_by";

const ITEM_COLUMNS: &str = "id, warranty_id, material_id, quantity, lot, motive, observations, \
     condition, inspection_result, position, created_at, updated_at";

// ── Materials (read-only catalog) ─────────────────────────────────────────────

pub async fn fetch_material(pool: &PgPool, id: Uuid) -> AppResult<Material> {
    sqlx::query_as::<_, Material>("SELECT id, code, name, active FROM materials WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Material {} not found", id)))
}

// ── Warranties ────────────────────────────────────────────────────────────────

/// Insert a warranty and all of its items in one transaction.
pub async fn insert_warranty_with_items(pool: &PgPool, warranty: &Warranty) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO warranties
            (id, code, legacy_return_id, client_name, client_document, motive,
             general_observations, state, mixed_disposition, version,
             created_at, updated_at, created_by, updated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(warranty.id)
    .bind(&warranty.code)
    .bind(warranty.legacy_return_id)
    .bind(&warranty.client_name)
    .bind(&warranty.client_document)
    .bind(&warranty.motive)
    .bind(&warranty.general_observations)
    .bind(warranty.state)
    .bind(warranty.mixed_disposition)
    .bind(warranty.version)
    .bind(warranty.created_at)
    .bind(warranty.updated_at)
    .bind(warranty.created_by)
    .bind(warranty.updated_by)
    .execute(&mut *tx)
    .await?;

    for item in &warranty.items {
        sqlx::query(
            r#"
            INSERT INTO warranty_items
                (id, warranty_id, material_id, quantity, lot, motive, observations,
                 position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(item.id)
        .bind(item.warranty_id)
        .bind(item.material_id)
        .bind(item.quantity)
        .bind(&item.lot)
        .bind(&item.motive)
        .bind(&item.observations)
        .bind(item.position)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn fetch_warranty(pool: &PgPool, id: Uuid) -> AppResult<Warranty> {
    sqlx::query_as::<_, Warranty>(&format!(
        "SELECT {WARRANTY_COLUMNS} FROM warranties WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Warranty {} not found", id)))
}

pub async fn fetch_warranty_with_items(pool: &PgPool, id: Uuid) -> AppResult<Warranty> {
    let mut warranty = fetch_warranty(pool, id).await?;
    warranty.items = sqlx::query_as::<_, WarrantyItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM warranty_items WHERE warranty_id = $1 ORDER BY position ASC"
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;
    Ok(warranty)
}

/// Paged list with state / disposition / mixed-marker / free-text filters.
/// Sort fields are whitelisted; anything else falls back to creation time.
pub async fn list_warranties(pool: &PgPool, filters: &WarrantyFilters) -> AppResult<WarrantyPage> {
    let page = filters.page.unwrap_or(0).max(0);
    let limit = filters.limit.unwrap_or(10).clamp(1, 100);
    let offset = page * limit;

    let sort_column = match filters.sort.as_deref() {
        Some("updated_at") => "updated_at",
        Some("state") => "state",
        Some("code") => "code",
        _ => "created_at",
    };

    let search = filters
        .search
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("%{}%", s.trim()));

    let filter_clause = "($1::varchar IS NULL OR state = $1)
           AND ($2::varchar IS NULL OR disposition = $2)
           AND ($3::boolean IS NULL OR mixed_disposition = $3)
           AND ($4::text IS NULL OR code ILIKE $4 OR client_name ILIKE $4
                OR client_document ILIKE $4)";

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM warranties WHERE {filter_clause}"
    ))
    .bind(filters.state)
    .bind(filters.disposition)
    .bind(filters.mixed)
    .bind(search.as_deref())
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, Warranty>(&format!(
        "SELECT {WARRANTY_COLUMNS} FROM warranties
         WHERE {filter_clause}
         ORDER BY {sort_column} DESC
         LIMIT $5 OFFSET $6"
    ))
    .bind(filters.state)
    .bind(filters.disposition)
    .bind(filters.mixed)
    .bind(search.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(WarrantyPage {
        items,
        page,
        limit,
        total,
        total_pages: (total + limit - 1) / limit,
    })
}

/// Optimistically-guarded update of every mutable warranty field. Zero rows
/// affected means another request got there first.
async fn update_warranty(tx: &mut Transaction<'_, Postgres>, warranty: &Warranty) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE warranties
        SET state                   = $1,
            disposition             = $2,
            mixed_disposition       = $3,
            inspector_id            = $4,
            inspection_observations = $5,
            inspected_at            = $6,
            responsible_user_id     = $7,
            decision_comment        = $8,
            decided_at              = $9,
            updated_at              = $10,
            updated_by              = $11,
            version                 = version + 1
        WHERE id = $12 AND version = $13
        "#,
    )
    .bind(warranty.state)
    .bind(warranty.disposition)
    .bind(warranty.mixed_disposition)
    .bind(warranty.inspector_id)
    .bind(&warranty.inspection_observations)
    .bind(warranty.inspected_at)
    .bind(warranty.responsible_user_id)
    .bind(&warranty.decision_comment)
    .bind(warranty.decided_at)
    .bind(warranty.updated_at)
    .bind(warranty.updated_by)
    .bind(warranty.id)
    .bind(warranty.version)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ConcurrencyConflict);
    }
    Ok(())
}

async fn update_item_inspection(
    tx: &mut Transaction<'_, Postgres>,
    item: &WarrantyItem,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE warranty_items
        SET condition = $1, inspection_result = $2, observations = $3, updated_at = $4
        WHERE id = $5
        "#,
    )
    .bind(item.condition)
    .bind(item.inspection_result)
    .bind(&item.observations)
    .bind(item.updated_at)
    .bind(item.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ── Inventory ledger persistence ──────────────────────────────────────────────

/// Lock and load one material's inventory row. `FOR UPDATE` serializes
/// concurrent ledger mutations on the same material for the life of the tx.
async fn fetch_inventory_for_update(
    tx: &mut Transaction<'_, Postgres>,
    material_id: Uuid,
) -> AppResult<InventoryRecord> {
    sqlx::query_as::<_, InventoryRecord>(
        "SELECT id, material_id, available, committed, updated_at
         FROM inventories WHERE material_id = $1 FOR UPDATE",
    )
    .bind(material_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Inventory record for material {} not found",
            material_id
        ))
    })
}

async fn fetch_reorder_config(
    tx: &mut Transaction<'_, Postgres>,
    material_id: Uuid,
) -> AppResult<Option<ReorderConfig>> {
    let config = sqlx::query_as::<_, ReorderConfig>(
        "SELECT id, material_id, min_stock, reorder_point, alert_enabled
         FROM reorder_configs WHERE material_id = $1",
    )
    .bind(material_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(config)
}

/// Apply each stock effect against its material's inventory row. Any
/// ledger failure aborts the whole transaction.
async fn apply_stock_effects(
    tx: &mut Transaction<'_, Postgres>,
    effects: &[StockEffect],
) -> AppResult<()> {
    for effect in effects {
        let mut record = fetch_inventory_for_update(tx, effect.material_id).await?;
        record
            .apply_disposition(effect.quantity, effect.disposition)
            .map_err(|e| e.into_app_error(effect.material_id))?;

        sqlx::query(
            "UPDATE inventories SET available = $1, committed = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(record.available)
        .bind(record.committed)
        .bind(Utc::now())
        .bind(record.id)
        .execute(&mut **tx)
        .await?;

        debug!(
            material_id = %effect.material_id,
            disposition = %effect.disposition,
            quantity = %effect.quantity,
            "Applied stock effect"
        );

        if let Some(config) = fetch_reorder_config(tx, effect.material_id).await? {
            if record.check_reorder_alert(&config) {
                warn!(
                    material_id = %effect.material_id,
                    total = %record.total(),
                    reorder_point = %config.reorder_point,
                    "Stock at or below reorder point"
                );
            }
        }
    }
    Ok(())
}

// ── Units of work ─────────────────────────────────────────────────────────────

/// Persist a bare state transition (start review, decision, complete
/// repair, cancel): the warranty row alone, one transaction.
pub async fn persist_transition(pool: &PgPool, warranty: &Warranty) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    update_warranty(&mut tx, warranty).await?;
    tx.commit().await?;
    Ok(())
}

/// Persist an inspection: the warranty row plus every item's inspection
/// fields, atomically.
pub async fn persist_inspection(pool: &PgPool, warranty: &Warranty) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    update_warranty(&mut tx, warranty).await?;
    for item in &warranty.items {
        update_item_inspection(&mut tx, item).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Persist the legacy combined call: warranty + items + all ledger
/// mutations commit or roll back together. A partial decision (state moved
/// but stock not) can never be observed.
pub async fn persist_legacy_process(
    pool: &PgPool,
    warranty: &Warranty,
    effects: &[StockEffect],
) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    update_warranty(&mut tx, warranty).await?;
    for item in &warranty.items {
        update_item_inspection(&mut tx, item).await?;
    }
    apply_stock_effects(&mut tx, effects).await?;
    tx.commit().await?;
    Ok(())
}
