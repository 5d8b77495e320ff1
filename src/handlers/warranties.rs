use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::{
    db,
    error::{AppError, AppResult},
    models::{
        ActorRequest, CreateWarranty, DecisionRequest, InspectionRequest, ProcessLegacyRequest,
        Warranty, WarrantyFilters,
    },
    workflow, AppState,
};

fn page_envelope(page: crate::models::WarrantyPage) -> serde_json::Value {
    serde_json::json!({
        "data": page.items,
        "page": page.page,
        "limit": page.limit,
        "total": page.total,
        "total_pages": page.total_pages,
    })
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_warranty(
    State(state): State<AppState>,
    Json(payload): Json<CreateWarranty>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("at least one item is required".to_string()));
    }
    for item in &payload.items {
        if item.quantity <= Decimal::ZERO {
            return Err(AppError::InvalidQuantity(format!(
                "quantity must be positive, got {}",
                item.quantity
            )));
        }
    }

    // Every material reference must resolve before anything is written.
    for item in &payload.items {
        let material = db::fetch_material(&state.db, item.material_id).await?;
        if !material.active {
            return Err(AppError::BadRequest(format!(
                "Material {} ({}) is inactive",
                material.code, material.id
            )));
        }
    }

    let warranty = Warranty::new(&payload, Utc::now());
    db::insert_warranty_with_items(&state.db, &warranty).await?;

    info!(
        id = %warranty.id,
        code = %warranty.code,
        item_count = warranty.items.len(),
        "Registered warranty"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": warranty })),
    ))
}

// ── Read ──────────────────────────────────────────────────────────────────────

pub async fn get_warranty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}

pub async fn list_warranties(
    State(state): State<AppState>,
    Query(filters): Query<WarrantyFilters>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let page = db::list_warranties(&state.db, &filters).await?;
    info!(count = page.items.len(), total = page.total, "Listed warranties");
    Ok((StatusCode::OK, Json(page_envelope(page))))
}

// ── Inspection ────────────────────────────────────────────────────────────────

pub async fn submit_inspection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InspectionRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("at least one inspection entry is required".to_string()));
    }

    let mut warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    workflow::record_inspection(
        &mut warranty,
        payload.actor_id,
        payload.observations,
        &payload.items,
        Utc::now(),
    )?;
    db::persist_inspection(&state.db, &warranty).await?;

    info!(id = %id, inspector = %payload.actor_id, "Recorded inspection");

    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}

// ── Decision (modern path) ────────────────────────────────────────────────────

/// Confirms the collective disposition. Deliberately does not touch the
/// ledger: stock only moves through the legacy combined call.
pub async fn confirm_decision(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let mut warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    workflow::confirm_decision(
        &mut warranty,
        payload.disposition,
        payload.responsible_user_id,
        payload.comment,
        payload.actor_id,
        Utc::now(),
    )?;
    db::persist_transition(&state.db, &warranty).await?;

    info!(
        id = %id,
        disposition = %payload.disposition,
        state = %warranty.state,
        "Confirmed decision"
    );

    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}

// ── Legacy combined processing ────────────────────────────────────────────────

pub async fn process_legacy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessLegacyRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("at least one item entry is required".to_string()));
    }

    let mut warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    let effects = workflow::process_legacy(&mut warranty, &payload.items, payload.actor_id, Utc::now())?;
    db::persist_legacy_process(&state.db, &warranty, &effects).await?;

    info!(
        id = %id,
        state = %warranty.state,
        mixed = warranty.mixed_disposition,
        effect_count = effects.len(),
        "Processed warranty via legacy call"
    );

    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}

// ── Lifecycle transitions ─────────────────────────────────────────────────────

pub async fn start_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let mut warranty = db::fetch_warranty(&state.db, id).await?;
    workflow::start_review(&mut warranty, payload.actor_id, Utc::now())?;
    db::persist_transition(&state.db, &warranty).await?;

    info!(id = %id, "Started review");

    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}

pub async fn complete_repair(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let mut warranty = db::fetch_warranty(&state.db, id).await?;
    workflow::complete_repair(&mut warranty, payload.actor_id, Utc::now())?;
    db::persist_transition(&state.db, &warranty).await?;

    info!(id = %id, "Completed repair");

    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let mut warranty = db::fetch_warranty(&state.db, id).await?;
    workflow::cancel(&mut warranty, payload.actor_id, Utc::now())?;
    db::persist_transition(&state.db, &warranty).await?;

    info!(id = %id, "Canceled warranty");

    let warranty = db::fetch_warranty_with_items(&state.db, id).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "data": warranty }))))
}
