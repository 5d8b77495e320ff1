//! Warranty lifecycle: the state machine, the inspection/decision
//! processor, and the legacy single-call adapter.
//!
//! Everything here operates on plain `Warranty` values and is
//! persistence-free. Each operation checks *all* preconditions (state
//! legality, every referenced item id) before the first field write, so a
//! failed call leaves the value exactly as it was. Stock effects are
//! returned as data for the db layer to apply inside the same transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Disposition, InspectionEntry, InspectionResult, ItemCondition, LegacyItemEntry, LegacyResult,
    Warranty, WarrantyState,
};

/// One ledger mutation owed to a disposition decision, keyed by the
/// individual item's material and destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockEffect {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub disposition: Disposition,
}

fn guard(w: &Warranty, action: &'static str, allowed: &[WarrantyState]) -> Result<(), AppError> {
    if allowed.contains(&w.state) {
        return Ok(());
    }
    Err(AppError::InvalidStateTransition {
        from: w.state.to_string(),
        action,
    })
}

/// Index this warranty's items by id, failing `ItemNotFound` on the first
/// entry id that does not belong to it. Runs before any mutation so a bad
/// batch rejects wholesale.
fn resolve_items<'a, I>(w: &Warranty, ids: I) -> Result<HashMap<Uuid, usize>, AppError>
where
    I: Iterator<Item = &'a Uuid>,
{
    let index: HashMap<Uuid, usize> = w
        .items
        .iter()
        .enumerate()
        .map(|(pos, item)| (item.id, pos))
        .collect();
    for id in ids {
        if !index.contains_key(id) {
            return Err(AppError::ItemNotFound(*id));
        }
    }
    Ok(index)
}

// ── State machine ─────────────────────────────────────────────────────────────

/// RECEIVED → IN_REVIEW.
pub fn start_review(w: &mut Warranty, actor: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
    guard(w, "start review on", &[WarrantyState::Received])?;
    w.state = WarrantyState::InReview;
    touch(w, actor, now);
    Ok(())
}

/// RECEIVED | IN_REVIEW → PENDING_DECISION, recording per-item inspection
/// outcomes and the inspection stamp. All-or-nothing over the entry batch.
pub fn record_inspection(
    w: &mut Warranty,
    inspector_id: Uuid,
    observations: Option<String>,
    entries: &[InspectionEntry],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    guard(
        w,
        "record an inspection on",
        &[WarrantyState::Received, WarrantyState::InReview],
    )?;
    let index = resolve_items(w, entries.iter().map(|e| &e.item_id))?;

    for entry in entries {
        let item = &mut w.items[index[&entry.item_id]];
        item.condition = Some(entry.condition);
        item.inspection_result = Some(entry.result);
        item.updated_at = now;
    }
    stamp_inspection(w, inspector_id, observations, now);
    touch(w, inspector_id, now);
    Ok(())
}

/// PENDING_DECISION → IN_REPAIR (repair) or COMPLETED (restock/dispose).
/// Stock is *not* touched here; only the legacy combined path mutates the
/// ledger (see DESIGN.md).
pub fn confirm_decision(
    w: &mut Warranty,
    disposition: Disposition,
    responsible_user_id: Uuid,
    comment: Option<String>,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    guard(w, "confirm a decision on", &[WarrantyState::PendingDecision])?;
    apply_decision(w, disposition, responsible_user_id, comment, now);
    touch(w, actor, now);
    Ok(())
}

/// IN_REPAIR → COMPLETED.
pub fn complete_repair(w: &mut Warranty, actor: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
    guard(w, "complete repair on", &[WarrantyState::InRepair])?;
    w.state = WarrantyState::Completed;
    touch(w, actor, now);
    Ok(())
}

/// Any non-terminal state → CANCELED.
pub fn cancel(w: &mut Warranty, actor: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
    if w.state.is_terminal() {
        return Err(AppError::InvalidStateTransition {
            from: w.state.to_string(),
            action: "cancel",
        });
    }
    w.state = WarrantyState::Canceled;
    touch(w, actor, now);
    Ok(())
}

// ── Legacy combined path ──────────────────────────────────────────────────────

/// Translate a legacy verdict + destination into the modern condition /
/// result pair. A FIT verdict wins regardless of destination; a damaged or
/// unrecoverable item is repairable only when it is actually headed to
/// repair.
pub fn map_legacy_result(
    result: LegacyResult,
    destination: Disposition,
) -> (ItemCondition, InspectionResult) {
    match result {
        LegacyResult::Fit => (ItemCondition::Good, InspectionResult::FitForRestock),
        LegacyResult::Damaged | LegacyResult::Unrecoverable => {
            let condition = if result == LegacyResult::Damaged {
                ItemCondition::Damaged
            } else {
                ItemCondition::Unrecoverable
            };
            let outcome = if destination == Disposition::Repair {
                InspectionResult::Repairable
            } else {
                InspectionResult::NotRepairable
            };
            (condition, outcome)
        }
    }
}

/// The fused legacy call: inspection + decision + stock effects in one step.
///
/// Each entry mutates its item and yields a per-item `StockEffect` keyed by
/// that entry's destination. If every entry shares one destination the
/// warranty takes the collective decision (IN_REPAIR or COMPLETED);
/// otherwise it lands in PENDING_DECISION with no disposition and the
/// `mixed_disposition` marker set for manual resolution.
///
/// An entry carrying observations overwrites the item's note; an entry
/// without one leaves the note recorded at creation in place (it is never
/// cleared to null by omission).
pub fn process_legacy(
    w: &mut Warranty,
    entries: &[LegacyItemEntry],
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<StockEffect>, AppError> {
    guard(
        w,
        "process",
        &[WarrantyState::Received, WarrantyState::InReview],
    )?;
    let index = resolve_items(w, entries.iter().map(|e| &e.item_id))?;

    let mut effects = Vec::with_capacity(entries.len());
    let mut common: Option<Disposition> = None;
    let mut unanimous = true;

    for entry in entries {
        let item = &mut w.items[index[&entry.item_id]];
        let (condition, result) = map_legacy_result(entry.result, entry.destination);
        item.condition = Some(condition);
        item.inspection_result = Some(result);
        if entry.observations.is_some() {
            item.observations = entry.observations.clone();
        }
        item.updated_at = now;

        match common {
            None => common = Some(entry.destination),
            Some(d) if d != entry.destination => unanimous = false,
            Some(_) => {}
        }

        effects.push(StockEffect {
            material_id: item.material_id,
            quantity: item.quantity,
            disposition: entry.destination,
        });
    }

    match common {
        Some(destination) if unanimous => {
            stamp_inspection(w, actor, None, now);
            apply_decision(
                w,
                destination,
                actor,
                Some("Processed via legacy combined call".to_string()),
                now,
            );
        }
        _ => {
            // Destinations disagree (or the batch was empty): park the
            // warranty for a manual collective decision.
            stamp_inspection(
                w,
                actor,
                Some("Inspection recorded via legacy combined call".to_string()),
                now,
            );
            w.mixed_disposition = !unanimous;
        }
    }
    touch(w, actor, now);
    Ok(effects)
}

// ── Stamps ────────────────────────────────────────────────────────────────────

fn stamp_inspection(
    w: &mut Warranty,
    inspector_id: Uuid,
    observations: Option<String>,
    now: DateTime<Utc>,
) {
    w.inspector_id = Some(inspector_id);
    if observations.is_some() {
        w.inspection_observations = observations;
    }
    w.inspected_at = Some(now);
    w.state = WarrantyState::PendingDecision;
}

fn apply_decision(
    w: &mut Warranty,
    disposition: Disposition,
    responsible_user_id: Uuid,
    comment: Option<String>,
    now: DateTime<Utc>,
) {
    w.disposition = Some(disposition);
    w.responsible_user_id = Some(responsible_user_id);
    w.decision_comment = comment;
    w.decided_at = Some(now);
    w.state = match disposition {
        Disposition::Repair => WarrantyState::InRepair,
        Disposition::Restock | Disposition::Dispose => WarrantyState::Completed,
    };
}

fn touch(w: &mut Warranty, actor: Uuid, now: DateTime<Utc>) {
    w.updated_by = actor;
    w.updated_at = now;
}
