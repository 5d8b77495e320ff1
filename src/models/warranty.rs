use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Enums ─────────────────────────────────────────────────────────────────────

/// Lifecycle state of a warranty. Stored as TEXT, serialized in
/// SCREAMING_SNAKE_CASE to match the wire format of the legacy frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarrantyState {
    Received,
    InReview,
    PendingDecision,
    InRepair,
    Completed,
    Canceled,
}

impl WarrantyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyState::Received => "RECEIVED",
            WarrantyState::InReview => "IN_REVIEW",
            WarrantyState::PendingDecision => "PENDING_DECISION",
            WarrantyState::InRepair => "IN_REPAIR",
            WarrantyState::Completed => "COMPLETED",
            WarrantyState::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WarrantyState::Completed | WarrantyState::Canceled)
    }
}

impl std::fmt::Display for WarrantyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decided outcome ("destino") for a warranty or one of its items. The
/// legacy frontend still posts the Spanish spellings; they deserialize
/// onto the same variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    #[serde(alias = "REINTEGRO")]
    Restock,
    #[serde(alias = "REPARACION")]
    Repair,
    #[serde(alias = "ELIMINACION")]
    Dispose,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Disposition::Restock => "RESTOCK",
            Disposition::Repair => "REPAIR",
            Disposition::Dispose => "DISPOSE",
        };
        f.write_str(s)
    }
}

/// Physical condition of a returned item, recorded at inspection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCondition {
    Good,
    Damaged,
    Unrecoverable,
}

/// Outcome of inspecting one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionResult {
    FitForRestock,
    Repairable,
    NotRepairable,
}

/// Inspection verdict as the legacy single-call protocol spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyResult {
    #[serde(rename = "APTO", alias = "FIT")]
    Fit,
    #[serde(rename = "DAÑADO", alias = "DANADO", alias = "DAMAGED")]
    Damaged,
    #[serde(rename = "NO_RECUPERABLE", alias = "UNRECOVERABLE")]
    Unrecoverable,
}

// ── Entities ──────────────────────────────────────────────────────────────────

/// A warranty/return record. Items live in `warranty_items` and are attached
/// after the row fetch (insertion order = `position`).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Warranty {
    pub id: Uuid,
    pub code: String,
    /// External "devolución" id carried by the modern protocol for
    /// reconciliation with the legacy caller.
    pub legacy_return_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub client_document: Option<String>,
    pub motive: Option<String>,
    pub general_observations: Option<String>,
    pub state: WarrantyState,
    pub disposition: Option<Disposition>,
    /// Set by the legacy combined path when per-item destinations disagree
    /// and no collective disposition could be derived.
    pub mixed_disposition: bool,
    pub inspector_id: Option<Uuid>,
    pub inspection_observations: Option<String>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub responsible_user_id: Option<Uuid>,
    pub decision_comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Optimistic-lock counter, bumped on every persisted mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<WarrantyItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WarrantyItem {
    pub id: Uuid,
    pub warranty_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub lot: Option<String>,
    pub motive: Option<String>,
    pub observations: Option<String>,
    pub condition: Option<ItemCondition>,
    pub inspection_result: Option<InspectionResult>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warranty {
    /// Build a new warranty (state RECEIVED) with its items, all ids minted
    /// here so the caller can return them without a round-trip.
    pub fn new(req: &CreateWarranty, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let items = req
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| WarrantyItem {
                id: Uuid::new_v4(),
                warranty_id: id,
                material_id: item.material_id,
                quantity: item.quantity,
                lot: item.lot.clone(),
                motive: item.motive.clone(),
                observations: item.observations.clone(),
                condition: None,
                inspection_result: None,
                position: i as i32,
                created_at: now,
                updated_at: now,
            })
            .collect();

        Self {
            id,
            code: generate_code(),
            legacy_return_id: req.legacy_return_id,
            client_name: req.client_name.clone(),
            client_document: req.client_document.clone(),
            motive: req.motive.clone(),
            general_observations: req.general_observations.clone(),
            state: WarrantyState::Received,
            disposition: None,
            mixed_disposition: false,
            inspector_id: None,
            inspection_observations: None,
            inspected_at: None,
            responsible_user_id: None,
            decision_comment: None,
            decided_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
            created_by: req.actor_id,
            updated_by: req.actor_id,
            items,
        }
    }
}

/// Human-readable warranty code, e.g. `GAR-1717430400123-0042`.
fn generate_code() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("GAR-{}-{:04}", Utc::now().timestamp_millis(), suffix)
}

// ── Request payloads ──────────────────────────────────────────────────────────
//
// The serde aliases are the legacy/modern format adapter: the old frontend
// still posts camelCase Spanish field names, the modern protocol posts
// snake_case. Both land on the same payload structs.

#[derive(Debug, Deserialize)]
pub struct CreateWarranty {
    #[serde(alias = "actorId")]
    pub actor_id: Uuid,
    #[serde(default, alias = "idDevolucion")]
    pub legacy_return_id: Option<Uuid>,
    #[serde(default, alias = "nombreCliente", alias = "clienteNombre")]
    pub client_name: Option<String>,
    #[serde(default, alias = "documentoNit", alias = "clienteDocumento")]
    pub client_document: Option<String>,
    #[serde(default, alias = "motivo", alias = "motivoGeneral")]
    pub motive: Option<String>,
    #[serde(default, alias = "observacionesGenerales", alias = "observaciones")]
    pub general_observations: Option<String>,
    pub items: Vec<CreateWarrantyItem>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWarrantyItem {
    #[serde(alias = "idProducto", alias = "materialId")]
    pub material_id: Uuid,
    #[serde(alias = "cantidad")]
    pub quantity: Decimal,
    #[serde(default, alias = "lote")]
    pub lot: Option<String>,
    #[serde(default, alias = "motivoDevolucion", alias = "motivo")]
    pub motive: Option<String>,
    #[serde(default, alias = "observaciones")]
    pub observations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InspectionRequest {
    /// The inspecting user; also stamped as updated_by.
    #[serde(alias = "inspectorId", alias = "actorId")]
    pub actor_id: Uuid,
    #[serde(default, alias = "observaciones")]
    pub observations: Option<String>,
    pub items: Vec<InspectionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct InspectionEntry {
    #[serde(alias = "idItemGarantia", alias = "itemId")]
    pub item_id: Uuid,
    #[serde(alias = "estadoFisico")]
    pub condition: ItemCondition,
    #[serde(alias = "resultadoInspeccion")]
    pub result: InspectionResult,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    #[serde(alias = "actorId")]
    pub actor_id: Uuid,
    #[serde(alias = "destino")]
    pub disposition: Disposition,
    #[serde(alias = "usuarioResponsableId")]
    pub responsible_user_id: Uuid,
    #[serde(default, alias = "comentario")]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessLegacyRequest {
    #[serde(alias = "actorId")]
    pub actor_id: Uuid,
    pub items: Vec<LegacyItemEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyItemEntry {
    #[serde(alias = "itemId")]
    pub item_id: Uuid,
    #[serde(alias = "resultado")]
    pub result: LegacyResult,
    #[serde(default, alias = "observaciones")]
    pub observations: Option<String>,
    #[serde(alias = "destino")]
    pub destination: Disposition,
}

/// Body of the bare lifecycle transitions (start-review, complete-repair,
/// cancel): just the acting user.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    #[serde(alias = "actorId")]
    pub actor_id: Uuid,
}

// ── Query parameters / list response ──────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct WarrantyFilters {
    pub state: Option<WarrantyState>,
    pub disposition: Option<Disposition>,
    /// Filter on the mixed-disposition marker left by legacy batches.
    pub mixed: Option<bool>,
    /// Free text over code, client name and client document.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WarrantyPage {
    pub items: Vec<Warranty>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_expected_shape() {
        let code = generate_code();
        assert!(code.starts_with("GAR-"), "code was {code}");
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].parse::<i64>().is_ok(), "millis part must be numeric");
        assert_eq!(parts[2].len(), 4, "suffix must be zero-padded to 4 digits");
    }

    #[test]
    fn new_warranty_starts_received_with_ordered_items() {
        let actor = Uuid::new_v4();
        let req = CreateWarranty {
            actor_id: actor,
            legacy_return_id: None,
            client_name: Some("ACME".into()),
            client_document: None,
            motive: Some("defective batch".into()),
            general_observations: None,
            items: vec![
                CreateWarrantyItem {
                    material_id: Uuid::new_v4(),
                    quantity: Decimal::new(5, 0),
                    lot: Some("L-1".into()),
                    motive: None,
                    observations: None,
                },
                CreateWarrantyItem {
                    material_id: Uuid::new_v4(),
                    quantity: Decimal::new(2, 0),
                    lot: None,
                    motive: None,
                    observations: None,
                },
            ],
        };

        let w = Warranty::new(&req, Utc::now());
        assert_eq!(w.state, WarrantyState::Received);
        assert!(w.disposition.is_none());
        assert!(!w.mixed_disposition);
        assert_eq!(w.created_by, actor);
        assert_eq!(w.items.len(), 2);
        assert_eq!(w.items[0].position, 0);
        assert_eq!(w.items[1].position, 1);
        assert!(w.items.iter().all(|i| i.warranty_id == w.id));
        assert!(w.items.iter().all(|i| i.condition.is_none()));
    }

    #[test]
    fn legacy_create_payload_deserializes_via_aliases() {
        let json = serde_json::json!({
            "actorId": Uuid::new_v4(),
            "clienteNombre": "Juan",
            "clienteDocumento": "900123",
            "motivoGeneral": "garantía",
            "items": [{
                "materialId": Uuid::new_v4(),
                "cantidad": "3.5",
                "motivo": "roto",
            }],
        });
        let req: CreateWarranty = serde_json::from_value(json).unwrap();
        assert_eq!(req.client_name.as_deref(), Some("Juan"));
        assert_eq!(req.client_document.as_deref(), Some("900123"));
        assert_eq!(req.motive.as_deref(), Some("garantía"));
        assert_eq!(req.items[0].quantity, Decimal::new(35, 1));
    }

    #[test]
    fn legacy_process_payload_deserializes_via_aliases() {
        let json = serde_json::json!({
            "actorId": Uuid::new_v4(),
            "items": [{
                "itemId": Uuid::new_v4(),
                "resultado": "DAÑADO",
                "observaciones": "pantalla rota",
                "destino": "REPAIR",
            }],
        });
        let req: ProcessLegacyRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.items[0].result, LegacyResult::Damaged);
        assert_eq!(req.items[0].destination, Disposition::Repair);
    }

    #[test]
    fn legacy_wire_spellings_deserialize_onto_canonical_variants() {
        let destino_cases = [
            ("REINTEGRO", Disposition::Restock),
            ("REPARACION", Disposition::Repair),
            ("ELIMINACION", Disposition::Dispose),
            ("RESTOCK", Disposition::Restock),
            ("REPAIR", Disposition::Repair),
            ("DISPOSE", Disposition::Dispose),
        ];
        for (wire, want) in destino_cases {
            let got: Disposition = serde_json::from_value(serde_json::json!(wire)).unwrap();
            assert_eq!(got, want, "destino spelling {wire}");
        }

        let result_cases = [
            ("APTO", LegacyResult::Fit),
            ("FIT", LegacyResult::Fit),
            ("DAÑADO", LegacyResult::Damaged),
            ("DANADO", LegacyResult::Damaged),
            ("DAMAGED", LegacyResult::Damaged),
            ("NO_RECUPERABLE", LegacyResult::Unrecoverable),
            ("UNRECOVERABLE", LegacyResult::Unrecoverable),
        ];
        for (wire, want) in result_cases {
            let got: LegacyResult = serde_json::from_value(serde_json::json!(wire)).unwrap();
            assert_eq!(got, want, "result spelling {wire}");
        }

        // Full entry in the old frontend's shape
        let entry: LegacyItemEntry = serde_json::from_value(serde_json::json!({
            "itemId": Uuid::new_v4(),
            "resultado": "APTO",
            "destino": "REINTEGRO",
        }))
        .unwrap();
        assert_eq!(entry.result, LegacyResult::Fit);
        assert_eq!(entry.destination, Disposition::Restock);
    }

    #[test]
    fn states_serialize_screaming_snake_case() {
        let s = serde_json::to_value(WarrantyState::PendingDecision).unwrap();
        assert_eq!(s, "PENDING_DECISION");
        let d = serde_json::to_value(Disposition::Restock).unwrap();
        assert_eq!(d, "RESTOCK");
    }

    #[test]
    fn terminal_states() {
        assert!(WarrantyState::Completed.is_terminal());
        assert!(WarrantyState::Canceled.is_terminal());
        assert!(!WarrantyState::InRepair.is_terminal());
        assert!(!WarrantyState::Received.is_terminal());
    }
}
