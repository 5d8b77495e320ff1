//! Stock-counter mutations for one material's inventory record.
//!
//! Every operation validates before it writes: a failed call leaves the
//! record exactly as it was. Atomicity across records (and against the
//! warranty row) is the db layer's job, not this module's.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Disposition, InventoryRecord, ReorderConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("insufficient committed stock: requested {requested}, committed {committed}")]
    InsufficientCommitted {
        requested: Decimal,
        committed: Decimal,
    },
}

impl LedgerError {
    /// Lift into the service-wide taxonomy, attaching the material the
    /// failed mutation was aimed at.
    pub fn into_app_error(self, material_id: Uuid) -> AppError {
        match self {
            LedgerError::InvalidQuantity(q) => {
                AppError::InvalidQuantity(format!("quantity must be positive, got {q}"))
            }
            LedgerError::InsufficientStock {
                requested,
                available,
            } => AppError::InsufficientStock {
                material_id,
                requested,
                available,
            },
            LedgerError::InsufficientCommitted {
                requested,
                committed,
            } => AppError::InsufficientCommitted {
                requested,
                committed,
            },
        }
    }
}

fn ensure_positive(quantity: Decimal) -> Result<(), LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidQuantity(quantity));
    }
    Ok(())
}

impl InventoryRecord {
    /// Move `quantity` from available to committed. Never partially
    /// reserves: either the full quantity is available or nothing moves.
    pub fn reserve(&mut self, quantity: Decimal) -> Result<(), LedgerError> {
        ensure_positive(quantity)?;
        if self.available < quantity {
            return Err(LedgerError::InsufficientStock {
                requested: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        self.committed += quantity;
        Ok(())
    }

    /// Move `quantity` back from committed to available. Releasing more
    /// than is committed is rejected rather than clamped.
    pub fn release(&mut self, quantity: Decimal) -> Result<(), LedgerError> {
        ensure_positive(quantity)?;
        if self.committed < quantity {
            return Err(LedgerError::InsufficientCommitted {
                requested: quantity,
                committed: self.committed,
            });
        }
        self.committed -= quantity;
        self.available += quantity;
        Ok(())
    }

    /// Manual stock correction: overwrite available, leave committed alone.
    pub fn adjust_available(&mut self, new_quantity: Decimal) -> Result<(), LedgerError> {
        if new_quantity < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(new_quantity));
        }
        self.available = new_quantity;
        Ok(())
    }

    /// Apply the stock effect of a disposition decision for `quantity`
    /// units of this record's material.
    ///
    /// - RESTOCK: quantity goes back into available.
    /// - DISPOSE: taken from available first; any shortfall comes out of
    ///   committed (available floors at 0, committed may not go negative).
    /// - REPAIR: quantity moves available → committed; insufficiency is an
    ///   error, not a silent no-op.
    pub fn apply_disposition(
        &mut self,
        quantity: Decimal,
        disposition: Disposition,
    ) -> Result<(), LedgerError> {
        ensure_positive(quantity)?;
        match disposition {
            Disposition::Restock => {
                self.available += quantity;
                Ok(())
            }
            Disposition::Dispose => {
                if self.available >= quantity {
                    self.available -= quantity;
                } else {
                    let shortfall = quantity - self.available;
                    if shortfall > self.committed {
                        return Err(LedgerError::InsufficientStock {
                            requested: quantity,
                            available: self.total(),
                        });
                    }
                    self.available = Decimal::ZERO;
                    self.committed -= shortfall;
                }
                Ok(())
            }
            Disposition::Repair => self.reserve(quantity),
        }
    }

    /// True iff alerting is enabled and total stock has fallen to or below
    /// the reorder point.
    pub fn check_reorder_alert(&self, config: &ReorderConfig) -> bool {
        config.alert_enabled && self.total() <= config.reorder_point
    }
}
