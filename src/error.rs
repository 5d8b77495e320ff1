use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    /// An inspection/decision entry referenced an item id that does not
    /// belong to the target warranty.
    #[error("Item {0} does not belong to this warranty")]
    ItemNotFound(uuid::Uuid),

    #[error("Cannot {action} a warranty in state {from}")]
    InvalidStateTransition { from: String, action: &'static str },

    #[error("Insufficient available stock for material {material_id}: requested {requested}, available {available}")]
    InsufficientStock {
        material_id: uuid::Uuid,
        requested: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Cannot release {requested} from a committed quantity of {committed}")]
    InsufficientCommitted {
        requested: rust_decimal::Decimal,
        committed: rust_decimal::Decimal,
    },

    #[error("{0}")]
    InvalidQuantity(String),

    /// Optimistic-lock failure; the caller may re-fetch and retry.
    #[error("The warranty was modified concurrently, retry the operation")]
    ConcurrencyConflict,

    #[error("{0}")]
    BadRequest(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(_) | AppError::ItemNotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::InvalidStateTransition { .. } | AppError::ConcurrencyConflict => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::InsufficientStock { .. } | AppError::InsufficientCommitted { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::InvalidQuantity(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::Database(e) => {
                // Log the detail, never leak it to the client
                error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
