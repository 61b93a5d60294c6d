use uuid::Uuid;

/// Domain-level error taxonomy.
///
/// Handlers map these onto HTTP status codes: `NotFound` → 404,
/// `Validation` → 400, `Conflict` → 409, `Internal` → 500.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
