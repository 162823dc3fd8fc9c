use service_core::error::{AppError, CorrelatedError};
use service_core::middleware::tracing::CorrelationId;

/// Known path, unsupported method.
pub async fn method_not_allowed(correlation_id: CorrelationId) -> CorrelatedError {
    AppError::MethodNotAllowed.correlate(&correlation_id)
}

pub async fn not_found(correlation_id: CorrelationId) -> CorrelatedError {
    AppError::NotFound.correlate(&correlation_id)
}
