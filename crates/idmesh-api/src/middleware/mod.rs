//! HTTP middleware.

mod correlation;

pub use correlation::{CorrelationIdLayer, CORRELATION_ID_HEADER};
