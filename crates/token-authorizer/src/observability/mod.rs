//! Observability for the token authorizer.
//!
//! The crate emits `tracing` events and `metrics` measurements; installing a
//! subscriber and a recorder/exporter is left to the embedding service.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `authorizer_token_validations_total` | Counter | `status`, `error_type` | Validation outcomes |
//! | `authorizer_token_validation_duration_seconds` | Histogram | `status` | End-to-end validation latency |
//! | `authorizer_jwks_fetch_total` | Counter | `status` | Key set fetch outcomes |
//! | `authorizer_jwks_fetch_duration_seconds` | Histogram | none | Key set fetch latency |
//! | `authorizer_jwks_cache_total` | Counter | `result` | Cache hits, misses and refetches |
//!
//! Endpoint URLs and token contents never appear in labels.

pub mod metrics;
