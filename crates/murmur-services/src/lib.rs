//! # murmur-services
//!
//! HTTP clients for the sidecar services the pipeline leans on: the
//! tweet harvester and the optional ML endpoints (zero-shot
//! classification, cross-encoder reranking, article fetching and
//! summarization).
//!
//! Optional services degrade gracefully: when an endpoint is not
//! configured, its method returns an identity or empty result instead
//! of failing, so the pipeline runs unchanged without the ML stack. A
//! configured endpoint that fails is a hard error.

pub mod caller;

pub use caller::{HttpServiceCaller, ServiceCaller, ServiceCallerConfig};

pub use murmur_core::*;
