//! Platform API Layer
//!
//! Request/response access to the marketplace backend: starting generation
//! jobs, fetching their status, and the HTTP fallback path for chat. The
//! traits in [`traits`] are the seams; [`http::HttpApi`] is the production
//! implementation over `reqwest`.

pub mod http;
pub mod traits;

pub use http::HttpApi;
pub use traits::{ApiError, AssistantRequest, ChatApi, GenerationRequest, JobApi};
