// Core provider functionality:
// - API client for the conversational chat model
// - Request/response data structures
// - Text-generation backends for crew personas
// - Configuration loading
// - Shared error types

// Export client module - chat model API client
pub mod client;
pub use client::*;

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

// Export providers module - text-generation backends
pub mod providers;
pub use providers::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
