//! Token issuance, validation, and tamper-evident audit logging
//!
//! Every MCP request is validated here. Tokens are opaque `egm_`
//! strings with 256 bits of entropy; every validation outcome, good or
//! bad, lands in the append-only audit log before the caller sees the
//! result.

pub mod cache;
pub mod memory_tokens;
pub mod postgres;
pub mod token;
pub mod tokens;

pub use cache::CachedValidator;
pub use memory_tokens::InMemoryTokenStore;
pub use postgres::PostgresTokenStore;
pub use token::generate_token;
pub use tokens::{NewToken, TokenStore};
