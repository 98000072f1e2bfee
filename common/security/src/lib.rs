pub mod context;
pub mod error;
pub mod roles;
pub mod test_macros;

pub use context::{ClaimsTenantCtxExtractor, TenantContext};
pub use error::SecurityError;
pub use roles::{ensure_admin, ensure_role, ensure_write, Role};
