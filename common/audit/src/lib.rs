pub mod model;
pub mod writer;

pub use model::{AuditActor, AuditError, AuditEvent, AuditResult};
pub use writer::write_audit_row;
