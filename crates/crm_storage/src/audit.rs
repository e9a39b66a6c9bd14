#![forbid(unsafe_code)]

use crm_kernel_contracts::audit::{AuditRowId, AuditRowInput};

use crate::store::{CrmStore, StorageError};

/// Append-only writer into the store's `audit_rows` ledger.
#[derive(Debug, Default)]
pub struct AuditWriter;

impl AuditWriter {
    pub fn emit(store: &mut CrmStore, input: AuditRowInput) -> Result<AuditRowId, StorageError> {
        store.append_audit_event(input)
    }
}
