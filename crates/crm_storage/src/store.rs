#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crm_kernel_contracts::audit::{AuditRow, AuditRowId, AuditRowInput};
use crm_kernel_contracts::contact::{ContactId, ContactInput, ContactRecord};
use crm_kernel_contracts::contactfield::{
    FieldTypeDefinition, FieldTypeId, FieldValue, FieldValueId,
};
use crm_kernel_contracts::tenant::{SessionToken, TenantId, UserId};
use crm_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};

use crate::scope::{TenantScope, TenantScopeMut};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table} does not resolve: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table} row {key} is still referenced")]
    InUse { table: &'static str, key: String },
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: SessionToken,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub opened_at: MonotonicTimeNs,
}

impl SessionRecord {
    pub fn v1(
        token: SessionToken,
        tenant_id: TenantId,
        user_id: UserId,
        opened_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let row = Self {
            token,
            tenant_id,
            user_id,
            opened_at,
        };
        row.validate()?;
        Ok(row)
    }
}

impl Validate for SessionRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.token.validate()?;
        self.tenant_id.validate()?;
        self.user_id.validate()
    }
}

/// In-memory CRM tables.
///
/// Every tenant-owned table is keyed by `(TenantId, id)`, so a lookup made
/// under the wrong tenant misses exactly like a lookup for an absent row.
/// Reads and writes of those tables go through [`TenantScope`] and
/// [`TenantScopeMut`]; see [`CrmStore::scope`].
#[derive(Debug, Clone, Default)]
pub struct CrmStore {
    pub(crate) sessions: BTreeMap<SessionToken, SessionRecord>,
    pub(crate) contacts: BTreeMap<(TenantId, ContactId), ContactRecord>,
    pub(crate) field_types: BTreeMap<(TenantId, FieldTypeId), FieldTypeDefinition>,
    // (tenant_id, lowercase trimmed name) -> field_type_id
    pub(crate) field_type_name_index: BTreeMap<(TenantId, String), FieldTypeId>,
    pub(crate) field_values: BTreeMap<(TenantId, FieldValueId), FieldValue>,
    pub(crate) audit_rows: Vec<AuditRow>,
    next_contact_id: u64,
    next_field_type_id: u64,
    next_field_value_id: u64,
    next_audit_row_id: u64,
}

impl CrmStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    /// Read-only handle bound to one tenant.
    pub fn scope(&self, tenant_id: &TenantId) -> TenantScope<'_> {
        TenantScope::new(self, tenant_id.clone())
    }

    /// Read-write handle bound to one tenant.
    pub fn scope_mut(&mut self, tenant_id: &TenantId) -> TenantScopeMut<'_> {
        TenantScopeMut::new(self, tenant_id.clone())
    }

    pub fn insert_session_record(&mut self, record: SessionRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.sessions.contains_key(&record.token) {
            return Err(StorageError::DuplicateKey {
                table: "sessions.token",
                key: "<redacted>".to_string(),
            });
        }
        self.sessions.insert(record.token.clone(), record);
        Ok(())
    }

    pub fn session_record(&self, token: &SessionToken) -> Option<&SessionRecord> {
        self.sessions.get(token)
    }

    pub fn insert_contact(
        &mut self,
        now: MonotonicTimeNs,
        input: ContactInput,
    ) -> Result<ContactRecord, StorageError> {
        input.validate()?;
        let contact_id = ContactId::new(self.allocate_contact_id())?;
        let record = ContactRecord {
            contact_id,
            tenant_id: input.tenant_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input
                .last_name
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            created_at: now,
        };
        self.contacts
            .insert((record.tenant_id.clone(), contact_id), record.clone());
        Ok(record)
    }

    pub fn append_audit_event(&mut self, input: AuditRowInput) -> Result<AuditRowId, StorageError> {
        input.validate()?;
        self.next_audit_row_id += 1;
        let audit_row_id = AuditRowId(self.next_audit_row_id);
        self.audit_rows.push(AuditRow {
            audit_row_id,
            at: input.at,
            tenant_id: input.tenant_id,
            actor_user_id: input.actor_user_id,
            action: input.action,
            target: input.target,
            reason_code: input.reason_code,
        });
        Ok(audit_row_id)
    }

    pub fn audit_events_by_tenant(&self, tenant_id: &TenantId) -> Vec<&AuditRow> {
        self.audit_rows
            .iter()
            .filter(|row| &row.tenant_id == tenant_id)
            .collect()
    }

    pub(crate) fn allocate_contact_id(&mut self) -> u64 {
        self.next_contact_id += 1;
        self.next_contact_id
    }

    pub(crate) fn allocate_field_type_id(&mut self) -> u64 {
        self.next_field_type_id += 1;
        self.next_field_type_id
    }

    pub(crate) fn allocate_field_value_id(&mut self) -> u64 {
        self.next_field_value_id += 1;
        self.next_field_value_id
    }
}

pub(crate) fn field_type_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
