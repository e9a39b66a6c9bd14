#![forbid(unsafe_code)]

use crm_kernel_contracts::audit::{AuditRow, AuditRowId, AuditRowInput};
use crm_kernel_contracts::contact::{ContactId, ContactInput, ContactRecord};
use crm_kernel_contracts::contactfield::{
    FieldTypeCreateRequest, FieldTypeDefinition, FieldTypeId, FieldValue, FieldValueId,
};
use crm_kernel_contracts::tenant::{SessionToken, TenantId};
use crm_kernel_contracts::MonotonicTimeNs;

use crate::store::{CrmStore, SessionRecord, StorageError};

/// Typed repository interface for rows owned by the session and contact collaborators.
pub trait CrmFoundationRepo {
    fn insert_session_row(&mut self, record: SessionRecord) -> Result<(), StorageError>;
    fn session_row(&self, token: &SessionToken) -> Option<&SessionRecord>;
    fn insert_contact_row(
        &mut self,
        now: MonotonicTimeNs,
        input: ContactInput,
    ) -> Result<ContactRecord, StorageError>;
    fn contact_row(&self, tenant_id: &TenantId, contact_id: ContactId) -> Option<&ContactRecord>;
}

/// Typed repository interface for the per-tenant field type catalog.
pub trait ContactFieldTypeRepo {
    fn field_type_rows(&self, tenant_id: &TenantId) -> Vec<&FieldTypeDefinition>;
    fn field_type_row(
        &self,
        tenant_id: &TenantId,
        field_type_id: FieldTypeId,
    ) -> Option<&FieldTypeDefinition>;
    fn create_field_type_row(
        &mut self,
        now: MonotonicTimeNs,
        tenant_id: &TenantId,
        req: FieldTypeCreateRequest,
    ) -> Result<FieldTypeDefinition, StorageError>;
    fn delete_field_type_row(
        &mut self,
        tenant_id: &TenantId,
        field_type_id: FieldTypeId,
    ) -> Result<FieldTypeDefinition, StorageError>;
}

/// Typed repository interface for `contact_fields` rows.
pub trait ContactFieldValueRepo {
    fn field_value_rows_for_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: ContactId,
    ) -> Result<Vec<&FieldValue>, StorageError>;
    fn field_value_row(
        &self,
        tenant_id: &TenantId,
        field_value_id: FieldValueId,
    ) -> Option<&FieldValue>;
    fn create_field_value_row(
        &mut self,
        now: MonotonicTimeNs,
        tenant_id: &TenantId,
        contact_id: ContactId,
        field_type_id: FieldTypeId,
        data: String,
    ) -> Result<FieldValue, StorageError>;
    fn update_field_value_row(
        &mut self,
        now: MonotonicTimeNs,
        tenant_id: &TenantId,
        field_value_id: FieldValueId,
        field_type_id: FieldTypeId,
        data: String,
    ) -> Result<FieldValue, StorageError>;
    fn delete_field_value_row(
        &mut self,
        tenant_id: &TenantId,
        field_value_id: FieldValueId,
    ) -> Result<(), StorageError>;
}

/// Typed repository interface for the append-only audit ledger.
pub trait CrmAuditRepo {
    fn append_audit_row(&mut self, input: AuditRowInput) -> Result<AuditRowId, StorageError>;
    fn audit_rows_by_tenant(&self, tenant_id: &TenantId) -> Vec<&AuditRow>;
}

impl CrmFoundationRepo for CrmStore {
    fn insert_session_row(&mut self, record: SessionRecord) -> Result<(), StorageError> {
        self.insert_session_record(record)
    }

    fn session_row(&self, token: &SessionToken) -> Option<&SessionRecord> {
        self.session_record(token)
    }

    fn insert_contact_row(
        &mut self,
        now: MonotonicTimeNs,
        input: ContactInput,
    ) -> Result<ContactRecord, StorageError> {
        self.insert_contact(now, input)
    }

    fn contact_row(&self, tenant_id: &TenantId, contact_id: ContactId) -> Option<&ContactRecord> {
        self.scope(tenant_id).contact(contact_id).ok()
    }
}

impl ContactFieldTypeRepo for CrmStore {
    fn field_type_rows(&self, tenant_id: &TenantId) -> Vec<&FieldTypeDefinition> {
        self.scope(tenant_id).list_types()
    }

    fn field_type_row(
        &self,
        tenant_id: &TenantId,
        field_type_id: FieldTypeId,
    ) -> Option<&FieldTypeDefinition> {
        self.scope(tenant_id).get_type(field_type_id).ok()
    }

    fn create_field_type_row(
        &mut self,
        now: MonotonicTimeNs,
        tenant_id: &TenantId,
        req: FieldTypeCreateRequest,
    ) -> Result<FieldTypeDefinition, StorageError> {
        self.scope_mut(tenant_id).create_type(now, req)
    }

    fn delete_field_type_row(
        &mut self,
        tenant_id: &TenantId,
        field_type_id: FieldTypeId,
    ) -> Result<FieldTypeDefinition, StorageError> {
        self.scope_mut(tenant_id).delete_type(field_type_id)
    }
}

impl ContactFieldValueRepo for CrmStore {
    fn field_value_rows_for_contact(
        &self,
        tenant_id: &TenantId,
        contact_id: ContactId,
    ) -> Result<Vec<&FieldValue>, StorageError> {
        self.scope(tenant_id).list_values(contact_id)
    }

    fn field_value_row(
        &self,
        tenant_id: &TenantId,
        field_value_id: FieldValueId,
    ) -> Option<&FieldValue> {
        self.scope(tenant_id).get_value(field_value_id).ok()
    }

    fn create_field_value_row(
        &mut self,
        now: MonotonicTimeNs,
        tenant_id: &TenantId,
        contact_id: ContactId,
        field_type_id: FieldTypeId,
        data: String,
    ) -> Result<FieldValue, StorageError> {
        self.scope_mut(tenant_id)
            .create_value(now, contact_id, field_type_id, data)
    }

    fn update_field_value_row(
        &mut self,
        now: MonotonicTimeNs,
        tenant_id: &TenantId,
        field_value_id: FieldValueId,
        field_type_id: FieldTypeId,
        data: String,
    ) -> Result<FieldValue, StorageError> {
        self.scope_mut(tenant_id)
            .update_value(now, field_value_id, field_type_id, data)
    }

    fn delete_field_value_row(
        &mut self,
        tenant_id: &TenantId,
        field_value_id: FieldValueId,
    ) -> Result<(), StorageError> {
        self.scope_mut(tenant_id)
            .delete_value(field_value_id)
            .map(|_| ())
    }
}

impl CrmAuditRepo for CrmStore {
    fn append_audit_row(&mut self, input: AuditRowInput) -> Result<AuditRowId, StorageError> {
        self.append_audit_event(input)
    }

    fn audit_rows_by_tenant(&self, tenant_id: &TenantId) -> Vec<&AuditRow> {
        self.audit_events_by_tenant(tenant_id)
    }
}
