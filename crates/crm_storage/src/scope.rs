#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crm_kernel_contracts::contact::{ContactId, ContactRecord};
use crm_kernel_contracts::contactfield::{
    validate_data, FieldTypeCreateRequest, FieldTypeDefinition, FieldTypeId, FieldValue,
    FieldValueId,
};
use crm_kernel_contracts::tenant::TenantId;
use crm_kernel_contracts::{MonotonicTimeNs, Validate};

use crate::store::{field_type_name_key, CrmStore, StorageError};

/// Read access to one tenant's rows. Rows of other tenants are invisible.
#[derive(Debug, Clone)]
pub struct TenantScope<'a> {
    store: &'a CrmStore,
    tenant_id: TenantId,
}

/// Write access to one tenant's rows.
#[derive(Debug)]
pub struct TenantScopeMut<'a> {
    store: &'a mut CrmStore,
    tenant_id: TenantId,
}

pub(crate) fn tenant_rows<'s, K, V>(
    table: &'s BTreeMap<(TenantId, K), V>,
    tenant_id: TenantId,
    first: K,
) -> impl Iterator<Item = &'s V> + 's
where
    K: Ord + Copy + 's,
    V: 's,
{
    table
        .range((tenant_id.clone(), first)..)
        .take_while(move |((t, _), _)| *t == tenant_id)
        .map(|(_, row)| row)
}

impl<'a> TenantScope<'a> {
    pub(crate) fn new(store: &'a CrmStore, tenant_id: TenantId) -> Self {
        Self { store, tenant_id }
    }

    pub fn contact(&self, contact_id: ContactId) -> Result<&'a ContactRecord, StorageError> {
        self.store
            .contacts
            .get(&(self.tenant_id.clone(), contact_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contacts",
                key: contact_id.get().to_string(),
            })
    }

    /// Field types of the tenant in creation order.
    pub fn list_types(&self) -> Vec<&'a FieldTypeDefinition> {
        tenant_rows(&self.store.field_types, self.tenant_id.clone(), FieldTypeId::MIN).collect()
    }

    pub fn get_type(
        &self,
        field_type_id: FieldTypeId,
    ) -> Result<&'a FieldTypeDefinition, StorageError> {
        self.store
            .field_types
            .get(&(self.tenant_id.clone(), field_type_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contact_field_types",
                key: field_type_id.get().to_string(),
            })
    }

    /// Values attached to one contact, in creation order.
    pub fn list_values(&self, contact_id: ContactId) -> Result<Vec<&'a FieldValue>, StorageError> {
        self.contact(contact_id)?;
        Ok(
            tenant_rows(&self.store.field_values, self.tenant_id.clone(), FieldValueId::MIN)
                .filter(|v| v.contact_id == contact_id)
                .collect(),
        )
    }

    pub fn get_value(&self, field_value_id: FieldValueId) -> Result<&'a FieldValue, StorageError> {
        self.store
            .field_values
            .get(&(self.tenant_id.clone(), field_value_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contact_fields",
                key: field_value_id.get().to_string(),
            })
    }

    pub fn values_referencing_type(&self, field_type_id: FieldTypeId) -> usize {
        tenant_rows(&self.store.field_values, self.tenant_id.clone(), FieldValueId::MIN)
            .filter(|v| v.field_type_id == field_type_id)
            .count()
    }

    // A field type that is missing or owned by another tenant is a bad
    // reference in the request, not a missing target.
    fn resolve_type_ref(&self, field_type_id: FieldTypeId) -> Result<(), StorageError> {
        self.get_type(field_type_id)
            .map(|_| ())
            .map_err(|_| StorageError::ForeignKeyViolation {
                table: "contact_fields.contact_field_type_id",
                key: field_type_id.get().to_string(),
            })
    }
}

impl<'a> TenantScopeMut<'a> {
    pub(crate) fn new(store: &'a mut CrmStore, tenant_id: TenantId) -> Self {
        Self { store, tenant_id }
    }

    pub fn read(&self) -> TenantScope<'_> {
        TenantScope::new(&*self.store, self.tenant_id.clone())
    }

    pub fn create_type(
        &mut self,
        now: MonotonicTimeNs,
        req: FieldTypeCreateRequest,
    ) -> Result<FieldTypeDefinition, StorageError> {
        req.validate()?;
        let name = req.name.trim().to_string();
        let name_key = (self.tenant_id.clone(), field_type_name_key(&name));
        if self.store.field_type_name_index.contains_key(&name_key) {
            return Err(StorageError::DuplicateKey {
                table: "contact_field_types(tenant_id,name)",
                key: format!("{}:{}", self.tenant_id.as_str(), name),
            });
        }

        let field_type_id = FieldTypeId::new(self.store.allocate_field_type_id())?;
        let row = FieldTypeDefinition {
            field_type_id,
            tenant_id: self.tenant_id.clone(),
            name,
            kind: req.kind,
            protocol: req.protocol,
            created_at: now,
        };
        self.store
            .field_types
            .insert((self.tenant_id.clone(), field_type_id), row.clone());
        self.store.field_type_name_index.insert(name_key, field_type_id);
        Ok(row)
    }

    /// Removes a field type. Refused while any value still references it.
    pub fn delete_type(
        &mut self,
        field_type_id: FieldTypeId,
    ) -> Result<FieldTypeDefinition, StorageError> {
        let read = self.read();
        read.get_type(field_type_id)?;
        if read.values_referencing_type(field_type_id) > 0 {
            return Err(StorageError::InUse {
                table: "contact_field_types",
                key: field_type_id.get().to_string(),
            });
        }

        let row = self
            .store
            .field_types
            .remove(&(self.tenant_id.clone(), field_type_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contact_field_types",
                key: field_type_id.get().to_string(),
            })?;
        self.store
            .field_type_name_index
            .remove(&(self.tenant_id.clone(), field_type_name_key(&row.name)));
        Ok(row)
    }

    pub fn create_value(
        &mut self,
        now: MonotonicTimeNs,
        contact_id: ContactId,
        field_type_id: FieldTypeId,
        data: String,
    ) -> Result<FieldValue, StorageError> {
        let read = self.read();
        let tenant_id = read.contact(contact_id)?.tenant_id.clone();
        read.resolve_type_ref(field_type_id)?;
        validate_data(&data)?;

        let field_value_id = FieldValueId::new(self.store.allocate_field_value_id())?;
        let row = FieldValue {
            field_value_id,
            tenant_id,
            contact_id,
            field_type_id,
            data,
            created_at: now,
            updated_at: now,
        };
        self.store
            .field_values
            .insert((self.tenant_id.clone(), field_value_id), row.clone());
        Ok(row)
    }

    /// Replaces the field type and data of an existing value. `data` is
    /// overwritten as a whole.
    pub fn update_value(
        &mut self,
        now: MonotonicTimeNs,
        field_value_id: FieldValueId,
        field_type_id: FieldTypeId,
        data: String,
    ) -> Result<FieldValue, StorageError> {
        let read = self.read();
        read.get_value(field_value_id)?;
        read.resolve_type_ref(field_type_id)?;
        validate_data(&data)?;

        let row = self
            .store
            .field_values
            .get_mut(&(self.tenant_id.clone(), field_value_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contact_fields",
                key: field_value_id.get().to_string(),
            })?;
        row.field_type_id = field_type_id;
        row.data = data;
        row.updated_at = now;
        Ok(row.clone())
    }

    /// Hard delete; the row is gone from every subsequent read.
    pub fn delete_value(&mut self, field_value_id: FieldValueId) -> Result<FieldValue, StorageError> {
        self.store
            .field_values
            .remove(&(self.tenant_id.clone(), field_value_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contact_fields",
                key: field_value_id.get().to_string(),
            })
    }
}
