#![forbid(unsafe_code)]

use crm_kernel_contracts::audit::{AuditAction, AuditRowInput};
use crm_kernel_contracts::contact::ContactId;
use crm_kernel_contracts::contactfield::{
    ContactFieldRequest, ContactFieldResponse, ContactFieldRuntimeRequest, FieldValue,
};
use crm_kernel_contracts::{ReasonCodeId, Validate};
use crm_storage::audit::AuditWriter;
use crm_storage::store::{CrmStore, StorageError};
use tracing::{debug, info};

pub mod reason_codes {
    use crm_kernel_contracts::ReasonCodeId;

    // Contact field reason-code namespace ("CF").
    pub const CONTACTFIELD_OK_CREATE_VALUE: ReasonCodeId = ReasonCodeId(0x4346_0001);
    pub const CONTACTFIELD_OK_UPDATE_VALUE: ReasonCodeId = ReasonCodeId(0x4346_0002);
    pub const CONTACTFIELD_OK_DELETE_VALUE: ReasonCodeId = ReasonCodeId(0x4346_0003);
    pub const CONTACTFIELD_OK_CREATE_TYPE: ReasonCodeId = ReasonCodeId(0x4346_0004);
    pub const CONTACTFIELD_OK_DELETE_TYPE: ReasonCodeId = ReasonCodeId(0x4346_0005);
}

/// Field access orchestration: validate, resolve under the caller's tenant,
/// mutate, audit.
#[derive(Debug, Default, Clone)]
pub struct ContactFieldRuntime;

impl ContactFieldRuntime {
    pub fn run(
        &self,
        store: &mut CrmStore,
        req: &ContactFieldRuntimeRequest,
    ) -> Result<ContactFieldResponse, StorageError> {
        req.validate()?;
        debug!(
            request = req.request.name(),
            mutation = req.request.is_mutation(),
            tenant_id = req.tenant_id.as_str(),
            "contact field request"
        );

        let tenant_id = &req.tenant_id;
        match &req.request {
            ContactFieldRequest::ListValues { contact_id } => {
                let rows = store.scope(tenant_id).list_values(*contact_id)?;
                Ok(ContactFieldResponse::Values(
                    rows.into_iter().cloned().collect(),
                ))
            }
            ContactFieldRequest::ListTypes => Ok(ContactFieldResponse::Types(
                store
                    .scope(tenant_id)
                    .list_types()
                    .into_iter()
                    .cloned()
                    .collect(),
            )),
            ContactFieldRequest::GetValue {
                contact_id,
                field_value_id,
            } => {
                let row = store.scope(tenant_id).get_value(*field_value_id)?;
                ensure_owned_by_contact(row, *contact_id)?;
                Ok(ContactFieldResponse::Value(row.clone()))
            }
            ContactFieldRequest::CreateValue(r) => {
                let row = store.scope_mut(tenant_id).create_value(
                    req.now,
                    r.contact_id,
                    r.field_type_id,
                    r.data.clone(),
                )?;
                self.audit(
                    store,
                    req,
                    AuditAction::FieldValueCreate,
                    format!("contact_fields:{}", row.field_value_id.get()),
                    reason_codes::CONTACTFIELD_OK_CREATE_VALUE,
                )?;
                info!(
                    tenant_id = tenant_id.as_str(),
                    contact_id = row.contact_id.get(),
                    field_value_id = row.field_value_id.get(),
                    "contact field created"
                );
                Ok(ContactFieldResponse::ValueCreated(row))
            }
            ContactFieldRequest::UpdateValue(r) => {
                let existing = store.scope(tenant_id).get_value(r.field_value_id)?;
                ensure_owned_by_contact(existing, r.contact_id)?;

                let row = store.scope_mut(tenant_id).update_value(
                    req.now,
                    r.field_value_id,
                    r.field_type_id,
                    r.data.clone(),
                )?;
                self.audit(
                    store,
                    req,
                    AuditAction::FieldValueUpdate,
                    format!("contact_fields:{}", row.field_value_id.get()),
                    reason_codes::CONTACTFIELD_OK_UPDATE_VALUE,
                )?;
                info!(
                    tenant_id = tenant_id.as_str(),
                    field_value_id = row.field_value_id.get(),
                    "contact field updated"
                );
                Ok(ContactFieldResponse::ValueUpdated(row))
            }
            ContactFieldRequest::DeleteValue {
                contact_id,
                field_value_id,
            } => {
                let existing = store.scope(tenant_id).get_value(*field_value_id)?;
                ensure_owned_by_contact(existing, *contact_id)?;

                let row = store.scope_mut(tenant_id).delete_value(*field_value_id)?;
                self.audit(
                    store,
                    req,
                    AuditAction::FieldValueDelete,
                    format!("contact_fields:{}", row.field_value_id.get()),
                    reason_codes::CONTACTFIELD_OK_DELETE_VALUE,
                )?;
                info!(
                    tenant_id = tenant_id.as_str(),
                    field_value_id = row.field_value_id.get(),
                    "contact field deleted"
                );
                Ok(ContactFieldResponse::ValueDeleted(row.field_value_id))
            }
            ContactFieldRequest::CreateType(r) => {
                let row = store.scope_mut(tenant_id).create_type(req.now, r.clone())?;
                self.audit(
                    store,
                    req,
                    AuditAction::FieldTypeCreate,
                    format!("contact_field_types:{}", row.field_type_id.get()),
                    reason_codes::CONTACTFIELD_OK_CREATE_TYPE,
                )?;
                info!(
                    tenant_id = tenant_id.as_str(),
                    field_type_id = row.field_type_id.get(),
                    kind = row.kind.as_str(),
                    "contact field type created"
                );
                Ok(ContactFieldResponse::TypeCreated(row))
            }
            ContactFieldRequest::DeleteType { field_type_id } => {
                let row = store.scope_mut(tenant_id).delete_type(*field_type_id)?;
                self.audit(
                    store,
                    req,
                    AuditAction::FieldTypeDelete,
                    format!("contact_field_types:{}", row.field_type_id.get()),
                    reason_codes::CONTACTFIELD_OK_DELETE_TYPE,
                )?;
                info!(
                    tenant_id = tenant_id.as_str(),
                    field_type_id = row.field_type_id.get(),
                    "contact field type deleted"
                );
                Ok(ContactFieldResponse::TypeDeleted(row.field_type_id))
            }
        }
    }

    fn audit(
        &self,
        store: &mut CrmStore,
        req: &ContactFieldRuntimeRequest,
        action: AuditAction,
        target: String,
        reason_code: ReasonCodeId,
    ) -> Result<(), StorageError> {
        let input = AuditRowInput::v1(
            req.now,
            req.tenant_id.clone(),
            req.actor_user_id.clone(),
            action,
            target,
            reason_code,
        )?;
        let audit_row_id = AuditWriter::emit(store, input)?;
        debug!(
            action = action.as_str(),
            audit_row_id = audit_row_id.0,
            "audit row appended"
        );
        Ok(())
    }
}

// A value reached through another contact's URL is reported as missing.
fn ensure_owned_by_contact(
    row: &FieldValue,
    contact_id: Option<ContactId>,
) -> Result<(), StorageError> {
    match contact_id {
        Some(contact_id) if contact_id != row.contact_id => Err(StorageError::NotFound {
            table: "contact_fields",
            key: row.field_value_id.get().to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_kernel_contracts::contact::ContactInput;
    use crm_kernel_contracts::contactfield::{
        FieldKind, FieldTypeCreateRequest, FieldTypeId, FieldValueCreateRequest, FieldValueId,
        FieldValueUpdateRequest,
    };
    use crm_kernel_contracts::tenant::{TenantId, UserId};
    use crm_kernel_contracts::MonotonicTimeNs;

    struct Fixture {
        store: CrmStore,
        tenant: TenantId,
        contact: ContactId,
        field_type: FieldTypeId,
        now: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = CrmStore::new_in_memory();
            let tenant = TenantId::new("tenant_a").unwrap();
            let contact = store
                .insert_contact(
                    MonotonicTimeNs(1),
                    ContactInput::v1(tenant.clone(), "Ada".to_string(), None).unwrap(),
                )
                .unwrap()
                .contact_id;
            let mut f = Self {
                store,
                tenant,
                contact,
                field_type: FieldTypeId::MIN,
                now: 1,
            };
            let out = f
                .run_as("tenant_a", ContactFieldRequest::CreateType(FieldTypeCreateRequest {
                    name: "Test Name".to_string(),
                    kind: FieldKind::parse("test").unwrap(),
                    protocol: None,
                }))
                .unwrap();
            match out {
                ContactFieldResponse::TypeCreated(t) => f.field_type = t.field_type_id,
                other => panic!("unexpected response: {other:?}"),
            }
            f
        }

        fn run_as(
            &mut self,
            tenant: &str,
            request: ContactFieldRequest,
        ) -> Result<ContactFieldResponse, StorageError> {
            self.now += 1;
            let req = ContactFieldRuntimeRequest::v1(
                MonotonicTimeNs(self.now),
                UserId::new("user_1").unwrap(),
                TenantId::new(tenant).unwrap(),
                request,
            )?;
            ContactFieldRuntime.run(&mut self.store, &req)
        }

        fn run(&mut self, request: ContactFieldRequest) -> Result<ContactFieldResponse, StorageError> {
            self.run_as("tenant_a", request)
        }

        fn create_value(&mut self, data: &str) -> FieldValue {
            let request = ContactFieldRequest::CreateValue(FieldValueCreateRequest {
                contact_id: self.contact,
                field_type_id: self.field_type,
                data: data.to_string(),
            });
            match self.run(request).unwrap() {
                ContactFieldResponse::ValueCreated(v) => v,
                other => panic!("unexpected response: {other:?}"),
            }
        }

        fn list_values(&mut self) -> Vec<FieldValue> {
            let request = ContactFieldRequest::ListValues {
                contact_id: self.contact,
            };
            match self.run(request).unwrap() {
                ContactFieldResponse::Values(v) => v,
                other => panic!("unexpected response: {other:?}"),
            }
        }
    }

    #[test]
    fn at_contactfield_runtime_01_create_then_list_round_trip() {
        let mut f = Fixture::new();
        let created = f.create_value("test_data");
        assert_eq!(created.data, "test_data");

        let values = f.list_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].data, "test_data");
        assert_eq!(values[0].tenant_id, f.tenant);
    }

    #[test]
    fn at_contactfield_runtime_02_create_reports_201() {
        let mut f = Fixture::new();
        let out = f
            .run(ContactFieldRequest::CreateValue(FieldValueCreateRequest {
                contact_id: f.contact,
                field_type_id: f.field_type,
                data: "test_data".to_string(),
            }))
            .unwrap();
        assert_eq!(out.status_code(), 201);
        let out = f
            .run(ContactFieldRequest::ListValues {
                contact_id: f.contact,
            })
            .unwrap();
        assert_eq!(out.status_code(), 200);
    }

    #[test]
    fn at_contactfield_runtime_03_other_tenant_sees_not_found() {
        let mut f = Fixture::new();
        let v = f.create_value("test_data");

        let list = f.run_as(
            "tenant_b",
            ContactFieldRequest::ListValues {
                contact_id: f.contact,
            },
        );
        assert!(matches!(list, Err(StorageError::NotFound { .. })));

        let delete = f.run_as(
            "tenant_b",
            ContactFieldRequest::DeleteValue {
                contact_id: None,
                field_value_id: v.field_value_id,
            },
        );
        assert!(matches!(delete, Err(StorageError::NotFound { .. })));
        assert_eq!(f.list_values().len(), 1);
    }

    #[test]
    fn at_contactfield_runtime_04_update_through_wrong_contact_is_not_found() {
        let mut f = Fixture::new();
        let v = f.create_value("test_data");
        let other_contact = f
            .store
            .insert_contact(
                MonotonicTimeNs(50),
                ContactInput::v1(f.tenant.clone(), "Bob".to_string(), None).unwrap(),
            )
            .unwrap()
            .contact_id;

        let out = f.run(ContactFieldRequest::UpdateValue(FieldValueUpdateRequest {
            contact_id: Some(other_contact),
            field_value_id: v.field_value_id,
            field_type_id: f.field_type,
            data: "changed".to_string(),
        }));
        assert!(matches!(out, Err(StorageError::NotFound { .. })));
        assert_eq!(f.list_values()[0].data, "test_data");
    }

    #[test]
    fn at_contactfield_runtime_05_update_and_delete_report_200() {
        let mut f = Fixture::new();
        let v = f.create_value("test_data");

        let updated = f
            .run(ContactFieldRequest::UpdateValue(FieldValueUpdateRequest {
                contact_id: Some(f.contact),
                field_value_id: v.field_value_id,
                field_type_id: f.field_type,
                data: "test_data".to_string(),
            }))
            .unwrap();
        assert_eq!(updated.status_code(), 200);
        assert_eq!(f.list_values()[0].data, "test_data");

        let deleted = f
            .run(ContactFieldRequest::DeleteValue {
                contact_id: Some(f.contact),
                field_value_id: v.field_value_id,
            })
            .unwrap();
        assert_eq!(deleted.status_code(), 200);
        assert!(f.list_values().is_empty());
        assert!(matches!(
            f.run(ContactFieldRequest::GetValue {
                contact_id: None,
                field_value_id: v.field_value_id,
            }),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn at_contactfield_runtime_06_mutations_are_audited() {
        let mut f = Fixture::new();
        let v = f.create_value("test_data");
        f.run(ContactFieldRequest::DeleteValue {
            contact_id: None,
            field_value_id: v.field_value_id,
        })
        .unwrap();
        f.run(ContactFieldRequest::ListTypes).unwrap();

        let actions: Vec<_> = f
            .store
            .audit_events_by_tenant(&f.tenant)
            .iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::FieldTypeCreate,
                AuditAction::FieldValueCreate,
                AuditAction::FieldValueDelete,
            ]
        );
        assert_eq!(
            actions.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
            vec!["FIELD_TYPE_CREATE", "FIELD_VALUE_CREATE", "FIELD_VALUE_DELETE"]
        );
    }

    #[test]
    fn at_contactfield_runtime_07_failed_mutation_leaves_no_audit_row() {
        let mut f = Fixture::new();
        let out = f.run(ContactFieldRequest::DeleteValue {
            contact_id: None,
            field_value_id: FieldValueId::new(77).unwrap(),
        });
        assert!(out.is_err());
        assert_eq!(f.store.audit_events_by_tenant(&f.tenant).len(), 1);
    }
}
