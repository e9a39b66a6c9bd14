#![forbid(unsafe_code)]

use crm_kernel_contracts::audit::{AuditAction, AuditRowInput};
use crm_kernel_contracts::contact::ContactInput;
use crm_kernel_contracts::contactfield::{FieldKind, FieldTypeCreateRequest};
use crm_kernel_contracts::tenant::{TenantId, UserId};
use crm_kernel_contracts::{MonotonicTimeNs, ReasonCodeId};
use crm_storage::repo::{
    ContactFieldTypeRepo, ContactFieldValueRepo, CrmAuditRepo, CrmFoundationRepo,
};
use crm_storage::store::{CrmStore, StorageError};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn type_req(name: &str, kind: FieldKind, protocol: Option<&str>) -> FieldTypeCreateRequest {
    FieldTypeCreateRequest {
        name: name.to_string(),
        kind,
        protocol: protocol.map(str::to_string),
    }
}

#[test]
fn at_field_type_db_01_list_is_tenant_scoped_in_creation_order() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let tenant_b = tenant("tenant_b");

    s.create_field_type_row(
        MonotonicTimeNs(1),
        &tenant_a,
        type_req("Email", FieldKind::Email, Some("mailto:")),
    )
    .unwrap();
    s.create_field_type_row(
        MonotonicTimeNs(2),
        &tenant_b,
        type_req("Twitter", FieldKind::parse("twitter").unwrap(), None),
    )
    .unwrap();
    s.create_field_type_row(
        MonotonicTimeNs(3),
        &tenant_a,
        type_req("Phone", FieldKind::Phone, Some("tel:")),
    )
    .unwrap();

    let names_a: Vec<_> = s
        .field_type_rows(&tenant_a)
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names_a, vec!["Email", "Phone"]);
    let names_b: Vec<_> = s
        .field_type_rows(&tenant_b)
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names_b, vec!["Twitter"]);
}

#[test]
fn at_field_type_db_02_get_cross_tenant_is_absent() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let tenant_b = tenant("tenant_b");
    let ft = s
        .create_field_type_row(
            MonotonicTimeNs(1),
            &tenant_a,
            type_req("Test Name", FieldKind::parse("test").unwrap(), None),
        )
        .unwrap();

    assert!(s.field_type_row(&tenant_a, ft.field_type_id).is_some());
    assert!(s.field_type_row(&tenant_b, ft.field_type_id).is_none());
    assert!(matches!(
        s.delete_field_type_row(&tenant_b, ft.field_type_id),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_field_type_db_03_delete_blocked_while_referenced() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let contact = s
        .insert_contact_row(
            MonotonicTimeNs(1),
            ContactInput::v1(tenant_a.clone(), "Ada".to_string(), None).unwrap(),
        )
        .unwrap();
    let ft = s
        .create_field_type_row(
            MonotonicTimeNs(1),
            &tenant_a,
            type_req("Test Name", FieldKind::parse("test").unwrap(), None),
        )
        .unwrap();
    let v = s
        .create_field_value_row(
            MonotonicTimeNs(2),
            &tenant_a,
            contact.contact_id,
            ft.field_type_id,
            "test_data".to_string(),
        )
        .unwrap();

    assert!(matches!(
        s.delete_field_type_row(&tenant_a, ft.field_type_id),
        Err(StorageError::InUse { .. })
    ));

    s.delete_field_value_row(&tenant_a, v.field_value_id).unwrap();
    s.delete_field_type_row(&tenant_a, ft.field_type_id).unwrap();
    assert!(s.field_type_rows(&tenant_a).is_empty());

    // The name is free again once the type is gone.
    s.create_field_type_row(
        MonotonicTimeNs(3),
        &tenant_a,
        type_req("Test Name", FieldKind::Text, None),
    )
    .unwrap();
}

#[test]
fn at_field_type_db_04_audit_rows_are_tenant_scoped() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let tenant_b = tenant("tenant_b");
    let input = |t: &TenantId, at: u64| {
        AuditRowInput::v1(
            MonotonicTimeNs(at),
            t.clone(),
            UserId::new("user_1").unwrap(),
            AuditAction::FieldTypeCreate,
            "contact_field_types:1".to_string(),
            ReasonCodeId(0x4346_0005),
        )
        .unwrap()
    };
    s.append_audit_row(input(&tenant_a, 1)).unwrap();
    s.append_audit_row(input(&tenant_b, 2)).unwrap();
    s.append_audit_row(input(&tenant_a, 3)).unwrap();

    assert_eq!(s.audit_rows_by_tenant(&tenant_a).len(), 2);
    assert_eq!(s.audit_rows_by_tenant(&tenant_b).len(), 1);
}
