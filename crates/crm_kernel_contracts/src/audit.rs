#![forbid(unsafe_code)]

use crate::tenant::{TenantId, UserId};
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuditRowId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    ContactCreate,
    FieldTypeCreate,
    FieldTypeDelete,
    FieldValueCreate,
    FieldValueUpdate,
    FieldValueDelete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::ContactCreate => "CONTACT_CREATE",
            AuditAction::FieldTypeCreate => "FIELD_TYPE_CREATE",
            AuditAction::FieldTypeDelete => "FIELD_TYPE_DELETE",
            AuditAction::FieldValueCreate => "FIELD_VALUE_CREATE",
            AuditAction::FieldValueUpdate => "FIELD_VALUE_UPDATE",
            AuditAction::FieldValueDelete => "FIELD_VALUE_DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRowInput {
    pub at: MonotonicTimeNs,
    pub tenant_id: TenantId,
    pub actor_user_id: UserId,
    pub action: AuditAction,
    /// Table-qualified key of the touched row, e.g. `contact_fields:12`.
    pub target: String,
    pub reason_code: ReasonCodeId,
}

impl AuditRowInput {
    pub fn v1(
        at: MonotonicTimeNs,
        tenant_id: TenantId,
        actor_user_id: UserId,
        action: AuditAction,
        target: String,
        reason_code: ReasonCodeId,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            at,
            tenant_id,
            actor_user_id,
            action,
            target,
            reason_code,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for AuditRowInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.tenant_id.validate()?;
        self.actor_user_id.validate()?;
        if self.target.trim().is_empty() || self.target.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_row_input.target",
                reason: "must be non-empty and <= 128 chars",
            });
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "audit_row_input.reason_code",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub audit_row_id: AuditRowId,
    pub at: MonotonicTimeNs,
    pub tenant_id: TenantId,
    pub actor_user_id: UserId,
    pub action: AuditAction,
    pub target: String,
    pub reason_code: ReasonCodeId,
}
