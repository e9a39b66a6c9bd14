#![forbid(unsafe_code)]

use crate::common::{validate_nonzero, validate_text};
use crate::tenant::TenantId;
use crate::{ContractViolation, MonotonicTimeNs, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId(u64);

impl ContactId {
    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Validate for ContactId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_nonzero("contact_id", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactInput {
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl ContactInput {
    pub fn v1(
        tenant_id: TenantId,
        first_name: String,
        last_name: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            tenant_id,
            first_name,
            last_name,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for ContactInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.tenant_id.validate()?;
        validate_text("contact_input.first_name", &self.first_name, 128)?;
        if let Some(last_name) = &self.last_name {
            validate_text("contact_input.last_name", last_name, 128)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub contact_id: ContactId,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub created_at: MonotonicTimeNs,
}

impl ContactRecord {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}
