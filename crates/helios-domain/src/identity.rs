//! Validation for the two identity entities: operators ([`User`]) and the
//! customers they support.

use helios_schema::{Customer, User};

use crate::error::DomainError;
use crate::fields;

/// Validate a candidate operator record and return the normalized entity.
pub fn validate_user_create(candidate: &User) -> Result<User, DomainError> {
    let mut user = candidate.clone();
    user.id = fields::required("id", &candidate.id)?;
    user.email = fields::email("email", &candidate.email)?;
    user.name = fields::required("name", &candidate.name)?;
    user.tenant_id = fields::required("tenant_id", &candidate.tenant_id)?;

    if let Some(last_login) = user.last_login {
        if last_login < user.created_at {
            return Err(DomainError::validation(
                "last_login",
                "precedes created_at",
            ));
        }
    }
    if user.updated_at < user.created_at {
        return Err(DomainError::validation("updated_at", "precedes created_at"));
    }

    Ok(user)
}

/// Validate a candidate customer record and return the normalized entity.
pub fn validate_customer_create(candidate: &Customer) -> Result<Customer, DomainError> {
    let mut customer = candidate.clone();
    customer.id = fields::required("id", &candidate.id)?;
    customer.email = fields::email("email", &candidate.email)?;
    customer.name = fields::required("name", &candidate.name)?;
    customer.tenant_id = fields::required("tenant_id", &candidate.tenant_id)?;

    if let Some(phone) = &candidate.phone {
        let trimmed = phone.trim();
        if trimmed.is_empty() {
            customer.phone = None;
        } else {
            customer.phone = Some(trimmed.to_owned());
        }
    }

    if customer.updated_at < customer.created_at {
        return Err(DomainError::validation("updated_at", "precedes created_at"));
    }

    Ok(customer)
}
