//! Key usage, key size and subject policy checks.
//!
//! Every function here is pure. Callers decide what a failed check means
//! for the request (usually a transition to `Rejected`).

use crate::error::{CoreError, Result};
use crate::types::{KeyType, KeyUsage, KeyUsageSet, NameAttr, SubjectKind, SubjectName, Template};

const END_ENTITY_RSA: KeyUsageSet = KeyUsageSet::empty()
    .with(KeyUsage::DigitalSignature)
    .with(KeyUsage::NonRepudiation)
    .with(KeyUsage::KeyEncipherment)
    .with(KeyUsage::DataEncipherment);

const END_ENTITY_DSA: KeyUsageSet = KeyUsageSet::empty()
    .with(KeyUsage::DigitalSignature)
    .with(KeyUsage::NonRepudiation);

const END_ENTITY_EC: KeyUsageSet = KeyUsageSet::empty()
    .with(KeyUsage::DigitalSignature)
    .with(KeyUsage::NonRepudiation)
    .with(KeyUsage::KeyAgreement)
    .with(KeyUsage::EncipherOnly)
    .with(KeyUsage::DecipherOnly);

const CA_EXTRA: KeyUsageSet = KeyUsageSet::empty()
    .with(KeyUsage::KeyCertSign)
    .with(KeyUsage::CrlSign);

/// Usages a key of this type may carry in the given role
#[must_use]
pub const fn allowed_usages(key_type: KeyType, is_ca: bool) -> KeyUsageSet {
    let base = match key_type {
        KeyType::Rsa => END_ENTITY_RSA,
        KeyType::Dsa => END_ENTITY_DSA,
        KeyType::Ec => END_ENTITY_EC,
    };
    if is_ca {
        base.union(CA_EXTRA)
    } else {
        base
    }
}

/// True iff every requested usage is allowed for the key type and role
#[must_use]
pub const fn validate_key_usage(key_type: KeyType, requested: KeyUsageSet, is_ca: bool) -> bool {
    requested.is_subset(allowed_usages(key_type, is_ca))
}

/// Key types able to satisfy the template's key usage and role
#[must_use]
pub fn allowed_key_types_for(template: &Template) -> Vec<KeyType> {
    let is_ca = template.basic_constraints.ca;
    KeyType::ALL
        .into_iter()
        .filter(|k| validate_key_usage(*k, template.key_usage, is_ca))
        .collect()
}

#[must_use]
pub const fn minimum_bits_for(template: &Template, key_type: KeyType) -> u32 {
    template.min_bits_for(key_type)
}

/// Reject keys below the template minimum for their type
pub fn check_key_size(template: &Template, key_type: KeyType, bits: u32) -> Result<()> {
    let required = minimum_bits_for(template, key_type);
    if bits < required {
        return Err(CoreError::Policy(format!(
            "key size below the required minimum: size={bits} required={required}"
        )));
    }
    Ok(())
}

/// Check that a submitted key fits the template's usage policy
pub fn check_key_type(template: &Template, key_type: KeyType) -> Result<()> {
    if validate_key_usage(key_type, template.key_usage, template.basic_constraints.ca) {
        Ok(())
    } else {
        Err(CoreError::Policy(format!(
            "{key_type} keys cannot be used for {}",
            template.key_usage
        )))
    }
}

/// Internal consistency of a template's policy fields
pub fn check_template(template: &Template) -> Result<()> {
    if template.days == 0 {
        return Err(CoreError::Policy(String::from("validity must be at least one day")));
    }
    if template.key_usage.is_empty() {
        return Err(CoreError::Policy(String::from("template must allow a key usage")));
    }
    if !template.basic_constraints.ca
        && (template.key_usage.contains(KeyUsage::KeyCertSign)
            || template.key_usage.contains(KeyUsage::CrlSign))
    {
        return Err(CoreError::Policy(String::from(
            "keyCertSign and cRLSign require a CA template",
        )));
    }
    if !template.basic_constraints.ca && template.basic_constraints.path_len.is_some() {
        return Err(CoreError::Policy(String::from(
            "pathlen is only meaningful for CA templates",
        )));
    }
    if allowed_key_types_for(template).is_empty() {
        return Err(CoreError::Policy(format!(
            "no key type supports {}",
            template.key_usage
        )));
    }
    Ok(())
}

/// Check a subject against the shape the template requires
pub fn check_subject(kind: SubjectKind, subject: &SubjectName) -> Result<()> {
    let required: &[NameAttr] = match kind {
        SubjectKind::Cn | SubjectKind::DnPartial => &[NameAttr::CommonName],
        SubjectKind::User => &[NameAttr::CommonName, NameAttr::Email],
        SubjectKind::Dn => &[
            NameAttr::Country,
            NameAttr::State,
            NameAttr::Locality,
            NameAttr::Organization,
            NameAttr::OrganizationalUnit,
            NameAttr::CommonName,
        ],
    };
    let missing: Vec<&str> = required
        .iter()
        .filter(|a| subject.get(**a).is_none())
        .map(|a| a.short_name())
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::Policy(format!(
            "subject is missing {}",
            missing.join(", ")
        )));
    }
    if kind == SubjectKind::Cn && subject.iter().any(|(a, _)| a != NameAttr::CommonName) {
        return Err(CoreError::Policy(String::from(
            "subject may only contain a common name",
        )));
    }
    Ok(())
}
