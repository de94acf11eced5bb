//! Conversions between [`SubjectName`] and X.509 `Name` encodings.

use rcgen::{DistinguishedName, DnType, DnValue};
use tracing::debug;
use webca_core::{NameAttr, SubjectName};
use x509_parser::x509::X509Name;

use crate::der;
use crate::error::{CryptoError, Result};

fn is_printable(s: &str) -> bool {
    s.chars().all(|c| {
        c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c)
    })
}

fn check_value(attr: NameAttr, value: &str) -> Result<()> {
    let ok = match attr {
        NameAttr::Country => value.len() == 2 && is_printable(value),
        NameAttr::Email => value.is_ascii(),
        _ => !value.is_empty(),
    };
    if ok {
        Ok(())
    } else {
        Err(CryptoError::Certificate(format!(
            "invalid {} value {value:?}",
            attr.short_name()
        )))
    }
}

/// DER `Name`: country as PrintableString, email as IA5String, the rest UTF8String
pub fn encode_name(name: &SubjectName) -> Result<Vec<u8>> {
    for (attr, value) in name.iter() {
        check_value(attr, value)?;
    }
    Ok(yasna::construct_der(|w| {
        w.write_sequence_of(|w| {
            for (attr, value) in name.iter() {
                w.next().write_set(|w| {
                    w.next().write_sequence(|w| {
                        w.next().write_oid(&der::oid(attr.oid()));
                        match attr {
                            NameAttr::Country => w.next().write_printable_string(value),
                            NameAttr::Email => w.next().write_ia5_string(value),
                            _ => w.next().write_utf8_string(value),
                        }
                    });
                });
            }
        });
    }))
}

/// rcgen form of the name, with the same string types as [`encode_name`]
pub(crate) fn to_distinguished_name(name: &SubjectName) -> Result<DistinguishedName> {
    let mut dn = DistinguishedName::new();
    for (attr, value) in name.iter() {
        check_value(attr, value)?;
        let invalid = |e: rcgen::Error| CryptoError::Certificate(e.to_string());
        match attr {
            NameAttr::Country => dn.push(
                DnType::CountryName,
                DnValue::PrintableString(
                    rcgen::string::PrintableString::try_from(value.to_string()).map_err(invalid)?,
                ),
            ),
            NameAttr::Email => dn.push(
                DnType::CustomDnType(attr.oid().to_vec()),
                DnValue::Ia5String(
                    rcgen::string::Ia5String::try_from(value.to_string()).map_err(invalid)?,
                ),
            ),
            NameAttr::State => dn.push(DnType::StateOrProvinceName, value),
            NameAttr::Locality => dn.push(DnType::LocalityName, value),
            NameAttr::Organization => dn.push(DnType::OrganizationName, value),
            NameAttr::OrganizationalUnit => dn.push(DnType::OrganizationalUnitName, value),
            NameAttr::CommonName => dn.push(DnType::CommonName, value),
        }
    }
    Ok(dn)
}

/// Read the attributes we understand from a parsed name; others are skipped
pub fn from_x509_name(name: &X509Name<'_>) -> Result<SubjectName> {
    let mut subject = SubjectName::new();
    for atv in name.iter_attributes() {
        let oid = der::parse_oid(&atv.attr_type().to_id_string())?;
        let Some(attr) = NameAttr::from_oid(&oid) else {
            debug!(oid = %der::oid_string(&oid), "skipping unknown name attribute");
            continue;
        };
        let value = atv
            .as_str()
            .map_err(|e| CryptoError::Certificate(format!("unreadable name attribute: {e}")))?;
        subject.push(attr, value);
    }
    Ok(subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x509_parser::prelude::FromDer;

    #[test]
    fn test_encode_and_read_back() {
        let name: SubjectName = "/C=ES/ST=Madrid/O=Example/OU=IT/CN=Ana Núñez/emailAddress=ana@example.org"
            .parse()
            .unwrap();
        let der = encode_name(&name).unwrap();
        let (_, parsed) = X509Name::from_der(&der).unwrap();
        assert_eq!(from_x509_name(&parsed).unwrap(), name);
    }

    #[test]
    fn test_rejects_bad_country() {
        let name: SubjectName = "/C=Spain/CN=x".parse().unwrap();
        assert!(encode_name(&name).is_err());
        assert!(to_distinguished_name(&name).is_err());
    }
}
