//! Policy-derived extension sets for issued certificates.

use tracing::debug;
use webca_core::{policy, ExtensionDescriptor, NameAttr, Request, SubjectKind, SubjectName, Template};

use crate::error::Result;
use crate::extensions::{build_cdp, Extension, ExtensionValue, GeneralName};

/// Deployment facts the template does not carry
#[derive(Debug, Clone, Default)]
pub struct AssemblyContext {
    /// URLs of every non-deleted CRL location
    pub crl_urls: Vec<String>,
    /// OCSP responder URL advertised in authorityInfoAccess
    pub ocsp_url: Option<String>,
}

/// Subject and extensions for the internal request
#[derive(Debug, Clone)]
pub struct AssembledRequest {
    pub subject: SubjectName,
    pub extensions: Vec<Extension>,
}

/// Derive the subject and extension list for `request` under `template`.
///
/// Order is fixed: basicConstraints, keyUsage, extendedKeyUsage,
/// subjectAltName, crlDistributionPoints, authorityInfoAccess, then any
/// template extras.
pub fn build_extensions(
    template: &Template,
    request: &Request,
    ctx: &AssemblyContext,
) -> Result<AssembledRequest> {
    let mut subject: SubjectName = request.subject.parse()?;
    policy::check_subject(template.required_subject, &subject)?;

    let bc = template.basic_constraints;
    let mut extensions = vec![
        Extension::new(
            ExtensionValue::BasicConstraints {
                ca: bc.ca,
                path_len: bc.path_len,
            },
            true,
        ),
        Extension::new(ExtensionValue::KeyUsage(template.key_usage), true),
    ];

    if !template.ext_key_usage.is_empty() {
        extensions.push(Extension::new(
            ExtensionValue::ExtendedKeyUsage(template.ext_key_usage.clone()),
            template.ext_key_usage_critical,
        ));
    }

    let mut names = Vec::new();
    for entry in request.san_entries() {
        let name = GeneralName::parse(&entry)?;
        if template.allows_san_prefix(name.prefix()) {
            names.push(name);
        } else {
            debug!(request_id = request.id, entry = %entry, "SAN type not allowed by template");
        }
    }
    if template.required_subject == SubjectKind::User {
        if let Some(email) = subject.take(NameAttr::Email) {
            let email = GeneralName::Email(email);
            if !names.contains(&email) {
                names.push(email);
            }
        }
    }
    if !names.is_empty() {
        extensions.push(Extension::new(ExtensionValue::SubjectAltName(names), false));
    }

    if !ctx.crl_urls.is_empty() {
        extensions.push(build_cdp(&ctx.crl_urls));
    }

    if let Some(url) = &ctx.ocsp_url {
        extensions.push(Extension::from_descriptor(&ExtensionDescriptor::new(
            "authorityInfoAccess",
            false,
            format!("OCSP;URI:{url}"),
        ))?);
    }

    for desc in &template.extensions {
        extensions.push(Extension::from_descriptor(desc)?);
    }

    Ok(AssembledRequest {
        subject,
        extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{OID_BASIC_CONSTRAINTS, OID_KEY_USAGE};
    use webca_core::{ExtKeyUsage, KeyUsage, KeyUsageSet};

    fn template() -> Template {
        let mut t = Template::new(1, "user", 365);
        t.required_subject = SubjectKind::User;
        t.key_usage = KeyUsageSet::of(&[KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment]);
        t.allowed_san = vec![String::from("DNS")];
        t
    }

    #[test]
    fn test_minimal_set_starts_with_bc_and_ku() {
        let mut t = template();
        t.required_subject = SubjectKind::Cn;
        let r = Request::new(1, "alice", "/CN=alice", "", 1);
        let out = build_extensions(&t, &r, &AssemblyContext::default()).unwrap();
        assert_eq!(out.extensions.len(), 2);
        assert_eq!(out.extensions[0].oid(), OID_BASIC_CONSTRAINTS);
        assert!(out.extensions[0].critical);
        assert_eq!(out.extensions[1].oid(), OID_KEY_USAGE);
        assert!(out.extensions[1].critical);
    }

    #[test]
    fn test_user_email_moves_into_san() {
        let mut r = Request::new(2, "alice", "/CN=alice/emailAddress=alice@example.org", "", 1);
        r.san = Some(String::from("DNS:alice.example.org,URI:http://nope.example.org"));
        let ctx = AssemblyContext {
            crl_urls: vec![String::from("http://ca.example.org/ca.crl")],
            ocsp_url: Some(String::from("http://ocsp.example.org")),
        };
        let out = build_extensions(&template(), &r, &ctx).unwrap();

        assert_eq!(out.subject.to_string(), "/CN=alice");
        assert_eq!(out.extensions.len(), 5);
        assert_eq!(
            out.extensions[2].value,
            ExtensionValue::SubjectAltName(vec![
                GeneralName::Dns(String::from("alice.example.org")),
                GeneralName::Email(String::from("alice@example.org")),
            ])
        );
        assert!(matches!(
            out.extensions[3].value,
            ExtensionValue::CrlDistributionPoints(_)
        ));
        assert!(matches!(
            out.extensions[4].value,
            ExtensionValue::AuthorityInfoAccess(_)
        ));
    }

    #[test]
    fn test_eku_criticality_and_extras() {
        let mut t = template();
        t.required_subject = SubjectKind::DnPartial;
        t.ext_key_usage = vec![ExtKeyUsage::ClientAuth];
        t.ext_key_usage_critical = true;
        t.extensions = vec![ExtensionDescriptor::new("1.3.6.1.4.1.99999.7", false, "hello")];
        let r = Request::new(3, "bob", "/O=Example/CN=bob", "", 1);
        let out = build_extensions(&t, &r, &AssemblyContext::default()).unwrap();
        assert_eq!(out.extensions.len(), 4);
        assert!(out.extensions[2].critical);
        assert_eq!(out.extensions[3].oid(), &[1, 3, 6, 1, 4, 1, 99999, 7]);
    }

    #[test]
    fn test_subject_shape_enforced() {
        let r = Request::new(4, "carol", "/CN=carol", "", 1);
        let err = build_extensions(&template(), &r, &AssemblyContext::default()).unwrap_err();
        assert!(err.is_policy());
    }
}
