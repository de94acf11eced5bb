use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Distinguished name attributes understood by the CA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NameAttr {
    Country,
    State,
    Locality,
    Organization,
    OrganizationalUnit,
    CommonName,
    Email,
}

impl NameAttr {
    /// Canonical order used when building names
    pub const ORDER: [Self; 7] = [
        Self::Country,
        Self::State,
        Self::Locality,
        Self::Organization,
        Self::OrganizationalUnit,
        Self::CommonName,
        Self::Email,
    ];

    /// OpenSSL short name
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Country => "C",
            Self::State => "ST",
            Self::Locality => "L",
            Self::Organization => "O",
            Self::OrganizationalUnit => "OU",
            Self::CommonName => "CN",
            Self::Email => "emailAddress",
        }
    }

    #[must_use]
    pub const fn oid(self) -> &'static [u64] {
        match self {
            Self::Country => &[2, 5, 4, 6],
            Self::State => &[2, 5, 4, 8],
            Self::Locality => &[2, 5, 4, 7],
            Self::Organization => &[2, 5, 4, 10],
            Self::OrganizationalUnit => &[2, 5, 4, 11],
            Self::CommonName => &[2, 5, 4, 3],
            Self::Email => &[1, 2, 840, 113_549, 1, 9, 1],
        }
    }

    #[must_use]
    pub fn from_oid(oid: &[u64]) -> Option<Self> {
        Self::ORDER.into_iter().find(|a| a.oid() == oid)
    }
}

impl std::str::FromStr for NameAttr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "C" | "countryName" => Ok(Self::Country),
            "ST" | "S" | "stateOrProvinceName" => Ok(Self::State),
            "L" | "localityName" => Ok(Self::Locality),
            "O" | "organizationName" => Ok(Self::Organization),
            "OU" | "organizationalUnitName" => Ok(Self::OrganizationalUnit),
            "CN" | "commonName" => Ok(Self::CommonName),
            "emailAddress" | "E" | "email" => Ok(Self::Email),
            other => Err(CoreError::Invalid(format!("unknown name attribute {other}"))),
        }
    }
}

/// Ordered list of subject name components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectName(Vec<(NameAttr, String)>);

impl SubjectName {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Name with only a common name
    pub fn common_name(cn: impl Into<String>) -> Self {
        Self(vec![(NameAttr::CommonName, cn.into())])
    }

    pub fn push(&mut self, attr: NameAttr, value: impl Into<String>) {
        self.0.push((attr, value.into()));
    }

    /// Builder-style [`push`](Self::push)
    #[must_use]
    pub fn with(mut self, attr: NameAttr, value: impl Into<String>) -> Self {
        self.push(attr, value);
        self
    }

    /// First value for an attribute
    #[must_use]
    pub fn get(&self, attr: NameAttr) -> Option<&str> {
        self.0
            .iter()
            .find(|(a, _)| *a == attr)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn cn(&self) -> Option<&str> {
        self.get(NameAttr::CommonName)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get(NameAttr::Email)
    }

    /// Remove every value of `attr`, returning the first removed one
    pub fn take(&mut self, attr: NameAttr) -> Option<String> {
        let mut taken = None;
        self.0.retain(|(a, v)| {
            if *a == attr {
                if taken.is_none() {
                    taken = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        taken
    }

    pub fn iter(&self) -> impl Iterator<Item = (NameAttr, &str)> {
        self.0.iter().map(|(a, v)| (*a, v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for SubjectName {
    /// OpenSSL one-line form: `/C=ES/CN=alice`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (attr, value) in &self.0 {
            write!(f, "/{}={value}", attr.short_name())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for SubjectName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let mut name = Self::new();
        for part in s.split('/').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| CoreError::Invalid(format!("malformed subject component {part}")))?;
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            name.push(key.parse()?, value);
        }
        if name.is_empty() {
            return Err(CoreError::Invalid(format!("empty subject {s:?}")));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let name: SubjectName = "/C=ES/ST=Madrid/O=Example/CN=alice/emailAddress=a@example.org"
            .parse()
            .unwrap();
        assert_eq!(name.len(), 5);
        assert_eq!(name.cn(), Some("alice"));
        assert_eq!(name.email(), Some("a@example.org"));
        assert_eq!(
            name.to_string(),
            "/C=ES/ST=Madrid/O=Example/CN=alice/emailAddress=a@example.org"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<SubjectName>().is_err());
        assert!("/CN".parse::<SubjectName>().is_err());
        assert!("/XX=1".parse::<SubjectName>().is_err());
    }

    #[test]
    fn test_take() {
        let mut name = SubjectName::common_name("bob").with(NameAttr::Email, "b@example.org");
        assert_eq!(name.take(NameAttr::Email).as_deref(), Some("b@example.org"));
        assert_eq!(name.to_string(), "/CN=bob");
        assert_eq!(name.take(NameAttr::Email), None);
    }

    #[test]
    fn test_oid_lookup() {
        assert_eq!(NameAttr::from_oid(&[2, 5, 4, 3]), Some(NameAttr::CommonName));
        assert_eq!(NameAttr::from_oid(&[2, 5, 4, 99]), None);
    }
}
