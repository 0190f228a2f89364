// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of a fully qualified domain name.
const MAX_DOMAIN_LEN: usize = 253;

/// Hostname labels of 1-63 characters, no leading/trailing hyphens,
/// at least two labels, and an alphabetic (or punycode) TLD.
static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+(?:[a-zA-Z]{2,63}|xn--[a-zA-Z0-9-]{1,59})$",
    )
    .expect("invalid domain regex")
});

pub fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty() && domain.len() <= MAX_DOMAIN_LEN && DOMAIN_REGEX.is_match(domain)
}

/// Ordered list of validated domain names for one app.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainSet(Vec<String>);

impl DomainSet {
    /// Parse a comma-separated domain list.
    ///
    /// # Errors
    /// [`Error::InvalidDomain`] naming the first token that fails validation,
    /// or [`Error::NoDomains`] when nothing remains.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::NoDomains);
        }
        let mut domains = Vec::new();
        for token in input.split(',') {
            if !is_valid_domain(token) {
                return Err(Error::InvalidDomain {
                    domain: token.to_string(),
                });
            }
            domains.push(token.to_string());
        }
        Ok(Self(domains))
    }

    /// Wrap domains read back from a vhost. No syntax validation is applied,
    /// whatever nginx is currently serving is taken as-is.
    pub fn from_config(domains: Vec<String>) -> Self {
        Self(domains)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined form used in listings.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl From<Vec<String>> for DomainSet {
    fn from(domains: Vec<String>) -> Self {
        Self(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_regex_compiles() {
        let _ = &*DOMAIN_REGEX;
    }

    #[test]
    fn test_valid_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("www.example.com"));
        assert!(is_valid_domain("my-app.example.co.uk"));
        assert!(is_valid_domain("a1.io"));
        assert!(is_valid_domain("xn--bcher-kva.example"));
        assert!(is_valid_domain("example.xn--p1ai"));
    }

    #[test]
    fn test_invalid_domains() {
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("localhost"));
        assert!(!is_valid_domain("-bad.com"));
        assert!(!is_valid_domain("bad-.com"));
        assert!(!is_valid_domain("under_score.com"));
        assert!(!is_valid_domain("example..com"));
        assert!(!is_valid_domain(" example.com"));
        assert!(!is_valid_domain("example.com."));
        assert!(!is_valid_domain("*.example.com"));
        assert!(!is_valid_domain("192.168.1.1"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
    }

    #[test]
    fn test_parse_accepts_all_valid() {
        let set = DomainSet::parse("x.com,www.x.com").expect("both domains are valid");
        assert_eq!(set.as_slice(), &["x.com", "www.x.com"]);
        assert_eq!(set.joined(), "x.com,www.x.com");
    }

    #[test]
    fn test_parse_names_first_invalid_token() {
        let err = DomainSet::parse("x.com,bad_one,also bad").expect_err("should reject");
        match err {
            Error::InvalidDomain { domain } => assert_eq!(domain, "bad_one"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_empty_token() {
        // A trailing comma produces an empty token, which is not a domain
        let err = DomainSet::parse("x.com,").expect_err("should reject");
        assert!(matches!(err, Error::InvalidDomain { domain } if domain.is_empty()));
    }

    #[test]
    fn test_parse_empty_input_is_distinct_error() {
        assert!(matches!(DomainSet::parse(""), Err(Error::NoDomains)));
    }
}
