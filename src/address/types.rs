//! Representation of an email address

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    net::IpAddr,
    str::FromStr,
};

use email_address::EmailAddress;
use idna::domain_to_ascii;

use crate::error::{self, Error};

/// Represents an email address with a user and a domain name.
///
/// This type contains email in canonical form (_user@domain.tld_), as it
/// appears in `MAIL FROM` and `RCPT TO`.
///
/// # Examples
///
/// ```
/// use smtp_connection_helper::Address;
///
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let address = "user@email.com".parse::<Address>()?;
/// assert_eq!(address.user(), "user");
/// assert_eq!(address.domain(), "email.com");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Address {
    /// Complete address
    serialized: String,
    /// Index into `serialized` before the '@'
    at_start: usize,
}

impl Address {
    /// Gets the user portion of the `Address`.
    pub fn user(&self) -> &str {
        &self.serialized[..self.at_start]
    }

    /// Gets the domain portion of the `Address`.
    pub fn domain(&self) -> &str {
        &self.serialized[self.at_start + 1..]
    }

    fn check_user(user: &str) -> Result<(), AddressError> {
        if EmailAddress::is_valid_local_part(user) {
            Ok(())
        } else {
            Err(AddressError::InvalidUser)
        }
    }

    fn check_domain(domain: &str) -> Result<(), AddressError> {
        Address::check_domain_ascii(domain).or_else(|_| {
            domain_to_ascii(domain)
                .map_err(|_| AddressError::InvalidDomain)
                .and_then(|domain| Address::check_domain_ascii(&domain))
        })
    }

    fn check_domain_ascii(domain: &str) -> Result<(), AddressError> {
        // Domain
        if EmailAddress::is_valid_domain(domain) {
            return Ok(());
        }

        // IP
        let ip = domain
            .strip_prefix('[')
            .and_then(|ip| ip.strip_suffix(']'))
            .unwrap_or(domain);

        if ip.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        Err(AddressError::InvalidDomain)
    }

    /// Check if the address contains non-ascii chars
    pub(super) fn is_ascii(&self) -> bool {
        self.serialized.is_ascii()
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.serialized)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(val: &str) -> Result<Self, AddressError> {
        let val = val.trim();
        if val.is_empty() {
            return Err(AddressError::Empty);
        }

        let mut parts = val.rsplitn(2, '@');
        let domain = parts.next().ok_or(AddressError::MissingParts)?;
        let user = parts.next().ok_or(AddressError::MissingParts)?;

        Address::check_user(user)?;
        Address::check_domain(domain)?;
        Ok(Address {
            serialized: val.into(),
            at_start: user.len(),
        })
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.serialized
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
/// Errors in email addresses parsing
pub enum AddressError {
    /// Nothing to parse
    Empty,
    /// Missing domain or user
    MissingParts,
    /// Invalid email user
    InvalidUser,
    /// Invalid email domain
    InvalidDomain,
}

impl StdError for AddressError {}

impl Display for AddressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AddressError::Empty => f.write_str("Empty address"),
            AddressError::MissingParts => f.write_str("Missing domain or user"),
            AddressError::InvalidUser => f.write_str("Invalid email user"),
            AddressError::InvalidDomain => f.write_str("Invalid email domain"),
        }
    }
}

impl From<AddressError> for Error {
    fn from(err: AddressError) -> Self {
        error::validation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_address() {
        let addr = Address::from_str("something@example.com").unwrap();
        assert_eq!(addr.user(), "something");
        assert_eq!(addr.domain(), "example.com");
        assert!(addr.is_ascii());
        assert_eq!(addr.to_string(), "something@example.com");
    }

    #[test]
    fn ascii_address_ip() {
        let addr = Address::from_str("something@1.1.1.1").unwrap();
        assert_eq!(addr.domain(), "1.1.1.1");

        let addr = Address::from_str("something@[2606:4700:4700::1111]").unwrap();
        assert_eq!(addr.user(), "something");
        assert_eq!(addr.domain(), "[2606:4700:4700::1111]");
    }

    #[test]
    fn unicode_domain() {
        let addr = Address::from_str("user@bücher.example").unwrap();
        assert_eq!(addr.domain(), "bücher.example");
        assert!(!addr.is_ascii());
    }

    #[test]
    fn invalid_addresses() {
        assert_eq!(Address::from_str(""), Err(AddressError::Empty));
        assert_eq!(Address::from_str("   "), Err(AddressError::Empty));
        assert_eq!(
            Address::from_str("no-at-sign"),
            Err(AddressError::MissingParts)
        );
        assert_eq!(
            Address::from_str("@example.com"),
            Err(AddressError::InvalidUser)
        );
        assert_eq!(
            Address::from_str("user@"),
            Err(AddressError::InvalidDomain)
        );
        assert_eq!(
            Address::from_str("us er@example.com"),
            Err(AddressError::InvalidUser)
        );
    }

    #[test]
    fn check_parts() {
        assert!(Address::check_user("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_err());
        assert!(
            Address::check_domain("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.com").is_err()
        );
    }

    #[test]
    fn into_validation_error() {
        let err: Error = AddressError::InvalidDomain.into();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "invalid configuration: Invalid email domain"
        );
    }
}
