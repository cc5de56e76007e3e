//! ESMTP features

use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use crate::{
    error::{self, Error},
    transport::smtp::{authentication::Mechanism, response::Response},
};

/// Client identifier, the parameter to `EHLO`
#[derive(PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum ClientId {
    /// A fully-qualified domain name
    Domain(String),
    /// An IPv4 address
    Ipv4(Ipv4Addr),
    /// An IPv6 address
    Ipv6(Ipv6Addr),
}

impl Default for ClientId {
    fn default() -> Self {
        Self::Domain("localhost".to_owned())
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Domain(ref value) => f.write_str(value),
            Self::Ipv4(ref value) => write!(f, "[{value}]"),
            Self::Ipv6(ref value) => write!(f, "[IPv6:{value}]"),
        }
    }
}

impl ClientId {
    /// Creates a `ClientId` from the name this client should present
    ///
    /// IP addresses, bracketed or not, become address literals as required by
    /// [RFC 5321, section 4.1.3](https://tools.ietf.org/html/rfc5321#section-4.1.3).
    pub fn from_hostname(hostname: &str) -> Result<Self, Error> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(error::validation("client hostname must not be empty"));
        }
        if hostname.contains(char::is_whitespace) {
            return Err(error::validation(
                "client hostname must not contain whitespace",
            ));
        }

        let literal = hostname
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(|h| h.strip_prefix("IPv6:").unwrap_or(h))
            .unwrap_or(hostname);

        Ok(match literal.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Self::Ipv4(ip),
            Ok(IpAddr::V6(ip)) => Self::Ipv6(ip),
            Err(_) => Self::Domain(hostname.to_owned()),
        })
    }
}

/// Supported ESMTP keywords
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum Extension {
    /// 8BITMIME keyword
    ///
    /// Defined in [RFC 6152](https://tools.ietf.org/html/rfc6152)
    EightBitMime,
    /// SMTPUTF8 keyword
    ///
    /// Defined in [RFC 6531](https://tools.ietf.org/html/rfc6531)
    SmtpUtfEight,
    /// STARTTLS keyword
    ///
    /// Defined in [RFC 2487](https://tools.ietf.org/html/rfc2487)
    StartTls,
    /// AUTH keyword, whatever the mechanisms listed with it
    ///
    /// Defined in [RFC 4954](https://tools.ietf.org/html/rfc4954)
    Authentication,
}

impl Display for Extension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Extension::EightBitMime => f.write_str("8BITMIME"),
            Extension::SmtpUtfEight => f.write_str("SMTPUTF8"),
            Extension::StartTls => f.write_str("STARTTLS"),
            Extension::Authentication => f.write_str("AUTH"),
        }
    }
}

/// Contains information about an SMTP server
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ServerInfo {
    /// Server name
    ///
    /// The name given in the server banner
    name: String,
    /// ESMTP features supported by the server
    ///
    /// It contains the features supported by the server and known by the `Extension` module.
    features: HashSet<Extension>,
    /// SASL mechanisms listed after the `AUTH` keyword and known by `Mechanism`
    mechanisms: HashSet<Mechanism>,
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let features = if self.features.is_empty() {
            "no supported features".to_owned()
        } else {
            let mut features: Vec<String> = self.features.iter().map(ToString::to_string).collect();
            features.sort();
            features.join(", ")
        };
        write!(f, "{} with {}", self.name, features)?;
        if !self.mechanisms.is_empty() {
            let mut mechanisms: Vec<String> =
                self.mechanisms.iter().map(ToString::to_string).collect();
            mechanisms.sort();
            write!(f, " (auth: {})", mechanisms.join(" "))?;
        }
        Ok(())
    }
}

impl ServerInfo {
    /// Parses a EHLO response to create a `ServerInfo`
    pub fn from_response(response: &Response) -> Result<ServerInfo, Error> {
        let name = match response.first_word() {
            Some(name) => name,
            None => return Err(error::response("Could not read server name")),
        };

        let mut features: HashSet<Extension> = HashSet::new();
        let mut mechanisms: HashSet<Mechanism> = HashSet::new();

        for line in response.message().skip(1) {
            let mut split = line.split_whitespace();
            let keyword = match split.next() {
                Some(keyword) => keyword.to_ascii_uppercase(),
                None => continue,
            };

            // Some old servers announce `AUTH=LOGIN PLAIN`
            let (keyword, first_mechanism) = match keyword.split_once('=') {
                Some((keyword, first)) => (keyword.to_owned(), Some(first.to_owned())),
                None => (keyword, None),
            };

            match keyword.as_str() {
                "8BITMIME" => {
                    features.insert(Extension::EightBitMime);
                }
                "SMTPUTF8" => {
                    features.insert(Extension::SmtpUtfEight);
                }
                "STARTTLS" => {
                    features.insert(Extension::StartTls);
                }
                "AUTH" => {
                    features.insert(Extension::Authentication);
                    for mechanism in first_mechanism.iter().map(String::as_str).chain(split) {
                        if let Ok(mechanism) = mechanism.parse::<Mechanism>() {
                            mechanisms.insert(mechanism);
                        }
                    }
                }
                _ => (),
            };
        }

        Ok(ServerInfo {
            name: name.to_owned(),
            features,
            mechanisms,
        })
    }

    /// Server information for a peer that only answered `HELO`
    pub(crate) fn without_extensions(response: &Response) -> ServerInfo {
        ServerInfo {
            name: response.first_word().unwrap_or_default().to_owned(),
            ..ServerInfo::default()
        }
    }

    /// Checks if the server supports an ESMTP feature
    pub fn supports_feature(&self, keyword: Extension) -> bool {
        self.features.contains(&keyword)
    }

    /// Checks if the server lists a SASL mechanism after its `AUTH` keyword
    pub fn supports_auth_mechanism(&self, mechanism: Mechanism) -> bool {
        self.mechanisms.contains(&mechanism)
    }

    /// The name given in the server banner
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
}

/// A `MAIL FROM` extension parameter
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum MailParameter {
    /// `BODY` parameter
    Body(MailBodyParameter),
    /// `SMTPUTF8` parameter
    SmtpUtfEight,
}

impl Display for MailParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MailParameter::Body(ref value) => write!(f, "BODY={value}"),
            MailParameter::SmtpUtfEight => f.write_str("SMTPUTF8"),
        }
    }
}

/// Values for the `BODY` parameter to `MAIL FROM`
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub enum MailBodyParameter {
    /// `7BIT`
    SevenBit,
    /// `8BITMIME`
    EightBitMime,
}

impl Display for MailBodyParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MailBodyParameter::SevenBit => f.write_str("7BIT"),
            MailBodyParameter::EightBitMime => f.write_str("8BITMIME"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ehlo(raw: &str) -> ServerInfo {
        ServerInfo::from_response(&raw.parse::<Response>().unwrap()).unwrap()
    }

    #[test]
    fn test_clientid_fmt() {
        assert_eq!(ClientId::Domain("test".to_owned()).to_string(), "test");
        assert_eq!(
            ClientId::Ipv4(Ipv4Addr::new(127, 0, 0, 1)).to_string(),
            "[127.0.0.1]"
        );
        assert_eq!(
            ClientId::Ipv6(Ipv6Addr::LOCALHOST).to_string(),
            "[IPv6:::1]"
        );
    }

    #[test]
    fn test_clientid_from_hostname() {
        assert_eq!(
            ClientId::from_hostname("mx.example.org").unwrap(),
            ClientId::Domain("mx.example.org".to_owned())
        );
        assert_eq!(
            ClientId::from_hostname("192.0.2.1").unwrap(),
            ClientId::Ipv4(Ipv4Addr::new(192, 0, 2, 1))
        );
        assert_eq!(
            ClientId::from_hostname("[192.0.2.1]").unwrap(),
            ClientId::Ipv4(Ipv4Addr::new(192, 0, 2, 1))
        );
        assert_eq!(
            ClientId::from_hostname("[IPv6:::1]").unwrap(),
            ClientId::Ipv6(Ipv6Addr::LOCALHOST)
        );
        assert!(ClientId::from_hostname("").unwrap_err().is_validation());
        assert!(ClientId::from_hostname("my host").unwrap_err().is_validation());
    }

    #[test]
    fn test_extension_fmt() {
        assert_eq!(Extension::EightBitMime.to_string(), "8BITMIME");
        assert_eq!(Extension::Authentication.to_string(), "AUTH");
    }

    #[test]
    fn test_serverinfo_fmt() {
        assert_eq!(
            ehlo("250 name\r\n").to_string(),
            "name with no supported features"
        );
        assert_eq!(
            ehlo("250-name\r\n250-STARTTLS\r\n250 AUTH PLAIN LOGIN CRAM-MD5\r\n").to_string(),
            "name with AUTH, STARTTLS (auth: LOGIN PLAIN)"
        );
    }

    #[test]
    fn test_serverinfo() {
        let server_info = ehlo("250-me\r\n250-8BITMIME\r\n250 SIZE 42\r\n");

        assert_eq!(server_info.name(), "me");
        assert!(server_info.supports_feature(Extension::EightBitMime));
        assert!(!server_info.supports_feature(Extension::StartTls));
        assert!(!server_info.supports_feature(Extension::Authentication));

        let server_info = ehlo(
            "250-me\r\n250-AUTH PLAIN CRAM-MD5 XOAUTH2 OTHER\r\n250-starttls\r\n250 SIZE 42\r\n",
        );

        assert!(server_info.supports_feature(Extension::StartTls));
        assert!(server_info.supports_feature(Extension::Authentication));
        assert!(server_info.supports_auth_mechanism(Mechanism::Plain));
        assert!(!server_info.supports_auth_mechanism(Mechanism::Login));
    }

    #[test]
    fn test_serverinfo_auth_without_known_mechanism() {
        let server_info = ehlo("250-me\r\n250 AUTH CRAM-MD5\r\n");

        assert!(server_info.supports_feature(Extension::Authentication));
        assert!(!server_info.supports_auth_mechanism(Mechanism::Plain));
        assert_eq!(server_info.to_string(), "me with AUTH");
    }

    #[test]
    fn test_serverinfo_legacy_auth_syntax() {
        let server_info = ehlo("250-me\r\n250 AUTH=LOGIN PLAIN\r\n");

        assert!(server_info.supports_feature(Extension::Authentication));
        assert!(server_info.supports_auth_mechanism(Mechanism::Login));
        assert!(server_info.supports_auth_mechanism(Mechanism::Plain));
    }

    #[test]
    fn test_mail_parameter_fmt() {
        assert_eq!(
            MailParameter::Body(MailBodyParameter::EightBitMime).to_string(),
            "BODY=8BITMIME"
        );
        assert_eq!(MailParameter::SmtpUtfEight.to_string(), "SMTPUTF8");
    }
}
