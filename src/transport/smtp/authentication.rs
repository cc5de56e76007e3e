//! Provides the SASL authentication mechanisms a relay check can use

use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::error::{self, Error};

/// Maximum number of server challenges answered before giving up
pub(crate) const MAX_CHALLENGES: u8 = 10;

/// What the user asked for, together with the fields the mechanism needs
#[derive(PartialEq, Eq, Clone)]
pub enum AuthSpec {
    /// PLAIN with an optional authorization identity
    Plain {
        /// Identity to act as, empty to act as `username`
        identity: String,
        /// Authentication identity, required
        username: String,
        /// Required
        password: String,
    },
    /// LOGIN
    Login {
        /// Required
        username: String,
        /// Required
        password: String,
    },
    /// ANONYMOUS with an optional trace token
    Anonymous {
        /// Free form trace information, may be empty
        trace: String,
    },
    /// EXTERNAL with an optional authorization identity
    External {
        /// Identity to act as, empty to use the one from the external credentials
        identity: String,
    },
    /// OAUTHBEARER (RFC 7628)
    OAuthBearer {
        /// Sent as the `a=` authorization identity, required
        username: String,
        /// Bearer token, required
        token: String,
        /// Relay host, sent as `host=`
        host: String,
        /// Relay port, sent as `port=`
        port: u16,
    },
    /// No authentication
    Disabled,
}

impl AuthSpec {
    /// The name of the method, as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            AuthSpec::Plain { .. } => "plain",
            AuthSpec::Login { .. } => "login",
            AuthSpec::Anonymous { .. } => "anonymous",
            AuthSpec::External { .. } => "external",
            AuthSpec::OAuthBearer { .. } => "oauthbearer",
            AuthSpec::Disabled => "disable",
        }
    }
}

impl Debug for AuthSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AuthSpec::Plain {
                identity, username, ..
            } => f
                .debug_struct("Plain")
                .field("identity", identity)
                .field("username", username)
                .finish_non_exhaustive(),
            AuthSpec::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            AuthSpec::Anonymous { trace } => {
                f.debug_struct("Anonymous").field("trace", trace).finish()
            }
            AuthSpec::External { identity } => f
                .debug_struct("External")
                .field("identity", identity)
                .finish(),
            AuthSpec::OAuthBearer {
                username,
                host,
                port,
                ..
            } => f
                .debug_struct("OAuthBearer")
                .field("username", username)
                .field("host", host)
                .field("port", port)
                .finish_non_exhaustive(),
            AuthSpec::Disabled => f.write_str("Disabled"),
        }
    }
}

/// Represents authentication mechanisms
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
pub enum Mechanism {
    /// PLAIN authentication mechanism, defined in
    /// [RFC 4616](https://tools.ietf.org/html/rfc4616)
    Plain,
    /// LOGIN authentication mechanism
    /// Obsolete but needed for some providers (like office365)
    ///
    /// Defined in [draft-murchison-sasl-login-00](https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt).
    Login,
    /// ANONYMOUS authentication mechanism, defined in
    /// [RFC 4505](https://tools.ietf.org/html/rfc4505)
    Anonymous,
    /// EXTERNAL authentication mechanism, defined in
    /// [RFC 4422, appendix A](https://tools.ietf.org/html/rfc4422#appendix-A)
    External,
    /// OAUTHBEARER authentication mechanism, defined in
    /// [RFC 7628](https://tools.ietf.org/html/rfc7628)
    OAuthBearer,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
            Mechanism::Anonymous => "ANONYMOUS",
            Mechanism::External => "EXTERNAL",
            Mechanism::OAuthBearer => "OAUTHBEARER",
        })
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Mechanism::Plain),
            "LOGIN" => Ok(Mechanism::Login),
            "ANONYMOUS" => Ok(Mechanism::Anonymous),
            "EXTERNAL" => Ok(Mechanism::External),
            "OAUTHBEARER" => Ok(Mechanism::OAuthBearer),
            _ => Err(error::client(format!("unknown mechanism {s}"))),
        }
    }
}

#[derive(PartialEq, Eq, Clone)]
enum Credentials {
    Plain {
        identity: String,
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    Anonymous {
        trace: String,
    },
    External {
        identity: String,
    },
    OAuthBearer {
        username: String,
        token: String,
        host: String,
        port: u16,
    },
}

/// A ready to use SASL client for one mechanism
///
/// Built from an [`AuthSpec`], which is checked before anything touches the
/// network.
#[derive(PartialEq, Eq, Clone)]
pub struct Authenticator {
    credentials: Credentials,
}

impl Debug for Authenticator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("mechanism", &self.mechanism())
            .finish_non_exhaustive()
    }
}

fn require(method: &str, first: (&str, &str), second: (&str, &str)) -> Result<(), Error> {
    if first.1.is_empty() || second.1.is_empty() {
        return Err(error::validation(format!(
            "{} and {} must not be empty for auth {method}",
            first.0, second.0
        )));
    }
    Ok(())
}

impl Authenticator {
    /// Checks the fields required by the requested method
    ///
    /// Returns `None` when authentication is disabled.
    pub fn from_spec(spec: AuthSpec) -> Result<Option<Authenticator>, Error> {
        let method = spec.name();
        let credentials = match spec {
            AuthSpec::Plain {
                identity,
                username,
                password,
            } => {
                require(method, ("username", &username), ("password", &password))?;
                Credentials::Plain {
                    identity,
                    username,
                    password,
                }
            }
            AuthSpec::Login { username, password } => {
                require(method, ("username", &username), ("password", &password))?;
                Credentials::Login { username, password }
            }
            AuthSpec::Anonymous { trace } => Credentials::Anonymous { trace },
            AuthSpec::External { identity } => Credentials::External { identity },
            AuthSpec::OAuthBearer {
                username,
                token,
                host,
                port,
            } => {
                require(method, ("username", &username), ("token", &token))?;
                Credentials::OAuthBearer {
                    username,
                    token,
                    host,
                    port,
                }
            }
            AuthSpec::Disabled => return Ok(None),
        };
        Ok(Some(Authenticator { credentials }))
    }

    /// The mechanism to announce in the `AUTH` command
    pub fn mechanism(&self) -> Mechanism {
        match self.credentials {
            Credentials::Plain { .. } => Mechanism::Plain,
            Credentials::Login { .. } => Mechanism::Login,
            Credentials::Anonymous { .. } => Mechanism::Anonymous,
            Credentials::External { .. } => Mechanism::External,
            Credentials::OAuthBearer { .. } => Mechanism::OAuthBearer,
        }
    }

    /// The response sent along with the `AUTH` command, if the mechanism has one
    pub fn initial_response(&self) -> Option<String> {
        match self.credentials {
            Credentials::Plain {
                ref identity,
                ref username,
                ref password,
            } => Some(format!("{identity}\u{0}{username}\u{0}{password}")),
            Credentials::Login { .. } => None,
            Credentials::Anonymous { ref trace } => Some(trace.clone()),
            Credentials::External { ref identity } => Some(identity.clone()),
            Credentials::OAuthBearer {
                ref username,
                ref token,
                ref host,
                port,
            } => {
                let mut response = format!("n,a={username},");
                if !host.is_empty() {
                    response.push_str(&format!("\x01host={host}"));
                }
                if port != 0 {
                    response.push_str(&format!("\x01port={port}"));
                }
                response.push_str(&format!("\x01auth=Bearer {token}\x01\x01"));
                Some(response)
            }
        }
    }

    /// Returns the string to send to the server in answer to a decoded challenge
    pub fn response(&self, challenge: &str) -> Result<String, Error> {
        match self.credentials {
            Credentials::Login {
                ref username,
                ref password,
            } => {
                if ["User Name", "Username:", "Username"].contains(&challenge) {
                    return Ok(username.clone());
                }

                if ["Password", "Password:"].contains(&challenge) {
                    return Ok(password.clone());
                }

                Err(error::client("Unrecognized challenge"))
            }
            // The server sent its error status, RFC 7628 section 3.2.3
            Credentials::OAuthBearer { .. } => Ok("\x01".to_owned()),
            _ => Err(error::client("This mechanism does not expect a challenge")),
        }
    }
}
