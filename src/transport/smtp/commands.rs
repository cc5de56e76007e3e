//! SMTP commands

use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    error::{self, Error},
    transport::smtp::{
        authentication::{Authenticator, Mechanism},
        extension::{ClientId, MailParameter},
        response::Response,
    },
    Address,
};

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EHLO {}\r\n", self.client_id)
    }
}

impl Ehlo {
    /// Creates a EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// HELO command, for servers that do not speak ESMTP
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Helo {
    client_id: ClientId,
}

impl Display for Helo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HELO {}\r\n", self.client_id)
    }
}

impl Helo {
    /// Creates a HELO command
    pub fn new(client_id: ClientId) -> Helo {
        Helo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// MAIL command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail {
    sender: Address,
    parameters: Vec<MailParameter>,
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>", self.sender)?;
        for parameter in &self.parameters {
            write!(f, " {parameter}")?;
        }
        f.write_str("\r\n")
    }
}

impl Mail {
    /// Creates a MAIL command
    pub fn new(sender: Address, parameters: Vec<MailParameter>) -> Mail {
        Mail { sender, parameters }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt {
    recipient: Address,
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RCPT TO:<{}>\r\n", self.recipient)
    }
}

impl Rcpt {
    /// Creates an RCPT command
    pub fn new(recipient: Address) -> Rcpt {
        Rcpt { recipient }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// AUTH command, with the initial response when the mechanism has one
///
/// An empty initial response is sent as `=`, see
/// [RFC 4954, section 4](https://tools.ietf.org/html/rfc4954#section-4).
#[derive(PartialEq, Eq, Clone)]
pub struct Auth {
    mechanism: Mechanism,
    response: Option<String>,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("mechanism", &self.mechanism)
            .finish_non_exhaustive()
    }
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AUTH {}", self.mechanism)?;
        match self.response.as_deref() {
            Some("") => f.write_str(" =")?,
            Some(response) => write!(f, " {}", STANDARD.encode(response))?,
            None => (),
        }
        f.write_str("\r\n")
    }
}

impl Auth {
    /// Creates an AUTH command for the authenticator's mechanism
    pub fn new(authenticator: &Authenticator) -> Auth {
        Auth {
            mechanism: authenticator.mechanism(),
            response: authenticator.initial_response(),
        }
    }
}

/// Answer to a `334` challenge during an AUTH exchange
#[derive(PartialEq, Eq, Clone)]
pub struct AuthResponse {
    response: String,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse").finish_non_exhaustive()
    }
}

impl Display for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", STANDARD.encode(&self.response))
    }
}

impl AuthResponse {
    /// Creates the answer from a response that needs to be a
    /// valid challenge (with 334 response code)
    pub fn new_from_response(
        authenticator: &Authenticator,
        response: &Response,
    ) -> Result<AuthResponse, Error> {
        let challenge = decode_challenge(response)?;
        Ok(AuthResponse {
            response: authenticator.response(&challenge)?,
        })
    }
}

/// Line aborting an AUTH exchange, see
/// [RFC 4954, section 4](https://tools.ietf.org/html/rfc4954#section-4)
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct AuthCancel;

impl Display for AuthCancel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("*\r\n")
    }
}

/// Decodes the base64 text of a `334` reply
pub(crate) fn decode_challenge(response: &Response) -> Result<String, Error> {
    if !response.has_code(334) {
        return Err(error::response("Expecting a challenge"));
    }

    let encoded_challenge = response.first_word().unwrap_or_default();
    #[cfg(feature = "tracing")]
    tracing::debug!("auth encoded challenge: {}", encoded_challenge);

    let decoded = STANDARD.decode(encoded_challenge).map_err(error::response)?;
    String::from_utf8(decoded).map_err(error::response)
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;
    use crate::transport::smtp::{authentication::AuthSpec, extension::MailBodyParameter};

    fn authenticator(spec: AuthSpec) -> Authenticator {
        Authenticator::from_spec(spec).unwrap().unwrap()
    }

    #[test]
    fn test_display() {
        let id = ClientId::Domain("localhost".to_owned());
        let email = Address::from_str("test@example.com").unwrap();
        assert_eq!(Ehlo::new(id.clone()).to_string(), "EHLO localhost\r\n");
        assert_eq!(Helo::new(id).to_string(), "HELO localhost\r\n");
        assert_eq!(Starttls.to_string(), "STARTTLS\r\n");
        assert_eq!(
            Mail::new(email.clone(), vec![]).to_string(),
            "MAIL FROM:<test@example.com>\r\n"
        );
        assert_eq!(
            Mail::new(
                email.clone(),
                vec![
                    MailParameter::Body(MailBodyParameter::EightBitMime),
                    MailParameter::SmtpUtfEight,
                ],
            )
            .to_string(),
            "MAIL FROM:<test@example.com> BODY=8BITMIME SMTPUTF8\r\n"
        );
        assert_eq!(
            Rcpt::new(email).to_string(),
            "RCPT TO:<test@example.com>\r\n"
        );
        assert_eq!(Quit.to_string(), "QUIT\r\n");
        assert_eq!(Data.to_string(), "DATA\r\n");
        assert_eq!(AuthCancel.to_string(), "*\r\n");
    }

    #[test]
    fn test_auth_display() {
        let plain = authenticator(AuthSpec::Plain {
            identity: String::new(),
            username: "user".to_owned(),
            password: "password".to_owned(),
        });
        assert_eq!(
            Auth::new(&plain).to_string(),
            "AUTH PLAIN AHVzZXIAcGFzc3dvcmQ=\r\n"
        );

        let login = authenticator(AuthSpec::Login {
            username: "user".to_owned(),
            password: "password".to_owned(),
        });
        assert_eq!(Auth::new(&login).to_string(), "AUTH LOGIN\r\n");

        let external = authenticator(AuthSpec::External {
            identity: String::new(),
        });
        assert_eq!(Auth::new(&external).to_string(), "AUTH EXTERNAL =\r\n");

        assert!(!format!("{:?}", Auth::new(&plain)).contains("AHVz"));
    }

    #[test]
    fn test_auth_response() {
        let login = authenticator(AuthSpec::Login {
            username: "alice".to_owned(),
            password: "wonderland".to_owned(),
        });

        let username = "334 VXNlcm5hbWU6\r\n".parse::<Response>().unwrap();
        assert_eq!(
            AuthResponse::new_from_response(&login, &username)
                .unwrap()
                .to_string(),
            "YWxpY2U=\r\n"
        );

        let password = "334 UGFzc3dvcmQ6\r\n".parse::<Response>().unwrap();
        assert_eq!(
            AuthResponse::new_from_response(&login, &password)
                .unwrap()
                .to_string(),
            "d29uZGVybGFuZA==\r\n"
        );

        let not_a_challenge = "235 ok\r\n".parse::<Response>().unwrap();
        assert!(AuthResponse::new_from_response(&login, &not_a_challenge)
            .unwrap_err()
            .is_response());

        let garbage = "334 ???\r\n".parse::<Response>().unwrap();
        assert!(decode_challenge(&garbage).unwrap_err().is_response());
    }

    #[test]
    fn test_empty_challenge() {
        let response = "334 \r\n".parse::<Response>().unwrap();
        assert_eq!(decode_challenge(&response).unwrap(), "");
    }
}
