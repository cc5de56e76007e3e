//! Builds the test message
//!
//! The message is a single HTML part. Header values are copied as given,
//! without any encoding, which is enough for a connection check.
//!
//! ```rust
//! use smtp_connection_helper::{Envelope, MessageContent};
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let content = MessageContent::new("Happy new year", "Be happy!", "client.example.org")?;
//! let envelope = Envelope::new("nobody@domain.tld".parse()?, "hei@domain.tld".parse()?);
//! let email = content.compose(&envelope);
//! assert!(email.starts_with(b"MIME-Version: 1.0\r\n"));
//! # Ok(())
//! # }
//! ```
//!
//! Which produces:
//!
//! ```sh
//! MIME-Version: 1.0
//! Content-Type: text/html; charset="UTF-8"
//! From: nobody@domain.tld
//! To: hei@domain.tld
//! Subject: Happy new year
//! Date: Sat, 12 Dec 2020 16:33:19 -0000
//! Message-ID: <TnWiBDPLf36Ap4hHi4LYMgYz79U2JNpx@client.example.org>
//!
//! Be happy!
//! ```

use std::{iter, time::SystemTime};

use httpdate::HttpDate;

use crate::{
    address::Envelope,
    error::{self, Error},
    transport::smtp::extension::ClientId,
};

/// Subject, body and the name the client introduces itself with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    subject: String,
    body: String,
    client_hostname: String,
    client_id: ClientId,
}

impl MessageContent {
    /// Checks that no field is empty
    ///
    /// `client_hostname` is sent with `EHLO`, as an address literal when it
    /// is an IP address.
    pub fn new<S, B, H>(subject: S, body: B, client_hostname: H) -> Result<Self, Error>
    where
        S: Into<String>,
        B: Into<String>,
        H: Into<String>,
    {
        let subject = subject.into();
        let body = body.into();
        let client_hostname = client_hostname.into();

        if subject.is_empty() {
            return Err(error::validation("subject must not be empty"));
        }
        if body.is_empty() {
            return Err(error::validation("message must not be empty"));
        }
        let client_id = ClientId::from_hostname(&client_hostname)?;

        Ok(Self {
            subject,
            body,
            client_hostname: client_hostname.trim().to_owned(),
            client_id,
        })
    }

    /// The identifier sent with `EHLO`
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Formats the message, dated now and with a fresh `Message-ID`
    pub fn compose(&self, envelope: &Envelope) -> Vec<u8> {
        let id: String = iter::repeat_with(fastrand::alphanumeric)
            .take(32)
            .collect();
        self.compose_with(envelope, SystemTime::now(), &id)
    }

    fn compose_with(&self, envelope: &Envelope, date: SystemTime, id: &str) -> Vec<u8> {
        let headers = [
            ("MIME-Version", "1.0".to_owned()),
            ("Content-Type", "text/html; charset=\"UTF-8\"".to_owned()),
            ("From", envelope.from().to_string()),
            ("To", envelope.to().to_string()),
            ("Subject", self.subject.clone()),
            ("Date", format_date(date)),
            ("Message-ID", format!("<{id}@{}>", self.client_hostname)),
        ];

        let mut email = Vec::with_capacity(256 + self.body.len());
        for (name, value) in headers {
            email.extend_from_slice(name.as_bytes());
            email.extend_from_slice(b": ");
            email.extend_from_slice(value.as_bytes());
            email.extend_from_slice(b"\r\n");
        }
        email.extend_from_slice(b"\r\n");
        email.extend_from_slice(self.body.as_bytes());
        email.extend_from_slice(b"\r\n");
        email
    }
}

fn format_date(date: SystemTime) -> String {
    let mut s = HttpDate::from(date).to_string();
    if s.ends_with(" GMT") {
        // The httpdate crate always appends ` GMT` to the end of the string,
        // but this is considered an obsolete date format for email
        // https://tools.ietf.org/html/rfc2822#appendix-A.6.2,
        // so we replace `GMT` with `-0000`
        s.truncate(s.len() - "GMT".len());
        s.push_str("-0000");
    }
    s
}
