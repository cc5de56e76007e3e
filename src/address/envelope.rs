use super::Address;

/// Simple email envelope representation
///
/// One sender and one recipient, given to the server with `MAIL FROM` and
/// `RCPT TO`. They may differ from the `From` and `To` headers of the message.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipient address
    forward_path: Address,
    /// The envelope sender address
    reverse_path: Address,
}

impl Envelope {
    /// Creates a new envelope
    ///
    /// # Examples
    ///
    /// ```
    /// use std::str::FromStr;
    /// # use smtp_connection_helper::Address;
    /// # use smtp_connection_helper::address::Envelope;
    ///
    /// # use std::error::Error;
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// let sender = Address::from_str("from@email.com")?;
    /// let recipient = Address::from_str("to@email.com")?;
    ///
    /// let envelope = Envelope::new(sender.clone(), recipient.clone());
    /// assert_eq!(envelope.from(), &sender);
    /// assert_eq!(envelope.to(), &recipient);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(from: Address, to: Address) -> Envelope {
        Envelope {
            forward_path: to,
            reverse_path: from,
        }
    }

    /// Gets the destination address of the envelope.
    pub fn to(&self) -> &Address {
        &self.forward_path
    }

    /// Gets the sender of the envelope.
    pub fn from(&self) -> &Address {
        &self.reverse_path
    }

    /// Check if any of the addresses in the envelope contains non-ascii chars
    pub(crate) fn has_non_ascii_addresses(&self) -> bool {
        !self.reverse_path.is_ascii() || !self.forward_path.is_ascii()
    }
}
