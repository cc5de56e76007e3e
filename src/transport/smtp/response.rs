//! SMTP replies: a mandatory three digit code followed by one or more text lines

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use nom::{
    bytes::streaming::{tag, take_until},
    character::streaming::one_of,
    combinator::{complete, map_res, recognize},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::{error, Error};

/// What the first digit of a reply code says about the command
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Severity {
    /// `2yz`, the command was carried out
    PositiveCompletion,
    /// `3yz`, more input is expected
    PositiveIntermediate,
    /// `4yz`, worth retrying later
    TransientNegativeCompletion,
    /// `5yz`
    PermanentNegativeCompletion,
}

/// A three digit reply code such as `250`
///
/// The first digit is between 2 and 5 and the second between 0 and 5.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Code(u16);

impl Code {
    /// `250`, requested action completed
    pub const OK: Code = Code(250);
    /// `550`, requested action not taken
    pub const NOT_TAKEN: Code = Code(550);

    /// Returns `None` for values that are not reply codes
    pub fn new(value: u16) -> Option<Code> {
        let valid = (200..600).contains(&value) && (value / 10) % 10 <= 5;
        valid.then_some(Code(value))
    }

    /// Meaning of the first digit
    pub fn severity(self) -> Severity {
        match self.0 / 100 {
            2 => Severity::PositiveCompletion,
            3 => Severity::PositiveIntermediate,
            4 => Severity::TransientNegativeCompletion,
            _ => Severity::PermanentNegativeCompletion,
        }
    }

    /// Tells if the response is positive
    pub fn is_positive(self) -> bool {
        self.0 < 400
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.0
    }
}

/// Contains an SMTP reply, with separated code and message
///
/// The text message is optional, only the code is mandatory
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    code: Code,
    /// One entry per line, without the code
    message: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Response, Error> {
        parse_response(s)
            .map(|(_, r)| r)
            .map_err(|e| error::response(e.to_owned()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// Tells if the response is positive
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        u16::from(self.code) == code
    }

    /// Returns only the first word of the message if possible
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split_whitespace().next())
    }

    /// Returns only the line of the message if possible
    pub fn first_line(&self) -> Option<&str> {
        self.message.first().map(String::as_str)
    }

    /// Response code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Server response string (array of lines)
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.message.iter().map(String::as_str)
    }
}

fn parse_code(i: &str) -> IResult<&str, Code> {
    map_res(
        recognize((one_of("2345"), one_of("012345"), one_of("0123456789"))),
        |digits: &str| digits.parse().map(Code),
    )
    .parse(i)
}

/// The text after the code may be missing entirely (`250\r\n`), which RFC 5321
/// allows for the last line.
fn parse_last_line(i: &str) -> IResult<&str, &str> {
    if i.starts_with("\r\n") {
        return Ok((i, &i[..0]));
    }
    preceded(tag(" "), take_until("\r\n")).parse(i)
}

pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, lines) = many0((
        parse_code,
        preceded(tag("-"), take_until("\r\n")),
        tag("\r\n"),
    ))
    .parse(i)?;
    let (i, (last_code, last_line)) = (parse_code, parse_last_line).parse(i)?;
    let (i, _) = complete(tag("\r\n")).parse(i)?;

    // every line of a reply carries the same code
    if !lines.iter().all(|&(code, _, _)| code == last_code) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            "",
            nom::error::ErrorKind::Not,
        )));
    }

    let mut lines: Vec<String> = lines.into_iter().map(|(_, text, _)| text.into()).collect();
    lines.push(last_line.into());

    Ok((
        i,
        Response {
            code: last_code,
            message: lines,
        },
    ))
}
