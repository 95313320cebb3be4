//! Nom-based tokenizer for IRC lines.
//!
//! Splits one raw line into prefix, command, middle parameters, and the
//! optional trailing parameter, borrowing from the input throughout. The
//! owned [`Message`](super::Message) is assembled in `types.rs`.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::MessageParseError;

/// Parse the prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command token: 1*letter or exactly 3 digits (RFC 1459).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::AlphaNumeric,
        )))
    }
}

/// Scan the parameters following the command.
///
/// Middle parameters are space-delimited tokens; runs of spaces collapse.
/// The first token starting with `:` switches to trailing mode: everything
/// after that colon (spaces included, possibly empty) is the trailing value
/// and scanning stops.
fn parse_params(input: &str) -> (SmallVec<[&str; 15]>, Option<&str>) {
    let mut middles: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    loop {
        // Skip the separator (one or more spaces).
        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }
        if rest.is_empty() {
            return (middles, None);
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            return (middles, Some(trailing));
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        middles.push(&rest[..end]);
        rest = &rest[end..];
    }
}

/// One tokenized line with borrowed string slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedLine<'a> {
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command token, as written on the wire.
    pub command: &'a str,
    /// Middle parameters, in wire order.
    pub middles: SmallVec<[&'a str; 15]>,
    /// Trailing parameter (without the leading `:`), if present.
    pub trailing: Option<&'a str>,
}

impl<'a> ParsedLine<'a> {
    /// Tokenize one line. The input must already have CR/LF trimmed.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let (input, prefix) =
            opt(parse_prefix)(input).map_err(|_: nom::Err<nom::error::Error<&str>>| {
                MessageParseError::InvalidCommand
            })?;
        let (input, _) = space0::<_, nom::error::Error<&str>>(input)
            .map_err(|_| MessageParseError::InvalidCommand)?;

        let (input, command) =
            parse_command(input).map_err(|_| MessageParseError::InvalidCommand)?;

        // A command must be delimited; "PING:x" is one malformed token.
        if !input.is_empty() && !input.starts_with(' ') {
            return Err(MessageParseError::InvalidCommand);
        }

        let (middles, trailing) = parse_params(input);

        Ok(ParsedLine {
            prefix,
            command,
            middles,
            trailing,
        })
    }
}
