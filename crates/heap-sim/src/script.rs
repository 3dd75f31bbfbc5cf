//! Allocation script parser.
//!
//! A script holds one command per line. Blank lines and everything after a
//! `#` are ignored.
//!
//! ```text
//! alloc NAME BYTES    allocate BYTES bytes and bind the result to NAME
//! free NAME           free the allocation bound to NAME
//! free null           free the null pointer
//! fill NAME BYTE      set every payload byte of NAME to BYTE
//! check NAME BYTE     fail unless every payload byte of NAME is BYTE
//! report              print the free total
//! blocks              print the free list
//! ```
//!
//! Numbers are decimal, or hexadecimal with a `0x` prefix.

use std::num::ParseIntError;

use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};

/// Name that stands for the null pointer in `free`.
pub(crate) const NULL_NAME: &str = "null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Alloc { name: String, bytes: usize },
    Free { name: Option<String> },
    Fill { name: String, byte: u8 },
    Check { name: String, byte: u8 },
    Report,
    Blocks,
}

/// A command together with the line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub(crate) number: usize,
    pub(crate) command: Command,
}

#[derive(Debug, Snafu)]
pub(crate) enum ParseError {
    #[snafu(display("line {line}: unknown command `{command}`"))]
    UnknownCommand { line: usize, command: String },
    #[snafu(display("line {line}: `{command}` needs {argument}"))]
    MissingArgument {
        line: usize,
        command: &'static str,
        argument: &'static str,
    },
    #[snafu(display("line {line}: unexpected argument `{argument}`"))]
    ExtraArgument { line: usize, argument: String },
    #[snafu(display("line {line}: invalid number `{value}`"))]
    InvalidNumber {
        line: usize,
        value: String,
        source: ParseIntError,
    },
    #[snafu(display("line {line}: `{NULL_NAME}` cannot name an allocation"))]
    NullName { line: usize },
}

/// Parses a whole script.
pub(crate) fn parse(source: &str) -> Result<Vec<Line>, ParseError> {
    let mut lines = vec![];
    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        if let Some(command) = parse_line(number, text)? {
            lines.push(Line { number, command });
        }
    }
    Ok(lines)
}

fn parse_line(line: usize, text: &str) -> Result<Option<Command>, ParseError> {
    let text = text.split_once('#').map_or(text, |(code, _comment)| code);
    let mut words = text.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let command = match command {
        "alloc" => {
            let name = next_name(line, "alloc", &mut words)?;
            let bytes = next_number(
                line,
                "alloc",
                "a byte count",
                &mut words,
                usize::from_str_radix,
            )?;
            Command::Alloc { name, bytes }
        }
        "free" => {
            let name = words.next().context(MissingArgumentSnafu {
                line,
                command: "free",
                argument: "a name",
            })?;
            let name = (name != NULL_NAME).then(|| name.to_owned());
            Command::Free { name }
        }
        "fill" => {
            let name = next_name(line, "fill", &mut words)?;
            let byte = next_number(
                line,
                "fill",
                "a byte value",
                &mut words,
                u8::from_str_radix,
            )?;
            Command::Fill { name, byte }
        }
        "check" => {
            let name = next_name(line, "check", &mut words)?;
            let byte = next_number(
                line,
                "check",
                "a byte value",
                &mut words,
                u8::from_str_radix,
            )?;
            Command::Check { name, byte }
        }
        "report" => Command::Report,
        "blocks" => Command::Blocks,
        _ => {
            return UnknownCommandSnafu { line, command }.fail();
        }
    };

    if let Some(argument) = words.next() {
        return ExtraArgumentSnafu { line, argument }.fail();
    }
    Ok(Some(command))
}

fn next_name<'a>(
    line: usize,
    command: &'static str,
    words: &mut impl Iterator<Item = &'a str>,
) -> Result<String, ParseError> {
    let name = words.next().context(MissingArgumentSnafu {
        line,
        command,
        argument: "a name",
    })?;
    ensure!(name != NULL_NAME, NullNameSnafu { line });
    Ok(name.to_owned())
}

fn next_number<'a, T>(
    line: usize,
    command: &'static str,
    argument: &'static str,
    words: &mut impl Iterator<Item = &'a str>,
    from_str_radix: fn(&str, u32) -> Result<T, ParseIntError>,
) -> Result<T, ParseError> {
    let value = words.next().context(MissingArgumentSnafu {
        line,
        command,
        argument,
    })?;
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => from_str_radix(hex, 16),
        None => from_str_radix(value, 10),
    };
    parsed.context(InvalidNumberSnafu { line, value })
}
