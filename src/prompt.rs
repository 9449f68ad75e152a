//! Interactive collection of the date interval.
//!
//! Each answer is resolved as soon as it is read. An invalid answer or a
//! closed input stream ends the prompt with an error.

use crate::dates::{self, DateInterval, DATE_FORMAT};
use crate::error::Result;
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};

/// Asks for the start and end dates, once each.
pub fn prompt_interval<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    today: NaiveDate,
) -> Result<DateInterval> {
    writeln!(output, "📅 Enter the sprint start date")?;
    writeln!(output)?;
    let start = ask(
        input,
        output,
        "Start date (YYYY-MM-DD) or days back (e.g., '14'): ",
        |answer| dates::resolve_start(answer, today),
    )?;
    writeln!(output, "Using start date: {}", start.format(DATE_FORMAT))?;
    writeln!(output)?;

    writeln!(output, "📅 Enter the sprint end date")?;
    writeln!(output)?;
    let end = ask(
        input,
        output,
        "End date (YYYY-MM-DD) or press Enter for today: ",
        |answer| dates::resolve_end(answer, today),
    )?;
    writeln!(output, "Using end date: {}", end.format(DATE_FORMAT))?;
    writeln!(output)?;

    Ok(DateInterval::new(start, end))
}

fn ask<R, W, F>(input: &mut R, output: &mut W, question: &str, resolve: F) -> Result<NaiveDate>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> Result<NaiveDate>,
{
    write!(output, "{question}")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        let closed = io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before a date was entered",
        );
        return Err(closed.into());
    }

    resolve(&answer)
}
