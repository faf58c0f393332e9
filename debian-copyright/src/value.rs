// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Decoding of field values.

A parsed block keeps its value as raw *primary* chunks: the remainder of the head line
after the colon followed by any continuation lines, all with their line terminators.
The functions in this module turn those chunks into typed values. They correspond to
the field value flavors described in the DEP-5 specification:
*single-line values*, *white space separated lists*, *line based lists* and
*formatted text*.
*/

use crate::{
    control::is_continuation,
    error::{CopyrightError, Result},
};

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Decode a single-line value.
pub fn single(lines: &[&str]) -> Result<String> {
    match lines {
        [line] => Ok(line.trim().to_string()),
        _ => Err(CopyrightError::ValueNotSingleLine(lines.len())),
    }
}

/// Decode a whitespace separated list of words.
pub fn words(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|word| word.to_string())
        .collect()
}

/// Decode a line based list.
///
/// Lines are trimmed and empty lines dropped.
pub fn list(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}

/// Decode formatted text.
///
/// Every line must be a continuation line. The first whitespace character is removed
/// and a line consisting of a lone `.` stands for an empty line.
pub fn text(lines: &[&str]) -> Result<Vec<String>> {
    lines
        .iter()
        .map(|line| {
            if !is_continuation(line) {
                return Err(CopyrightError::ControlMalformedContinuation(
                    line.to_string(),
                ));
            }

            let mut chars = line.chars();
            chars.next();
            let line = strip_terminator(chars.as_str());

            Ok(if line == "." {
                String::new()
            } else {
                line.to_string()
            })
        })
        .collect()
}

/// Decode a synopsis line followed by formatted text.
///
/// This is the shape of `License` fields: the remainder of the head line is the synopsis
/// and the continuation lines hold the license text.
pub fn text_synopsis(lines: &[&str]) -> Result<(String, Vec<String>)> {
    let (synopsis, rest) = lines
        .split_first()
        .ok_or(CopyrightError::ValueMissingSynopsis)?;

    Ok((synopsis.trim().to_string(), text(rest)?))
}

/// Whether decoded text has any non-whitespace content.
pub fn has_text(text: &[String]) -> bool {
    text.iter().any(|line| !line.trim().is_empty())
}
