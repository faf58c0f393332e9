// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum CopyrightError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("integer parsing error: {0:?}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("continuation does not start with whitespace: {0:?}")]
    ControlMalformedContinuation(String),

    #[error("block must not start with an indented line: {0:?}")]
    ControlIndentedHead(String),

    #[error("error parsing line {0:?}; missing colon")]
    ControlMissingColon(String),

    #[error("unexpected head '{actual}', should be '{expected}'")]
    ControlUnexpectedHead {
        expected: &'static str,
        actual: String,
    },

    #[error("minimum expected count {minimum} for {key} not reached: {actual}")]
    ControlKeyBelowMinimum {
        key: &'static str,
        minimum: usize,
        actual: usize,
    },

    #[error("maximum allowed count {maximum} for {key} exceeded: {actual}")]
    ControlKeyAboveMaximum {
        key: &'static str,
        maximum: usize,
        actual: usize,
    },

    #[error("no grammar for block with key '{0}'")]
    ControlUnknownKey(String),

    #[error("expected a single line value; got {0} lines")]
    ValueNotSingleLine(usize),

    #[error("field '{0}' must be a single line value")]
    FieldNotSingleLine(&'static str),

    #[error("field value lacks a synopsis line")]
    ValueMissingSynopsis,

    #[error("can only escape [\\*?] in glob pattern: {0}")]
    GlobIllegalEscape(char),

    #[error("glob pattern ends with a dangling escape: {0}")]
    GlobTrailingEscape(String),

    #[error("need license to match-exact: {0}")]
    LicenseExactUnmatched(String),

    #[error("no matched specs: {0}")]
    LicenseDeclaredUnmatched(String),

    #[error("no matching licenses: {0}")]
    LicensePlusUnmatched(String),

    #[error("can only specify non-compound License paragraphs: {0}")]
    CopyrightCompoundStandaloneLicense(String),

    #[error("License in Files/Format paragraph with neither full text nor License paragraph: {0}")]
    CopyrightUndocumentedLicense(String),

    #[error("the epoch component has non-digit characters: {0}")]
    EpochNonNumeric(String),

    #[error("upstream_version component has illegal character: {0}")]
    UpstreamVersionIllegalChar(String),

    #[error("debian_revision component has illegal character: {0}")]
    DebianRevisionIllegalChar(String),

    #[error("malformed changelog header: {0:?}")]
    ChangelogMalformedHeader(String),

    #[error("changelog has no entries")]
    ChangelogEmpty,
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, CopyrightError>;
