// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version string handling. */

use {
    crate::error::{CopyrightError, Result},
    std::{
        fmt::{Display, Formatter},
        str::FromStr,
    },
};

/// A Debian package version.
///
/// The format is `[epoch:]upstream_version[-debian_revision]`. The semantics are defined at
/// <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.
///
/// Only parsing and formatting are implemented. Copyright validation just needs to know
/// whether a package carries a Debian revision.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PackageVersion {
    epoch: Option<u32>,
    upstream_version: String,
    debian_revision: Option<String>,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch, remainder) = match s.split_once(':') {
            Some((epoch, remainder)) => {
                if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
                    return Err(CopyrightError::EpochNonNumeric(s.to_string()));
                }

                (Some(u32::from_str(epoch)?), remainder)
            }
            None => (None, s),
        };

        let (upstream, revision) = match remainder.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, Some(revision)),
            None => (remainder, None),
        };

        let upstream_legal = |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~') || (c == '-' && revision.is_some())
        };
        if upstream.is_empty() || !upstream.chars().all(upstream_legal) {
            return Err(CopyrightError::UpstreamVersionIllegalChar(s.to_string()));
        }

        if let Some(revision) = revision {
            if revision.is_empty()
                || !revision
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '~'))
            {
                return Err(CopyrightError::DebianRevisionIllegalChar(s.to_string()));
            }
        }

        Ok(Self {
            epoch,
            upstream_version: upstream.to_string(),
            debian_revision: revision.map(|r| r.to_string()),
        })
    }

    /// The `epoch` component of the version string, if present.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// The `upstream_version` component of the version string.
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// The `debian_revision` component of the version string.
    ///
    /// Absent for native packages.
    pub fn debian_revision(&self) -> Option<&str> {
        self.debian_revision.as_deref()
    }

    /// Whether this is the version of a native package.
    ///
    /// Native packages are developed within Debian and have no separate upstream, so their
    /// version lacks a Debian revision.
    pub fn is_native(&self) -> bool {
        self.debian_revision.is_none()
    }
}

impl FromStr for PackageVersion {
    type Err = CopyrightError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        f.write_str(&self.upstream_version)?;

        if let Some(revision) = &self.debian_revision {
            write!(f, "-{}", revision)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse() -> Result<()> {
        assert_eq!(
            PackageVersion::parse("1:4.7.0+dfsg1-2")?,
            PackageVersion {
                epoch: Some(1),
                upstream_version: "4.7.0+dfsg1".into(),
                debian_revision: Some("2".into()),
            }
        );
        assert_eq!(
            PackageVersion::parse("0.18.0+dfsg-2+b1")?,
            PackageVersion {
                epoch: None,
                upstream_version: "0.18.0+dfsg".into(),
                debian_revision: Some("2+b1".into())
            }
        );
        assert_eq!(
            PackageVersion::parse("2.6.1-rc1-3")?.upstream_version(),
            "2.6.1-rc1"
        );

        Ok(())
    }

    #[test]
    fn native() -> Result<()> {
        assert!(PackageVersion::parse("1.2.3")?.is_native());
        assert!(PackageVersion::parse("1:20220101")?.is_native());
        assert!(!PackageVersion::parse("1.2.3-1")?.is_native());
        assert_eq!(PackageVersion::parse("1.2.3-1ubuntu2")?.debian_revision(), Some("1ubuntu2"));

        Ok(())
    }

    #[test]
    fn invalid() {
        assert!(matches!(
            PackageVersion::parse("a:1.0"),
            Err(CopyrightError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0_beta"),
            Err(CopyrightError::UpstreamVersionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-a_b"),
            Err(CopyrightError::DebianRevisionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-"),
            Err(CopyrightError::DebianRevisionIllegalChar(_))
        ));
    }

    #[test]
    fn format() -> Result<()> {
        for s in ["1:4.7.0+dfsg1-2", "3.3.2.final~github", "0.18.0+dfsg-2+b1"] {
            let v = s.parse::<PackageVersion>()?;
            assert_eq!(format!("{}", v), s);
        }

        Ok(())
    }
}
