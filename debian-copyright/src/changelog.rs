// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading the version of a package from `debian/changelog`.

See https://www.debian.org/doc/debian-policy/ch-source.html#debian-changelog-debian-changelog
for the specification. Only the header line of entries is parsed:

```text
package (version) distribution(s); urgency=urgency
```
*/

use {
    crate::{
        error::{CopyrightError, Result},
        package_version::PackageVersion,
    },
    once_cell::sync::Lazy,
    regex::Regex,
};

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<package>[a-z0-9][a-z0-9.+-]*) \((?P<version>[^()\s]+)\)(?P<distributions>(?:\s+[^;\s]+)*)\s*;(?P<options>.*)$")
        .unwrap()
});

/// The header line of a changelog entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangelogHeader {
    pub package: String,
    pub version: PackageVersion,
    pub distributions: Vec<String>,
    pub urgency: Option<String>,
}

impl ChangelogHeader {
    /// Parse an entry header line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        let captures = HEADER
            .captures(line)
            .ok_or_else(|| CopyrightError::ChangelogMalformedHeader(line.to_string()))?;

        let urgency = captures["options"]
            .split(',')
            .filter_map(|option| option.trim().split_once('='))
            .find(|(key, _)| key.eq_ignore_ascii_case("urgency"))
            .map(|(_, value)| value.to_string());

        Ok(Self {
            package: captures["package"].to_string(),
            version: PackageVersion::parse(&captures["version"])?,
            distributions: captures["distributions"]
                .split_whitespace()
                .map(|s| s.to_string())
                .collect(),
            urgency,
        })
    }
}

/// Obtain the header of the most recent entry in changelog text.
pub fn latest_entry(text: &str) -> Result<ChangelogHeader> {
    let line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(CopyrightError::ChangelogEmpty)?;

    ChangelogHeader::parse(line)
}

/// Obtain the package version of the most recent entry in changelog text.
pub fn latest_version(text: &str) -> Result<PackageVersion> {
    Ok(latest_entry(text)?.version)
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    #[test]
    fn parse_header() -> Result<()> {
        let header = ChangelogHeader::parse("hello (2.10-3) unstable experimental; urgency=medium\n")?;
        assert_eq!(header.package, "hello");
        assert_eq!(header.version, PackageVersion::parse("2.10-3")?);
        assert_eq!(header.distributions, vec!["unstable", "experimental"]);
        assert_eq!(header.urgency.as_deref(), Some("medium"));

        let header = ChangelogHeader::parse("dpkg (1.21.1) unstable; urgency=low, binary-only=yes")?;
        assert!(header.version.is_native());
        assert_eq!(header.urgency.as_deref(), Some("low"));

        assert!(matches!(
            ChangelogHeader::parse("  * Fix the thing."),
            Err(CopyrightError::ChangelogMalformedHeader(_))
        ));

        Ok(())
    }

    #[test]
    fn latest() -> Result<()> {
        let text = indoc! {"

            hello (2.10-3) unstable; urgency=medium

              * New packaging.

             -- Jane Doe <jane@example.com>  Sun, 01 Jan 2023 00:00:00 +0000

            hello (2.10-2) unstable; urgency=low

              * Older packaging.

             -- Jane Doe <jane@example.com>  Sat, 01 Jan 2022 00:00:00 +0000
        "};

        assert_eq!(latest_version(text)?.to_string(), "2.10-3");
        assert!(matches!(latest_version("\n\n"), Err(CopyrightError::ChangelogEmpty)));

        Ok(())
    }
}
