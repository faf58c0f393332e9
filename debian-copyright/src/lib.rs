// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Machine-readable Debian copyright files.

This crate parses and validates `debian/copyright` files written in the
[DEP-5](https://www.debian.org/doc/packaging-manuals/copyright-format/1.0/) format.

# Goals

## Exact Round-Tripping

Parsing never loses information. Comments, blank lines, key spelling and
line terminators are all retained, so a parsed file writes back out byte for byte.
Tools can therefore inspect or edit a copyright file without reformatting it.

## Strict Validation

A copyright file is only useful if it is consistent. Structural problems (malformed
continuation lines, missing required fields, illegal glob patterns) and semantic
problems (licenses referenced without any full text) are errors. Problems that are
legal but likely mistakes are reported as advisories.

# A Tour of Functionality

Low-level control file parsing lives in the [control] module. Text is parsed into a
tree of [control::Node] according to a [control::Grammar]. [value] decodes the raw
value chunks of a node into single-line values, lists and formatted text.

License synopses like `GPL-2+ or Artistic-2.0, and BSD-3-clause` are parsed by the
[license] module into [license::LicenseExpr], which can decide whether a set of
declared licenses covers the expression.

`Files` paragraphs select files with the glob dialect implemented in [glob].

[copyright::CopyrightFile] ties everything together: it parses a copyright file,
validates it and answers questions like which paragraph applies to a path.

Validation of non-native packages needs the package version. [package_version]
parses Debian version strings and [changelog] reads the latest version from a
`debian/changelog` file.
*/

pub mod changelog;
pub mod control;
pub mod copyright;
pub mod error;
pub mod glob;
pub mod license;
pub mod package_version;
pub mod value;
