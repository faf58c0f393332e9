// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Machine-readable `debian/copyright` files.

Specified at <https://www.debian.org/doc/packaging-manuals/copyright-format/1.0/>.

A copyright file is a control file whose first paragraph is the *header* (starting
with a `Format` field), followed by any number of *Files* paragraphs and stand-alone
*License* paragraphs. [CopyrightFile] parses such a file, validates it and provides
typed access to its paragraphs while preserving the original text exactly.
*/

use {
    crate::{
        control::{
            parse_str, Advisory, ControlDocument, ControlFileGrammar, Grammar, KeyConstraint,
            KeyIndex, Node, ParagraphGrammar,
        },
        error::{CopyrightError, Result},
        glob::GlobPattern,
        license::{License, LicenseExpr},
        package_version::PackageVersion,
        value,
    },
    log::{debug, warn},
    serde::Deserialize,
    std::{
        collections::BTreeMap,
        fmt::{Display, Formatter},
        io::Write,
    },
};

/// Path prefix of files maintained by Debian packagers.
pub const DEFAULT_PACKAGING_PREFIX: &str = "debian/";

const COMPOUND_TEXT_EXPLANATION: &str = "\
This is permitted by DEP-5, but full license texts are clearer when each license has its \
own License paragraph. Use the Comment field to clarify how the licenses are combined.";

const MULTIPLE_TEXT_EXPLANATION: &str = "\
This is permitted by DEP-5, but it is clearer to keep a single License paragraph per \
license. Use the Comment field to describe how each occurrence differs.";

const NON_NATIVE_EXPLANATION: &str = "\
Non-native packages usually have different upstream authors and Debian maintainers, so \
copyrights differ between the two sets of files. If that is not the case this can be \
ignored, but splitting the glob patterns keeps the file correct if it changes later.";

/// Settings influencing validation of copyright files.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ValidationSettings {
    /// Path prefix that packaging files live under.
    pub packaging_prefix: String,

    /// Version of the package the copyright file belongs to.
    #[serde(skip)]
    pub package_version: Option<PackageVersion>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            packaging_prefix: DEFAULT_PACKAGING_PREFIX.to_string(),
            package_version: None,
        }
    }
}

/// Grammar of DEP-5 copyright files.
///
/// Structure is enforced by the wrapped [ControlFileGrammar]. The copyright specific
/// rules run as a post-check on the root of the parsed tree.
#[derive(Clone, Debug)]
pub struct CopyrightGrammar {
    control: ControlFileGrammar,
    settings: ValidationSettings,
}

impl CopyrightGrammar {
    pub fn new(settings: ValidationSettings) -> Self {
        let control = ControlFileGrammar::new(
            KeyConstraint::default()
                .with_head("format")
                .with_minimum("format", 1)
                .with_maximum("format", 1),
        )
        .with_paragraph(
            "format",
            ParagraphGrammar::new(KeyConstraint::fields(
                &[],
                &[
                    "upstream-name",
                    "upstream-contact",
                    "source",
                    "disclaimer",
                    "comment",
                    "copyright",
                    "license",
                ],
            )),
        )
        .with_paragraph(
            "files",
            ParagraphGrammar::new(KeyConstraint::fields(
                &["copyright", "license"],
                &["comment"],
            )),
        )
        .with_paragraph(
            "license",
            ParagraphGrammar::new(KeyConstraint::fields(&[], &["location", "comment"])),
        );

        Self { control, settings }
    }
}

impl Grammar for CopyrightGrammar {
    fn is_extra(&self, chunk: &str, was_block: bool) -> bool {
        self.control.is_extra(chunk, was_block)
    }

    fn starts_block(&self, chunk: &str) -> Result<bool> {
        self.control.starts_block(chunk)
    }

    fn child_grammar(&self, key: &str) -> Option<&dyn Grammar> {
        self.control.child_grammar(key)
    }

    fn pre_check(&self, key: Option<&str>, primary: &[&str], index: &KeyIndex) -> Result<()> {
        self.control.pre_check(key, primary, index)
    }

    fn post_check(&self, node: &Node<'_>, advisories: &mut Vec<Advisory>) -> Result<()> {
        validate(node, &self.settings, advisories)
    }
}

fn single_field(node: &Node<'_>, key: &'static str) -> Option<Result<String>> {
    node.get(key).map(|field| {
        field
            .model(value::single)
            .map_err(|_| CopyrightError::FieldNotSingleLine(key))
    })
}

fn text_field(node: &Node<'_>, key: &str) -> Option<Result<Vec<String>>> {
    node.get(key).map(|field| field.model(value::text))
}

fn list_field(node: &Node<'_>, key: &str) -> Option<Vec<String>> {
    node.get(key).map(|field| field.model(value::list))
}

/// A `License` field value: a synopsis expression and optional full text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LicenseField {
    expression: LicenseExpr,
    text: Vec<String>,
}

impl LicenseField {
    /// Decode a license field from its primary chunks.
    pub fn from_primary(primary: &[&str]) -> Result<Self> {
        let (synopsis, text) = value::text_synopsis(primary)?;

        Ok(Self {
            expression: LicenseExpr::parse(&synopsis),
            text,
        })
    }

    pub fn expression(&self) -> &LicenseExpr {
        &self.expression
    }

    /// Lines of the full license text.
    pub fn text(&self) -> &[String] {
        &self.text
    }

    /// Whether the field carries full license text.
    pub fn has_text(&self) -> bool {
        value::has_text(&self.text)
    }
}

/// The header paragraph of a copyright file.
#[derive(Clone, Copy, Debug)]
pub struct HeaderParagraph<'n, 'a> {
    node: &'n Node<'a>,
}

impl<'n, 'a> HeaderParagraph<'n, 'a> {
    pub fn new(node: &'n Node<'a>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &'n Node<'a> {
        self.node
    }

    /// URI of the format specification the file follows.
    pub fn format(&self) -> Result<String> {
        self.node
            .model(value::single)
            .map_err(|_| CopyrightError::FieldNotSingleLine("format"))
    }

    pub fn upstream_name(&self) -> Option<Result<String>> {
        single_field(self.node, "upstream-name")
    }

    pub fn upstream_contact(&self) -> Option<Vec<String>> {
        list_field(self.node, "upstream-contact")
    }

    pub fn source(&self) -> Option<Result<Vec<String>>> {
        text_field(self.node, "source")
    }

    pub fn disclaimer(&self) -> Option<Result<Vec<String>>> {
        text_field(self.node, "disclaimer")
    }

    pub fn comment(&self) -> Option<Result<Vec<String>>> {
        text_field(self.node, "comment")
    }

    pub fn copyright(&self) -> Option<Vec<String>> {
        list_field(self.node, "copyright")
    }

    pub fn license(&self) -> Option<Result<LicenseField>> {
        self.node
            .get("license")
            .map(|field| field.model(LicenseField::from_primary))
    }
}

/// A `Files` paragraph.
#[derive(Clone, Copy, Debug)]
pub struct FilesParagraph<'n, 'a> {
    node: &'n Node<'a>,
}

impl<'n, 'a> FilesParagraph<'n, 'a> {
    pub fn new(node: &'n Node<'a>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &'n Node<'a> {
        self.node
    }

    /// Glob patterns as written.
    pub fn patterns(&self) -> Vec<String> {
        self.node.model(value::words)
    }

    /// Parsed glob patterns.
    pub fn globs(&self) -> Result<Vec<GlobPattern>> {
        self.patterns()
            .iter()
            .map(|pattern| GlobPattern::parse(pattern))
            .collect()
    }

    pub fn copyright(&self) -> Option<Vec<String>> {
        list_field(self.node, "copyright")
    }

    pub fn license(&self) -> Option<Result<LicenseField>> {
        self.node
            .get("license")
            .map(|field| field.model(LicenseField::from_primary))
    }

    pub fn comment(&self) -> Option<Result<Vec<String>>> {
        text_field(self.node, "comment")
    }
}

/// A stand-alone `License` paragraph.
#[derive(Clone, Copy, Debug)]
pub struct LicenseParagraph<'n, 'a> {
    node: &'n Node<'a>,
}

impl<'n, 'a> LicenseParagraph<'n, 'a> {
    pub fn new(node: &'n Node<'a>) -> Self {
        Self { node }
    }

    pub fn node(&self) -> &'n Node<'a> {
        self.node
    }

    pub fn license(&self) -> Result<LicenseField> {
        self.node.model(LicenseField::from_primary)
    }

    pub fn location(&self) -> Option<Result<String>> {
        single_field(self.node, "location")
    }

    pub fn comment(&self) -> Option<Result<Vec<String>>> {
        text_field(self.node, "comment")
    }
}

#[derive(Clone, Copy, Debug)]
struct LicenseReference {
    compound: bool,
    has_text: bool,
    standalone: bool,
}

fn advise(advisories: &mut Vec<Advisory>, summary: String, explanation: &'static str) {
    warn!("{}", summary);
    advisories.push(Advisory {
        summary,
        explanation,
    });
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_field_shapes(root: &Node<'_>) -> Result<()> {
    for header in root.get_all("format").map(HeaderParagraph::new) {
        header.format()?;
        header.upstream_name().transpose()?;
    }

    for files in root.get_all("files").map(FilesParagraph::new) {
        files.globs()?;
    }

    for license in root.get_all("license").map(LicenseParagraph::new) {
        license.location().transpose()?;
    }

    Ok(())
}

/// Validate the root of a parsed copyright file.
fn validate(
    root: &Node<'_>,
    settings: &ValidationSettings,
    advisories: &mut Vec<Advisory>,
) -> Result<()> {
    check_field_shapes(root)?;

    let mut references = BTreeMap::<License, Vec<LicenseReference>>::new();

    let inline = root
        .get_all("format")
        .filter_map(|node| HeaderParagraph::new(node).license())
        .chain(
            root.get_all("files")
                .filter_map(|node| FilesParagraph::new(node).license()),
        );

    for field in inline {
        let field = field?;
        let reference = LicenseReference {
            compound: !field.expression.is_leaf(),
            has_text: field.has_text(),
            standalone: false,
        };

        for leaf in field.expression.leaves() {
            references.entry(leaf).or_default().push(reference);
        }
    }

    for paragraph in root.get_all("license").map(LicenseParagraph::new) {
        let field = paragraph.license()?;
        let base = field.expression.base().ok_or_else(|| {
            CopyrightError::CopyrightCompoundStandaloneLicense(field.expression.to_string())
        })?;

        references
            .entry(base.clone())
            .or_default()
            .push(LicenseReference {
                compound: false,
                has_text: field.has_text(),
                standalone: true,
            });
    }

    let undocumented = references
        .iter()
        .filter(|(_, refs)| {
            refs.iter().any(|r| !r.standalone && !r.has_text)
                && !refs.iter().any(|r| r.standalone && r.has_text)
        })
        .map(|(license, _)| license)
        .collect::<Vec<_>>();
    if !undocumented.is_empty() {
        return Err(CopyrightError::CopyrightUndocumentedLicense(join(
            undocumented,
        )));
    }

    let compound_text = references
        .iter()
        .filter(|(_, refs)| refs.iter().any(|r| r.compound && !r.standalone && r.has_text))
        .map(|(license, _)| license)
        .collect::<Vec<_>>();
    if !compound_text.is_empty() {
        advise(
            advisories,
            format!(
                "Full text for compound License in Files/Format paragraph: {}",
                join(compound_text)
            ),
            COMPOUND_TEXT_EXPLANATION,
        );
    }

    let multiple_text = references
        .iter()
        .filter(|(_, refs)| refs.iter().filter(|r| r.has_text).count() > 1)
        .map(|(license, _)| license)
        .collect::<Vec<_>>();
    if !multiple_text.is_empty() {
        advise(
            advisories,
            format!("Licenses with multiple full texts: {}", join(multiple_text)),
            MULTIPLE_TEXT_EXPLANATION,
        );
    }

    if let Some(version) = &settings.package_version {
        let patterns = root
            .get_all("files")
            .flat_map(|node| FilesParagraph::new(node).patterns())
            .collect::<Vec<_>>();

        if !version.is_native()
            && !patterns
                .iter()
                .any(|pattern| pattern.starts_with(&settings.packaging_prefix))
        {
            advise(
                advisories,
                format!(
                    "Non-native package {} without {}[etc] glob: {}",
                    version,
                    settings.packaging_prefix,
                    join(patterns)
                ),
                NON_NATIVE_EXPLANATION,
            );
        }
    }

    Ok(())
}

/// A parsed and validated `debian/copyright` file.
#[derive(Clone, Debug)]
pub struct CopyrightFile<'a> {
    document: ControlDocument<'a>,
}

impl<'a> CopyrightFile<'a> {
    /// Parse and validate a copyright file with default settings.
    pub fn parse_str(text: &'a str) -> Result<Self> {
        Self::parse_str_with_settings(text, &ValidationSettings::default())
    }

    /// Parse and validate a copyright file.
    ///
    /// Structural errors and validation failures are returned as errors. Non-fatal
    /// findings are available via [Self::advisories].
    pub fn parse_str_with_settings(text: &'a str, settings: &ValidationSettings) -> Result<Self> {
        let grammar = CopyrightGrammar::new(settings.clone());

        Ok(Self {
            document: parse_str(text, &grammar)?,
        })
    }

    /// The root of the parsed tree.
    pub fn root(&self) -> &Node<'a> {
        self.document.root()
    }

    /// Non-fatal findings from validation.
    pub fn advisories(&self) -> &[Advisory] {
        self.document.advisories()
    }

    /// The header paragraph.
    pub fn header(&self) -> Option<HeaderParagraph<'_, 'a>> {
        self.root().get("format").map(HeaderParagraph::new)
    }

    /// `Files` paragraphs in declaration order.
    pub fn files_paragraphs(&self) -> impl DoubleEndedIterator<Item = FilesParagraph<'_, 'a>> {
        self.root().get_all("files").map(FilesParagraph::new)
    }

    /// Stand-alone `License` paragraphs in declaration order.
    pub fn license_paragraphs(
        &self,
    ) -> impl DoubleEndedIterator<Item = LicenseParagraph<'_, 'a>> {
        self.root().get_all("license").map(LicenseParagraph::new)
    }

    /// Find the `Files` paragraph that applies to a path.
    ///
    /// Later paragraphs take precedence over earlier ones, and within a paragraph later
    /// patterns over earlier ones.
    pub fn files_for_path(&self, path: &str) -> Result<Option<FilesParagraph<'_, 'a>>> {
        for paragraph in self.files_paragraphs().rev() {
            for glob in paragraph.globs()?.iter().rev() {
                if glob.matches(path) {
                    debug!("{} matched by pattern {}", path, glob);
                    return Ok(Some(paragraph));
                }
            }
        }

        debug!("{} not matched by any Files paragraph", path);
        Ok(None)
    }

    /// Find the full text of a license.
    ///
    /// Stand-alone `License` paragraphs are searched first, then single term `License`
    /// fields in the header and `Files` paragraphs. The last occurrence with text wins.
    pub fn full_text_for_license(&self, license: &License) -> Result<Option<Vec<String>>> {
        for paragraph in self.license_paragraphs().rev() {
            let field = paragraph.license()?;
            if field.expression.base() == Some(license) && field.has_text() {
                return Ok(Some(field.text));
            }
        }

        let inline = self
            .header()
            .and_then(|header| header.license())
            .into_iter()
            .chain(self.files_paragraphs().filter_map(|files| files.license()))
            .collect::<Result<Vec<_>>>()?;

        Ok(inline
            .into_iter()
            .rev()
            .find(|field| field.expression.base() == Some(license) && field.has_text())
            .map(|field| field.text))
    }

    /// Serialize the file to a writer, reproducing the parsed text.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.root().write(writer)
    }
}

impl<'a> Display for CopyrightFile<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.root().fmt(f)
    }
}
