// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! License synopsis expressions.

`License` fields in copyright files start with a *synopsis*: a short name like
`GPL-2+` or a natural language combination like `GPL-2+ or Artistic-2.0, and BSD`.
This module parses synopses into [LicenseExpr] trees and decides whether a set of
declared licenses covers an expression.

Coverage works by turning an expression into its *covering sets* ([LicenseExpr::combo]).
Each covering set is a set of terms whose joint declaration licenses the whole
expression. An expression is covered when any one covering set is satisfied.
*/

use {
    crate::error::{CopyrightError, Result},
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        collections::BTreeSet,
        fmt::{Display, Formatter},
        sync::atomic::{AtomicU64, Ordering},
    },
};

/// Separators in order of priority. The first one present in a synopsis wins.
static SEPARATORS: Lazy<[(Regex, Combinator); 4]> = Lazy::new(|| {
    [
        (Regex::new(r",\s*or\b").unwrap(), Combinator::Or),
        (Regex::new(r",\s*and\b").unwrap(), Combinator::And),
        (Regex::new(r"\bor\b").unwrap(), Combinator::Or),
        (Regex::new(r"\band\b").unwrap(), Combinator::And),
    ]
});

static ANONYMOUS_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug)]
enum Combinator {
    And,
    Or,
}

/// The name of a license.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LicenseName {
    /// A name as written in a synopsis.
    Named(String),

    /// Stand-in for an empty synopsis.
    ///
    /// Every instance is distinct, so it can never be matched by a declared license.
    Anonymous(u64),
}

impl LicenseName {
    fn anonymous() -> Self {
        Self::Anonymous(ANONYMOUS_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for LicenseName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Anonymous(id) => write!(f, "_anon{}", id),
        }
    }
}

/// A license version as a sequence of integers.
///
/// Trailing zero components are dropped so `2.0` and `2` compare equal. Ordering is
/// lexicographic over the components, so `2.1 > 2` and `10 > 9`.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LicenseVersion(Vec<u64>);

impl LicenseVersion {
    /// Parse a dotted version string.
    ///
    /// An empty string yields the empty version.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }

        let mut parts = s
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        while parts.last() == Some(&0) {
            parts.pop();
        }

        Ok(Self(parts))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl Display for LicenseVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts = self.0.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        f.write_str(&parts.join("."))
    }
}

/// A declared license: a name and a version.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct License {
    name: LicenseName,
    version: LicenseVersion,
}

impl License {
    pub fn new(name: impl ToString, version: LicenseVersion) -> Self {
        Self {
            name: LicenseName::Named(name.to_string()),
            version,
        }
    }

    /// Parse a license short name like `GPL-2` or `BSD-3-clause`.
    ///
    /// A trailing `+` is ignored: the result is the base of the parsed term.
    pub fn parse(s: &str) -> Self {
        LicenseTerm::parse(s).base().clone()
    }

    pub fn name(&self) -> &LicenseName {
        &self.name
    }

    pub fn version(&self) -> &LicenseVersion {
        &self.version
    }
}

impl Display for License {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}-{}", self.name, self.version)
        }
    }
}

/// An atomic license reference in a synopsis.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LicenseTerm {
    license: License,
    /// Whether later versions of the license are also acceptable.
    plus: bool,
}

impl LicenseTerm {
    /// Parse a term like `GPL-2+`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self {
                license: License {
                    name: LicenseName::anonymous(),
                    version: LicenseVersion::default(),
                },
                plus: false,
            };
        }

        let (s, plus) = match s.strip_suffix('+') {
            Some(stripped) => (stripped, true),
            None => (s, false),
        };

        // Names such as `BSD-3-clause` contain hyphens that don't introduce a version.
        let license = match s.rsplit_once('-') {
            Some((name, version)) => match LicenseVersion::parse(version) {
                Ok(version) => License::new(name, version),
                Err(_) => License::new(s, LicenseVersion::default()),
            },
            None => License::new(s, LicenseVersion::default()),
        };

        Self { license, plus }
    }

    /// The declared license this term refers to, ignoring `plus`.
    pub fn base(&self) -> &License {
        &self.license
    }

    pub fn plus(&self) -> bool {
        self.plus
    }

    /// Whether a declared license satisfies this term.
    pub fn matched_by(&self, license: &License) -> bool {
        self.license.name == license.name
            && if self.plus {
                self.license.version <= license.version
            } else {
                self.license.version == license.version
            }
    }
}

impl Display for LicenseTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.license, if self.plus { "+" } else { "" })
    }
}

/// A parsed license synopsis.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LicenseExpr {
    /// A single license reference.
    Term(LicenseTerm),
    /// All parts apply.
    And(Vec<LicenseExpr>),
    /// Any one part suffices.
    Or(Vec<LicenseExpr>),
}

impl LicenseExpr {
    /// Parse a synopsis.
    ///
    /// Separators are tried in the order `, or`, `, and`, `or`, `and`. The first one found
    /// splits the whole string and each part is parsed recursively. So `A, and B or C` means
    /// `A and (B or C)` while `A and B or C` means `(A and B) or C`.
    pub fn parse(s: &str) -> Self {
        for (regex, combinator) in SEPARATORS.iter() {
            if regex.is_match(s) {
                let parts = regex.split(s).map(Self::parse).collect::<Vec<_>>();

                return match combinator {
                    Combinator::And => Self::And(parts),
                    Combinator::Or => Self::Or(parts),
                };
            }
        }

        Self::Term(LicenseTerm::parse(s))
    }

    /// Whether this expression is a single term.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Term(_))
    }

    /// The base license of a single term expression.
    pub fn base(&self) -> Option<&License> {
        match self {
            Self::Term(term) => Some(term.base()),
            _ => None,
        }
    }

    /// All licenses referenced by this expression.
    pub fn leaves(&self) -> BTreeSet<License> {
        match self {
            Self::Term(term) => BTreeSet::from([term.base().clone()]),
            Self::And(parts) | Self::Or(parts) => {
                parts.iter().flat_map(|part| part.leaves()).collect()
            }
        }
    }

    /// All valid covering sets of this expression.
    ///
    /// For `and`, every combination of one covering set per part, unioned. For `or`, the
    /// covering sets of every part.
    pub fn combo(&self) -> BTreeSet<BTreeSet<LicenseTerm>> {
        match self {
            Self::Term(term) => BTreeSet::from([BTreeSet::from([term.clone()])]),
            Self::Or(parts) => parts.iter().flat_map(|part| part.combo()).collect(),
            Self::And(parts) => {
                parts
                    .iter()
                    .fold(BTreeSet::from([BTreeSet::new()]), |acc, part| {
                        let combos = part.combo();

                        acc.iter()
                            .flat_map(|prefix| {
                                combos
                                    .iter()
                                    .map(move |combo| prefix.union(combo).cloned().collect())
                            })
                            .collect()
                    })
            }
        }
    }

    /// Whether the declared licenses cover this expression.
    pub fn covered_by(&self, declared: &[License]) -> bool {
        let declared = declared.iter().cloned().collect::<BTreeSet<_>>();

        self.combo()
            .iter()
            .any(|terms| matches!(covered_by_specs(terms, &declared, false), Ok(true)))
    }
}

impl Display for LicenseExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (parts, separator) = match self {
            Self::Term(term) => return write!(f, "{}", term),
            Self::And(parts) => (parts, " and "),
            Self::Or(parts) => (parts, " or "),
        };

        let parts = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        write!(f, "({})", parts.join(separator))
    }
}

/// Check that declared licenses cover exactly a set of required terms.
///
/// Every term without `plus` needs an equal declared license. Every declared license not
/// consumed that way must match some `plus` term. Every `plus` term must be matched by some
/// declared license.
///
/// With `raise_reason`, a failed check is an error naming the unmatched terms. Otherwise it
/// is `Ok(false)`.
pub fn covered_by_specs(
    required: &BTreeSet<LicenseTerm>,
    declared: &BTreeSet<License>,
    raise_reason: bool,
) -> Result<bool> {
    match coverage_failure(required, declared) {
        None => Ok(true),
        Some(err) if raise_reason => Err(err),
        Some(_) => Ok(false),
    }
}

fn coverage_failure(
    required: &BTreeSet<LicenseTerm>,
    declared: &BTreeSet<License>,
) -> Option<CopyrightError> {
    let exact: BTreeSet<&License> = required
        .iter()
        .filter(|term| !term.plus)
        .map(LicenseTerm::base)
        .collect();
    let plus: Vec<&LicenseTerm> = required.iter().filter(|term| term.plus).collect();

    let missing: Vec<&License> = exact
        .iter()
        .copied()
        .filter(|license| !declared.contains(*license))
        .collect();
    if !missing.is_empty() {
        return Some(CopyrightError::LicenseExactUnmatched(join(missing)));
    }

    let unmatched = declared
        .iter()
        .filter(|license| !exact.contains(license))
        .filter(|license| !plus.iter().any(|term| term.matched_by(license)))
        .collect::<Vec<_>>();
    if !unmatched.is_empty() {
        return Some(CopyrightError::LicenseDeclaredUnmatched(join(unmatched)));
    }

    let unsatisfied = plus
        .iter()
        .filter(|term| !declared.iter().any(|license| term.matched_by(license)))
        .collect::<Vec<_>>();
    if !unsatisfied.is_empty() {
        return Some(CopyrightError::LicensePlusUnmatched(join(unsatisfied)));
    }

    None
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    fn licenses(names: &[&str]) -> Vec<License> {
        names.iter().map(|s| License::parse(s)).collect()
    }

    #[test]
    fn parse_term() -> Result<()> {
        let term = LicenseTerm::parse(" GPL-2.0+ ");
        assert!(term.plus());
        assert_eq!(term.base(), &License::new("GPL", LicenseVersion::parse("2")?));
        assert_eq!(term.to_string(), "GPL-2+");

        let term = LicenseTerm::parse("BSD-3-clause");
        assert!(!term.plus());
        assert_eq!(
            term.base().name(),
            &LicenseName::Named("BSD-3-clause".into())
        );
        assert!(term.base().version().is_empty());

        let term = LicenseTerm::parse("Expat");
        assert_eq!(term.base(), &License::new("Expat", LicenseVersion::default()));

        let term = LicenseTerm::parse("LGPL-2.1");
        assert_eq!(term.base().version().components(), &[2, 1]);

        Ok(())
    }

    #[test]
    fn empty_terms_are_unique() {
        let a = LicenseTerm::parse("");
        let b = LicenseTerm::parse("   ");
        assert_ne!(a, b);
        assert!(!a.matched_by(b.base()));
        assert!(matches!(a.base().name(), LicenseName::Anonymous(_)));
    }

    #[test]
    fn version_ordering() -> Result<()> {
        assert!(LicenseVersion::parse("2.1")? > LicenseVersion::parse("2")?);
        assert_eq!(LicenseVersion::parse("2.0")?, LicenseVersion::parse("2")?);
        assert!(LicenseVersion::parse("10")? > LicenseVersion::parse("9.9")?);
        assert!(LicenseVersion::parse("0.0")?.is_empty());
        assert!(LicenseVersion::parse("x").is_err());

        Ok(())
    }

    #[test]
    fn parse_separator_priority() {
        let expr = LicenseExpr::parse("GPL-2+ or Artistic-2.0, and BSD");
        assert_eq!(expr.to_string(), "((GPL-2+ or Artistic-2) and BSD)");

        let expr = LicenseExpr::parse("A and B or C");
        assert_eq!(expr.to_string(), "((A and B) or C)");

        let expr = LicenseExpr::parse("A, and B or C");
        assert_eq!(expr.to_string(), "(A and (B or C))");

        let expr = LicenseExpr::parse("A and B, or C");
        assert_eq!(expr.to_string(), "((A and B) or C)");

        let expr = LicenseExpr::parse("MPL-2.0");
        assert!(expr.is_leaf());
        assert_eq!(expr.base(), Some(&License::parse("MPL-2")));
    }

    #[test]
    fn leaves() {
        let expr = LicenseExpr::parse("GPL-2+ or GPL-2, and BSD");
        assert!(!expr.is_leaf());
        assert_eq!(expr.base(), None);
        assert_eq!(
            expr.leaves().into_iter().collect::<Vec<_>>(),
            licenses(&["BSD", "GPL-2"])
        );
    }

    #[test]
    fn combo() {
        let expr = LicenseExpr::parse("GPL-2+ or Artistic-2.0, and BSD");
        let combos = expr
            .combo()
            .into_iter()
            .map(|terms| {
                terms
                    .into_iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<BTreeSet<_>>();

        assert_eq!(
            combos,
            BTreeSet::from(["Artistic-2 BSD".to_string(), "BSD GPL-2+".to_string()])
        );

        let expr = LicenseExpr::parse("A or B and C or D");
        assert_eq!(expr.combo().len(), 3);
    }

    #[test]
    fn coverage() {
        let expr = LicenseExpr::parse("GPL-2+ or Artistic-2.0, and BSD");
        assert!(expr.covered_by(&licenses(&["GPL-2", "BSD"])));
        assert!(expr.covered_by(&licenses(&["GPL-3", "BSD"])));
        assert!(expr.covered_by(&licenses(&["Artistic-2", "BSD"])));
        assert!(!expr.covered_by(&licenses(&["GPL-2"])));
        assert!(!expr.covered_by(&licenses(&["GPL-2", "BSD", "MIT"])));

        let expr = LicenseExpr::parse("GPL-2 and GPL-3");
        assert!(!expr.covered_by(&licenses(&["GPL-2"])));
        assert!(expr.covered_by(&licenses(&["GPL-2", "GPL-3"])));

        let expr = LicenseExpr::parse("GPL-2+");
        assert!(expr.covered_by(&licenses(&["GPL-3"])));
        assert!(expr.covered_by(&licenses(&["GPL-2", "GPL-3"])));
        assert!(!expr.covered_by(&licenses(&["GPL-1"])));
        assert!(!expr.covered_by(&[]));

        let expr = LicenseExpr::parse("GPL-2.0");
        assert!(expr.covered_by(&licenses(&["GPL-2"])));
        assert!(!expr.covered_by(&licenses(&["GPL-2.1"])));
    }

    #[test]
    fn coverage_reasons() -> Result<()> {
        let declared = licenses(&["GPL-2"]).into_iter().collect::<BTreeSet<_>>();

        let required = BTreeSet::from([LicenseTerm::parse("GPL-3")]);
        assert!(!covered_by_specs(&required, &declared, false)?);
        assert!(matches!(
            covered_by_specs(&required, &declared, true),
            Err(CopyrightError::LicenseExactUnmatched(s)) if s == "GPL-3"
        ));

        let required = BTreeSet::from([LicenseTerm::parse("GPL-3+")]);
        assert!(matches!(
            covered_by_specs(&required, &declared, true),
            Err(CopyrightError::LicenseDeclaredUnmatched(s)) if s == "GPL-2"
        ));

        let required = BTreeSet::from([LicenseTerm::parse("GPL-2"), LicenseTerm::parse("BSD+")]);
        assert!(matches!(
            covered_by_specs(&required, &declared, true),
            Err(CopyrightError::LicensePlusUnmatched(s)) if s == "BSD+"
        ));

        let required = BTreeSet::from([LicenseTerm::parse("GPL-2"), LicenseTerm::parse("GPL-1+")]);
        assert!(covered_by_specs(&required, &declared, true)?);

        Ok(())
    }
}
