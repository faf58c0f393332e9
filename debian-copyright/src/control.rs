// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Round-trip parsing of control files.

See <https://www.debian.org/doc/debian-policy/ch-controlfields.html>
for the canonical source of truth for how control files work.

Input text is handled as *chunks*: lines including their terminators. A *block* is a
run of chunks forming one key-value unit. Its head chunk holds `Key: value` and the
chunks that follow either continue the value or form nested blocks. Blank lines and
comments outside of blocks are *extras*.

Parsing produces a tree of [Node]. Nodes keep every chunk they were built from, so
writing a node reproduces its input byte for byte. How chunks are grouped at each level
of the tree is decided by a [Grammar]. Stock grammars for control files
([ControlFileGrammar]), their paragraphs ([ParagraphGrammar]) and field values
([LeafGrammar]) are provided.
*/

use {
    crate::error::{CopyrightError, Result},
    std::{
        borrow::Cow,
        collections::BTreeMap,
        fmt::{Display, Formatter},
        io::Write,
    },
};

/// Whether a chunk continues the value of the preceding line.
pub fn is_continuation(chunk: &str) -> bool {
    chunk.starts_with(|c: char| c.is_whitespace())
}

/// Whether a chunk is a comment line.
pub fn is_comment(chunk: &str) -> bool {
    chunk.starts_with('#')
}

fn is_blank(chunk: &str) -> bool {
    chunk.trim().is_empty()
}

/// A block split into its key, primary value and remaining body chunks.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Head<'a> {
    /// Key text as written. [None] for the synthetic root.
    pub key_str: Option<&'a str>,
    /// Value chunks of the head itself.
    pub primary: Vec<&'a str>,
    /// Everything after the head value.
    pub body: Vec<&'a str>,
}

/// How the head of a block is written.
///
/// This is the rule that splits a block into a [Head] and the inverse rule that joins a
/// [Head] back into chunks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeadSyntax {
    /// The whole input. No key and no primary value.
    Root,
    /// `Key: value` followed by continuation lines.
    Colon,
}

impl HeadSyntax {
    /// Split the chunks of a block.
    pub fn split_head<'a>(&self, block: Vec<&'a str>) -> Result<Head<'a>> {
        match self {
            Self::Root => Ok(Head {
                key_str: None,
                primary: vec![],
                body: block,
            }),
            Self::Colon => {
                let mut chunks = block.into_iter();
                let first = chunks.next().unwrap_or_default();

                if is_continuation(first) {
                    return Err(CopyrightError::ControlIndentedHead(first.to_string()));
                }

                let (key, value) = first
                    .split_once(':')
                    .ok_or_else(|| CopyrightError::ControlMissingColon(first.to_string()))?;

                let rest = chunks.collect::<Vec<_>>();
                let continued = rest.iter().take_while(|c| is_continuation(c)).count();

                let mut primary = vec![value];
                primary.extend_from_slice(&rest[..continued]);

                Ok(Head {
                    key_str: Some(key),
                    primary,
                    body: rest[continued..].to_vec(),
                })
            }
        }
    }

    /// Join a key, primary value and body back into chunks.
    pub fn join_head<'a>(
        &self,
        key_str: Option<&'a str>,
        primary: &[&'a str],
        body: Vec<Cow<'a, str>>,
    ) -> Vec<Cow<'a, str>> {
        match self {
            Self::Root => body,
            Self::Colon => {
                let mut chunks = Vec::with_capacity(primary.len() + body.len());

                match primary.split_first() {
                    Some((value, continued)) => {
                        chunks.push(Cow::Owned(format!("{}:{}", key_str.unwrap_or(""), value)));
                        chunks.extend(continued.iter().map(|c| Cow::Borrowed(*c)));
                    }
                    None => chunks.push(Cow::Owned(format!("{}:", key_str.unwrap_or("")))),
                }

                chunks.extend(body);
                chunks
            }
        }
    }
}

/// Positions of child blocks, grouped by key.
///
/// Keys may repeat. Positions for a key are kept in insertion order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyIndex {
    positions: BTreeMap<String, Vec<usize>>,
    len: usize,
}

impl KeyIndex {
    fn push(&mut self, key: String, position: usize) {
        self.positions.entry(key).or_default().push(position);
        self.len = self.len.max(position + 1);
    }

    /// Positions of children with the given key.
    pub fn positions(&self, key: &str) -> &[usize] {
        self.positions.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Number of children with the given key.
    pub fn count(&self, key: &str) -> usize {
        self.positions(key).len()
    }

    /// Child keys in child order.
    pub fn ordered_keys(&self) -> Vec<&str> {
        let mut keys = vec![""; self.len];

        for (key, positions) in &self.positions {
            for position in positions {
                keys[*position] = key.as_str();
            }
        }

        keys
    }

    /// Iterate over distinct keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(|k| k.as_str())
    }
}

/// A non-fatal finding raised while checking a parsed tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Advisory {
    /// What was found.
    pub summary: String,
    /// Why it matters and what to do about it.
    pub explanation: &'static str,
}

impl Display for Advisory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "W: {}\n : {}", self.summary, self.explanation)
    }
}

/// Rules for parsing one level of a block tree.
///
/// A grammar decides how the body chunks of a block are grouped into child blocks, which
/// grammar applies to each child and which structural checks apply.
pub trait Grammar {
    /// Whether `chunk` is not part of any block.
    ///
    /// `was_block` is true if the preceding chunk belonged to a block.
    fn is_extra(&self, chunk: &str, was_block: bool) -> bool;

    /// Whether `chunk` starts a new block while another block is open.
    fn starts_block(&self, chunk: &str) -> Result<bool>;

    /// The syntax of child block heads.
    fn head_syntax(&self) -> HeadSyntax {
        HeadSyntax::Colon
    }

    /// Normalize the key text of a child block.
    fn normalize_key(&self, key_str: &str) -> String {
        key_str.trim().to_lowercase()
    }

    /// The grammar for child blocks having `key`.
    fn child_grammar(&self, key: &str) -> Option<&dyn Grammar>;

    /// Check block structure before children are parsed.
    fn pre_check(&self, _key: Option<&str>, _primary: &[&str], _index: &KeyIndex) -> Result<()> {
        Ok(())
    }

    /// Check a fully parsed node.
    fn post_check(&self, _node: &Node<'_>, _advisories: &mut Vec<Advisory>) -> Result<()> {
        Ok(())
    }
}

/// Constraints on the keys of child blocks.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyConstraint {
    head: Option<&'static str>,
    minimum: Vec<(&'static str, usize)>,
    maximum: Vec<(&'static str, usize)>,
}

impl KeyConstraint {
    /// Constraints for a paragraph's fields.
    ///
    /// Required fields must occur exactly once. Optional fields at most once.
    pub fn fields(required: &[&'static str], optional: &[&'static str]) -> Self {
        Self {
            head: None,
            minimum: required.iter().map(|k| (*k, 1)).collect(),
            maximum: required.iter().chain(optional).map(|k| (*k, 1)).collect(),
        }
    }

    /// Require the first child to have the given key.
    pub fn with_head(mut self, key: &'static str) -> Self {
        self.head = Some(key);
        self
    }

    /// Require at least `count` children having `key`.
    pub fn with_minimum(mut self, key: &'static str, count: usize) -> Self {
        self.minimum.push((key, count));
        self
    }

    /// Allow at most `count` children having `key`.
    pub fn with_maximum(mut self, key: &'static str, count: usize) -> Self {
        self.maximum.push((key, count));
        self
    }

    /// Verify a key index satisfies the constraints.
    pub fn check(&self, index: &KeyIndex) -> Result<()> {
        if let Some(expected) = self.head {
            if let Some(first) = index.ordered_keys().first() {
                if *first != expected {
                    return Err(CopyrightError::ControlUnexpectedHead {
                        expected,
                        actual: first.to_string(),
                    });
                }
            }
        }

        for (key, minimum) in &self.minimum {
            let actual = index.count(key);
            if actual < *minimum {
                return Err(CopyrightError::ControlKeyBelowMinimum {
                    key: *key,
                    minimum: *minimum,
                    actual,
                });
            }
        }

        for (key, maximum) in &self.maximum {
            let actual = index.count(key);
            if actual > *maximum {
                return Err(CopyrightError::ControlKeyAboveMaximum {
                    key: *key,
                    maximum: *maximum,
                    actual,
                });
            }
        }

        Ok(())
    }
}

/// Grammar of a field value. Every body chunk is extra.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeafGrammar;

impl Grammar for LeafGrammar {
    fn is_extra(&self, _chunk: &str, _was_block: bool) -> bool {
        true
    }

    fn starts_block(&self, _chunk: &str) -> Result<bool> {
        Ok(false)
    }

    fn child_grammar(&self, _key: &str) -> Option<&dyn Grammar> {
        None
    }
}

/// Grammar of the fields in a paragraph.
///
/// Comment lines are extras. An unindented line starts a new field and must contain a
/// colon. Indented lines continue the current field.
#[derive(Clone, Debug, Default)]
pub struct ParagraphGrammar {
    constraint: KeyConstraint,
}

impl ParagraphGrammar {
    pub fn new(constraint: KeyConstraint) -> Self {
        Self { constraint }
    }
}

impl Grammar for ParagraphGrammar {
    fn is_extra(&self, chunk: &str, _was_block: bool) -> bool {
        is_comment(chunk)
    }

    fn starts_block(&self, chunk: &str) -> Result<bool> {
        if is_continuation(chunk) {
            Ok(false)
        } else if chunk.contains(':') {
            Ok(true)
        } else {
            Err(CopyrightError::ControlMalformedContinuation(
                chunk.to_string(),
            ))
        }
    }

    fn child_grammar(&self, _key: &str) -> Option<&dyn Grammar> {
        Some(&LeafGrammar)
    }

    fn pre_check(&self, _key: Option<&str>, _primary: &[&str], index: &KeyIndex) -> Result<()> {
        self.constraint.check(index)
    }
}

/// Grammar of a control file: paragraphs separated by blank lines.
///
/// Comments between paragraphs are extras. Comments inside a paragraph belong to it.
#[derive(Clone, Debug, Default)]
pub struct ControlFileGrammar {
    constraint: KeyConstraint,
    paragraphs: Vec<(&'static str, ParagraphGrammar)>,
}

impl ControlFileGrammar {
    pub fn new(constraint: KeyConstraint) -> Self {
        Self {
            constraint,
            paragraphs: vec![],
        }
    }

    /// Register the grammar of paragraphs whose first field is `key`.
    pub fn with_paragraph(mut self, key: &'static str, grammar: ParagraphGrammar) -> Self {
        self.paragraphs.push((key, grammar));
        self
    }
}

impl Grammar for ControlFileGrammar {
    fn is_extra(&self, chunk: &str, was_block: bool) -> bool {
        is_blank(chunk) || (!was_block && is_comment(chunk))
    }

    fn starts_block(&self, _chunk: &str) -> Result<bool> {
        Ok(false)
    }

    fn child_grammar(&self, key: &str) -> Option<&dyn Grammar> {
        self.paragraphs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, grammar)| grammar as &dyn Grammar)
    }

    fn pre_check(&self, _key: Option<&str>, _primary: &[&str], index: &KeyIndex) -> Result<()> {
        self.constraint.check(index)
    }
}

/// A parsed block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node<'a> {
    key: Option<String>,
    key_str: Option<&'a str>,
    primary: Vec<&'a str>,
    children: Vec<Node<'a>>,
    key_index: KeyIndex,
    extras: Vec<Vec<&'a str>>,
    syntax: HeadSyntax,
}

impl<'a> Node<'a> {
    /// The normalized key of this block. [None] for the root.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The key as written in the input.
    pub fn key_str(&self) -> Option<&'a str> {
        self.key_str
    }

    /// Raw chunks of the head value.
    pub fn primary(&self) -> &[&'a str] {
        &self.primary
    }

    /// Obtain the typed value of this block from its primary chunks.
    pub fn model<T>(&self, make: impl FnOnce(&[&'a str]) -> T) -> T {
        make(&self.primary)
    }

    pub fn children(&self) -> &[Node<'a>] {
        &self.children
    }

    pub fn key_index(&self) -> &KeyIndex {
        &self.key_index
    }

    /// Groups of extra chunks.
    ///
    /// Group `i` precedes child `i`. The last group follows the last child.
    pub fn extras(&self) -> &[Vec<&'a str>] {
        &self.extras
    }

    /// Keys of children in child order.
    pub fn keys(&self) -> Vec<&str> {
        self.key_index.ordered_keys()
    }

    /// The last child having `key`.
    pub fn get(&self, key: &str) -> Option<&Node<'a>> {
        self.key_index
            .positions(key)
            .last()
            .map(|i| &self.children[*i])
    }

    /// All children having `key`, in order.
    pub fn get_all<'s>(&'s self, key: &str) -> impl DoubleEndedIterator<Item = &'s Node<'a>> + 's {
        self.key_index
            .positions(key)
            .iter()
            .map(move |i| &self.children[*i])
    }

    /// Reconstruct the chunks this node was parsed from.
    pub fn chunks(&self) -> Vec<Cow<'a, str>> {
        let mut body = Vec::new();
        let mut extras = self.extras.iter();

        for child in &self.children {
            if let Some(group) = extras.next() {
                body.extend(group.iter().map(|c| Cow::Borrowed(*c)));
            }
            body.extend(child.chunks());
        }
        for group in extras {
            body.extend(group.iter().map(|c| Cow::Borrowed(*c)));
        }

        self.syntax.join_head(self.key_str, &self.primary, body)
    }

    /// Serialize this node to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for chunk in self.chunks() {
            writer.write_all(chunk.as_bytes())?;
        }

        Ok(())
    }
}

impl<'a> Display for Node<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for chunk in self.chunks() {
            f.write_str(&chunk)?;
        }

        Ok(())
    }
}

/// The result of parsing a control file.
#[derive(Clone, Debug)]
pub struct ControlDocument<'a> {
    root: Node<'a>,
    advisories: Vec<Advisory>,
}

impl<'a> ControlDocument<'a> {
    pub fn root(&self) -> &Node<'a> {
        &self.root
    }

    /// Advisories raised by post-checks.
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    pub fn into_parts(self) -> (Node<'a>, Vec<Advisory>) {
        (self.root, self.advisories)
    }
}

/// Parse text with a grammar.
///
/// The text is split into chunks (lines keeping their terminators) and the root node
/// is built from all of them.
pub fn parse_str<'a>(text: &'a str, grammar: &dyn Grammar) -> Result<ControlDocument<'a>> {
    let head = HeadSyntax::Root.split_head(text.split_inclusive('\n').collect())?;

    let mut advisories = vec![];
    let root = parse_block(grammar, head, None, HeadSyntax::Root, &mut advisories)?;

    Ok(ControlDocument { root, advisories })
}

fn parse_block<'a>(
    grammar: &dyn Grammar,
    head: Head<'a>,
    key: Option<String>,
    syntax: HeadSyntax,
    advisories: &mut Vec<Advisory>,
) -> Result<Node<'a>> {
    let Head {
        key_str,
        primary,
        body,
    } = head;

    // extras[i] precedes blocks[i]; the final group trails the last block.
    let mut blocks: Vec<Vec<&'a str>> = vec![];
    let mut extras: Vec<Vec<&'a str>> = vec![vec![]];
    let mut was_block = false;

    for chunk in body {
        if grammar.is_extra(chunk, was_block) {
            was_block = false;
            if let Some(group) = extras.last_mut() {
                group.push(chunk);
            }
        } else if was_block && !grammar.starts_block(chunk)? {
            if let Some(block) = blocks.last_mut() {
                block.push(chunk);
            }
        } else {
            blocks.push(vec![chunk]);
            extras.push(vec![]);
            was_block = true;
        }
    }

    let child_syntax = grammar.head_syntax();
    let heads = blocks
        .into_iter()
        .map(|block| child_syntax.split_head(block))
        .collect::<Result<Vec<_>>>()?;

    let mut key_index = KeyIndex::default();
    let mut keys = Vec::with_capacity(heads.len());
    for (position, head) in heads.iter().enumerate() {
        let child_key = grammar.normalize_key(head.key_str.unwrap_or(""));
        key_index.push(child_key.clone(), position);
        keys.push(child_key);
    }

    grammar.pre_check(key.as_deref(), &primary, &key_index)?;

    let children = heads
        .into_iter()
        .zip(keys)
        .map(|(head, child_key)| {
            let child_grammar = grammar
                .child_grammar(&child_key)
                .ok_or_else(|| CopyrightError::ControlUnknownKey(child_key.clone()))?;

            parse_block(child_grammar, head, Some(child_key), child_syntax, advisories)
        })
        .collect::<Result<Vec<_>>>()?;

    let node = Node {
        key,
        key_str,
        primary,
        children,
        key_index,
        extras,
        syntax,
    };

    grammar.post_check(&node, advisories)?;

    Ok(node)
}
