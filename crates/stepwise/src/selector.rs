//! Selector grammar.
//!
//! Supported: tag, `*`, `#id`, `.class`, attribute conditions
//! (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`), state pseudo
//! classes (`:checked`, `:disabled`, `:enabled`, `:visible`, `:hidden`),
//! descendant and child combinators and comma-separated groups.
//!
//! Selectors are parsed once and immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dom::{Document, NodeId};
use crate::result::{StepwiseError, StepwiseResult};

/// Attribute used by [`Selector::test_id`]
pub const TEST_ID_ATTRIBUTE: &str = "data-cy";

/// Attribute comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrOp {
    /// `[name]`
    Exists,
    /// `[name=value]`
    Equals,
    /// `[name^=value]`
    Prefix,
    /// `[name$=value]`
    Suffix,
    /// `[name*=value]`
    Substring,
    /// `[name~=value]`, whitespace-separated word
    Word,
}

impl AttrOp {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Exists => "",
            Self::Equals => "=",
            Self::Prefix => "^=",
            Self::Suffix => "$=",
            Self::Substring => "*=",
            Self::Word => "~=",
        }
    }
}

/// One attribute condition inside brackets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrCondition {
    /// Attribute name
    pub name: String,
    /// Comparison
    pub op: AttrOp,
    /// Comparison operand (empty for [`AttrOp::Exists`])
    pub value: String,
}

impl AttrCondition {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Prefix => !self.value.is_empty() && actual.starts_with(&self.value),
            AttrOp::Suffix => !self.value.is_empty() && actual.ends_with(&self.value),
            AttrOp::Substring => !self.value.is_empty() && actual.contains(&self.value),
            AttrOp::Word => actual.split_ascii_whitespace().any(|w| w == self.value),
        }
    }
}

/// Element state pseudo class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoState {
    /// `:checked`
    Checked,
    /// `:disabled`
    Disabled,
    /// `:enabled`
    Enabled,
    /// `:visible`
    Visible,
    /// `:hidden`
    Hidden,
}

impl PseudoState {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "checked" => Some(Self::Checked),
            "disabled" => Some(Self::Disabled),
            "enabled" => Some(Self::Enabled),
            "visible" => Some(Self::Visible),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Checked => "checked",
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }

    fn matches(self, doc: &Document, id: NodeId) -> bool {
        match self {
            Self::Checked => doc.get(id).is_some_and(|el| el.state.checked),
            Self::Disabled => doc.is_disabled(id),
            Self::Enabled => !doc.is_disabled(id),
            Self::Visible => doc.is_visible(id),
            Self::Hidden => !doc.is_visible(id),
        }
    }
}

/// A compound selector: every condition applies to the same element.
///
/// Also serves as the structured predicate form of a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Compound {
    /// Tag name
    pub tag: Option<String>,
    /// `id` attribute
    pub id: Option<String>,
    /// Required classes
    pub classes: Vec<String>,
    /// Attribute conditions
    pub attrs: Vec<AttrCondition>,
    /// State conditions
    pub states: Vec<PseudoState>,
}

impl Compound {
    /// Match any element
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Match by tag
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into().to_ascii_lowercase()),
            ..Self::default()
        }
    }

    /// Require an id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Require a class
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Require an attribute to be present
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>) -> Self {
        self.attrs.push(AttrCondition {
            name: name.into(),
            op: AttrOp::Exists,
            value: String::new(),
        });
        self
    }

    /// Require an attribute to equal `value`
    #[must_use]
    pub fn with_attr_eq(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(AttrCondition {
            name: name.into(),
            op: AttrOp::Equals,
            value: value.into(),
        });
        self
    }

    /// Require a state
    #[must_use]
    pub fn with_state(mut self, state: PseudoState) -> Self {
        self.states.push(state);
        self
    }

    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.states.is_empty()
    }

    /// Whether the element `id` satisfies every condition
    #[must_use]
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(el) = doc.get(id) else {
            return false;
        };
        if doc.is_root(id) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if el.tag != *tag {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if el.id() != Some(want.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|a| a.matches(el.attr(&a.name)))
            && self.states.iter().all(|s| s.matches(doc, id))
    }

    fn write_css(&self, out: &mut String) {
        match &self.tag {
            Some(tag) => out.push_str(tag),
            None if self.is_empty() => out.push('*'),
            None => {}
        }
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        for attr in &self.attrs {
            out.push('[');
            out.push_str(&attr.name);
            if attr.op != AttrOp::Exists {
                out.push_str(attr.op.symbol());
                write_quoted(out, &attr.value);
            }
            out.push(']');
        }
        for state in &self.states {
            out.push(':');
            out.push_str(state.name());
        }
    }
}

/// Quote `value` so that `parse_attr` reads it back unchanged
fn write_quoted(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

/// Relation between a compound and the compound to its left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Whitespace: any ancestor
    Descendant,
    /// `>`: direct parent
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Part {
    combinator: Option<Combinator>,
    compound: Compound,
}

/// A parsed CSS-like selector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CssSelector {
    source: String,
    groups: Vec<Vec<Part>>,
}

impl CssSelector {
    /// Parse selector text
    pub fn parse(source: &str) -> StepwiseResult<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(StepwiseError::invalid_selector(source, "selector is empty"));
        }
        let groups = split_outside(trimmed, ',')
            .map_err(|m| StepwiseError::invalid_selector(source, m))?
            .into_iter()
            .map(|group| parse_chain(&group))
            .collect::<Result<Vec<_>, String>>()
            .map_err(|m| StepwiseError::invalid_selector(source, m))?;
        Ok(Self {
            source: trimmed.to_string(),
            groups,
        })
    }

    /// Build a selector from a single structured predicate
    #[must_use]
    pub fn from_compound(compound: Compound) -> Self {
        let mut source = String::new();
        compound.write_css(&mut source);
        Self {
            source,
            groups: vec![vec![Part {
                combinator: None,
                compound,
            }]],
        }
    }

    /// Original selector text
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether element `id` matches any group
    #[must_use]
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.groups.iter().any(|parts| matches_chain(doc, parts, id))
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CssSelector {
    type Err = StepwiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CssSelector {
    type Error = StepwiseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CssSelector> for String {
    fn from(value: CssSelector) -> Self {
        value.source
    }
}

/// Which elements a query step looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS-like selector
    Css(CssSelector),
    /// Element whose text contains `text`, optionally filtered by `css`
    Contains {
        /// Optional element filter
        css: Option<CssSelector>,
        /// Text to look for
        text: String,
    },
}

impl Selector {
    /// Parse a CSS selector
    pub fn css(source: &str) -> StepwiseResult<Self> {
        CssSelector::parse(source).map(Self::Css)
    }

    /// Match `[data-cy="id"]`
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::Css(CssSelector::from_compound(
            Compound::any().with_attr_eq(TEST_ID_ATTRIBUTE, id),
        ))
    }

    /// Deepest element containing `text`
    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains {
            css: None,
            text: text.into(),
        }
    }

    /// First element matching `css` whose text contains `text`
    pub fn contains_in(css: &str, text: impl Into<String>) -> StepwiseResult<Self> {
        Ok(Self::Contains {
            css: Some(CssSelector::parse(css)?),
            text: text.into(),
        })
    }

    /// From a structured predicate
    #[must_use]
    pub fn from_compound(compound: Compound) -> Self {
        Self::Css(CssSelector::from_compound(compound))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Contains { css: None, text } => write!(f, "contains({text:?})"),
            Self::Contains {
                css: Some(css),
                text,
            } => write!(f, "contains({css}, {text:?})"),
        }
    }
}

fn matches_chain(doc: &Document, parts: &[Part], id: NodeId) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !last.compound.matches(doc, id) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match last.combinator {
        Some(Combinator::Child) => doc.parent(id).is_some_and(|p| matches_chain(doc, rest, p)),
        Some(Combinator::Descendant) | None => doc
            .ancestors(id)
            .into_iter()
            .any(|a| matches_chain(doc, rest, a)),
    }
}

/// Bracket and quote depth while scanning selector text
#[derive(Default)]
struct Scan {
    bracket: usize,
    quote: Option<char>,
    escaped: bool,
}

impl Scan {
    fn feed(&mut self, ch: char) -> Result<(), String> {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == q {
                self.quote = None;
            }
            return Ok(());
        }
        match ch {
            '"' | '\'' if self.bracket > 0 => self.quote = Some(ch),
            '[' => self.bracket += 1,
            ']' => {
                if self.bracket == 0 {
                    return Err("unbalanced `]`".into());
                }
                self.bracket -= 1;
            }
            _ => {}
        }
        Ok(())
    }

    const fn at_top(&self) -> bool {
        self.bracket == 0 && self.quote.is_none()
    }

    fn finish(&self) -> Result<(), String> {
        if self.quote.is_some() {
            return Err("unterminated string".into());
        }
        if self.bracket != 0 {
            return Err("unbalanced `[`".into());
        }
        Ok(())
    }
}

fn split_outside(src: &str, sep: char) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut scan = Scan::default();
    for ch in src.chars() {
        if ch == sep && scan.at_top() {
            let piece = current.trim();
            if piece.is_empty() {
                return Err(format!("empty selector around `{sep}`"));
            }
            out.push(piece.to_string());
            current.clear();
            continue;
        }
        scan.feed(ch)?;
        current.push(ch);
    }
    scan.finish()?;
    let piece = current.trim();
    if piece.is_empty() {
        return Err(format!("empty selector around `{sep}`"));
    }
    out.push(piece.to_string());
    Ok(out)
}

fn parse_chain(group: &str) -> Result<Vec<Part>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut scan = Scan::default();
    for ch in group.chars() {
        if scan.at_top() && (ch == '>' || ch.is_ascii_whitespace()) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if ch == '>' {
                tokens.push(">".to_string());
            }
            continue;
        }
        scan.feed(ch)?;
        current.push(ch);
    }
    scan.finish()?;
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;
    for token in tokens {
        if token == ">" {
            if parts.is_empty() || pending.is_some() {
                return Err("misplaced `>` combinator".into());
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let compound = parse_compound(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part {
            combinator,
            compound,
        });
    }
    if pending.is_some() {
        return Err("selector ends with a combinator".into());
    }
    if parts.is_empty() {
        return Err("selector is empty".into());
    }
    Ok(parts)
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

fn read_ident(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    (end > start).then(|| (chars[start..end].iter().collect(), end))
}

fn parse_compound(token: &str) -> Result<Compound, String> {
    let chars: Vec<char> = token.chars().collect();
    let mut compound = Compound::default();
    let mut universal = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                if universal || compound.tag.is_some() || i != 0 {
                    return Err(format!("unexpected `*` in `{token}`"));
                }
                universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = read_ident(&chars, i + 1)
                    .ok_or_else(|| format!("expected an id after `#` in `{token}`"))?;
                if compound.id.replace(id).is_some() {
                    return Err(format!("more than one id in `{token}`"));
                }
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(&chars, i + 1)
                    .ok_or_else(|| format!("expected a class after `.` in `{token}`"))?;
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let (attr, next) = parse_attr(&chars, i)?;
                compound.attrs.push(attr);
                i = next;
            }
            ':' => {
                let (name, next) = read_ident(&chars, i + 1)
                    .ok_or_else(|| format!("expected a pseudo class after `:` in `{token}`"))?;
                let state = PseudoState::parse(&name)
                    .ok_or_else(|| format!("unsupported pseudo class `:{name}`"))?;
                compound.states.push(state);
                i = next;
            }
            _ => {
                if i != 0 {
                    return Err(format!("unexpected `{}` in `{token}`", chars[i]));
                }
                let (tag, next) = read_ident(&chars, i)
                    .ok_or_else(|| format!("unexpected `{}` in `{token}`", chars[i]))?;
                compound.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }
    Ok(compound)
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn parse_attr(chars: &[char], open: usize) -> Result<(AttrCondition, usize), String> {
    let mut i = skip_ws(chars, open + 1);
    let start = i;
    while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == ':') {
        i += 1;
    }
    if i == start {
        return Err("expected an attribute name after `[`".into());
    }
    let name: String = chars[start..i].iter().collect();
    i = skip_ws(chars, i);

    let op = match chars.get(i) {
        Some(']') => {
            return Ok((
                AttrCondition {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                },
                i + 1,
            ));
        }
        Some('=') => {
            i += 1;
            AttrOp::Equals
        }
        Some(&c) if matches!(c, '^' | '$' | '*' | '~') && chars.get(i + 1) == Some(&'=') => {
            i += 2;
            match c {
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                '*' => AttrOp::Substring,
                _ => AttrOp::Word,
            }
        }
        _ => return Err(format!("invalid attribute operator for `{name}`")),
    };
    i = skip_ws(chars, i);

    let value = match chars.get(i) {
        Some(&q) if q == '"' || q == '\'' => {
            let (value, next) = read_quoted(chars, i + 1, q)
                .ok_or_else(|| format!("unterminated value for `{name}`"))?;
            i = next;
            value
        }
        _ => {
            let (value, next) = read_ident(chars, i)
                .ok_or_else(|| format!("expected a value for `{name}`"))?;
            i = next;
            value
        }
    };
    i = skip_ws(chars, i);
    if chars.get(i) != Some(&']') {
        return Err(format!("expected `]` after attribute `{name}`"));
    }
    Ok((AttrCondition { name, op, value }, i + 1))
}

/// Read up to the closing `quote`; a backslash takes the next char literally
fn read_quoted(chars: &[char], start: usize, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut i = start;
    loop {
        match *chars.get(i)? {
            '\\' => {
                value.push(*chars.get(i + 1)?);
                i += 2;
            }
            ch if ch == quote => return Some((value, i + 1)),
            ch => {
                value.push(ch);
                i += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Element;

    fn login_form() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let form = doc.append(root, Element::new("form").with_class("form-inline"));
        let input = doc.append(
            form,
            Element::new("input")
                .with_id("inputEmail1")
                .with_class("input-full-width")
                .with_class("size-medium")
                .with_class("shape-rectangle")
                .with_attr("placeholder", "Email")
                .with_attr("fullwidth", "")
                .with_attr("data-cy", "imputEmail1"),
        );
        let button = doc.append(
            form,
            Element::new("button")
                .with_attr("status", "warning")
                .with_text("Sign in"),
        );
        (doc, form, input, button)
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_tag_id_class_attr() {
            let sel = CssSelector::parse(r#"input[placeholder="Email"]#inputEmail1.input-full-width"#)
                .unwrap();
            assert_eq!(sel.groups.len(), 1);
            let compound = &sel.groups[0][0].compound;
            assert_eq!(compound.tag.as_deref(), Some("input"));
            assert_eq!(compound.id.as_deref(), Some("inputEmail1"));
            assert_eq!(compound.classes, vec!["input-full-width".to_string()]);
            assert_eq!(compound.attrs[0].value, "Email");
        }

        #[test]
        fn test_parse_quoted_value_with_spaces() {
            let sel =
                CssSelector::parse(r#"[class="input-full-width size-medium shape-rectangle"]"#)
                    .unwrap();
            let attr = &sel.groups[0][0].compound.attrs[0];
            assert_eq!(attr.op, AttrOp::Equals);
            assert_eq!(attr.value, "input-full-width size-medium shape-rectangle");
        }

        #[test]
        fn test_parse_combinators_and_groups() {
            let sel = CssSelector::parse("form > button, nb-card input").unwrap();
            assert_eq!(sel.groups.len(), 2);
            assert_eq!(sel.groups[0][1].combinator, Some(Combinator::Child));
            assert_eq!(sel.groups[1][1].combinator, Some(Combinator::Descendant));
        }

        #[test]
        fn test_parse_attribute_operators() {
            let sel = CssSelector::parse("[a^=x][b$=y][c*=z][d~=w][e='q']").unwrap();
            let ops: Vec<AttrOp> = sel.groups[0][0].compound.attrs.iter().map(|a| a.op).collect();
            assert_eq!(
                ops,
                vec![
                    AttrOp::Prefix,
                    AttrOp::Suffix,
                    AttrOp::Substring,
                    AttrOp::Word,
                    AttrOp::Equals
                ]
            );
        }

        #[test]
        fn test_parse_rejects_invalid() {
            for bad in ["", "   ", "[", "a]", "> a", "a >", "a > > b", "#", ".", "a,", ":hover", "[x=\"open]", "a*"] {
                assert!(
                    matches!(CssSelector::parse(bad), Err(StepwiseError::InvalidSelector { .. })),
                    "expected `{bad}` to be rejected"
                );
            }
        }

        #[test]
        fn test_source_is_trimmed() {
            let sel = CssSelector::parse("  .btn  ").unwrap();
            assert_eq!(sel.source(), ".btn");
            assert_eq!(sel.to_string(), ".btn");
        }

        #[test]
        fn test_serde_round_trips_through_string() {
            let sel = CssSelector::parse("form button").unwrap();
            let json = serde_json::to_string(&sel).unwrap();
            assert_eq!(json, "\"form button\"");
            let back: CssSelector = serde_json::from_str(&json).unwrap();
            assert_eq!(back, sel);
            assert!(serde_json::from_str::<CssSelector>("\"[\"").is_err());
        }
    }

    mod match_tests {
        use super::*;

        fn matches(sel: &str, doc: &Document, id: NodeId) -> bool {
            CssSelector::parse(sel).unwrap().matches(doc, id)
        }

        #[test]
        fn test_locator_forms_from_tutorial() {
            let (doc, _, input, _) = login_form();
            for sel in [
                "input",
                "#inputEmail1",
                ".input-full-width",
                "[fullwidth]",
                r#"[placeholder="Email"]"#,
                r#"[class="input-full-width size-medium shape-rectangle"]"#,
                r#"[placeholder="Email"][fullwidth]"#,
                r#"input[placeholder="Email"]#inputEmail1.input-full-width"#,
                r#"[data-cy="imputEmail1"]"#,
            ] {
                assert!(matches(sel, &doc, input), "{sel} should match");
            }
        }

        #[test]
        fn test_descendant_and_child() {
            let (doc, _, input, _) = login_form();
            assert!(matches("form input", &doc, input));
            assert!(matches("form > input", &doc, input));
            assert!(matches(".form-inline > #inputEmail1", &doc, input));
            assert!(!matches("nb-card input", &doc, input));
        }

        #[test]
        fn test_child_requires_direct_parent() {
            let mut doc = Document::new();
            let root = doc.root();
            let card = doc.append(root, Element::new("nb-card"));
            let form = doc.append(card, Element::new("form"));
            let button = doc.append(form, Element::new("button"));
            assert!(matches("nb-card button", &doc, button));
            assert!(!matches("nb-card > button", &doc, button));
            assert!(matches("nb-card > form > button", &doc, button));
        }

        #[test]
        fn test_state_pseudo_classes() {
            let mut doc = Document::new();
            let root = doc.root();
            let checked = doc.append(
                root,
                Element::new("input").with_attr("type", "checkbox").checked(true),
            );
            let disabled = doc.append(root, Element::new("button").with_attr("disabled", ""));
            let hidden = doc.append(root, Element::new("div").visible(false));
            assert!(matches(":checked", &doc, checked));
            assert!(matches("button:disabled", &doc, disabled));
            assert!(!matches("button:enabled", &doc, disabled));
            assert!(matches("div:hidden", &doc, hidden));
            assert!(!matches("div:visible", &doc, hidden));
        }

        #[test]
        fn test_universal_never_matches_root() {
            let (doc, _, _, _) = login_form();
            assert!(!matches("*", &doc, doc.root()));
        }

        #[test]
        fn test_group_matches_any() {
            let (doc, _, input, button) = login_form();
            assert!(matches("select, input", &doc, input));
            assert!(matches("select, [status=warning]", &doc, button));
        }

        #[test]
        fn test_word_and_substring_operators() {
            let (doc, _, input, _) = login_form();
            assert!(matches("[class~=size-medium]", &doc, input));
            assert!(!matches("[class~=size]", &doc, input));
            assert!(matches("[class*=size]", &doc, input));
            assert!(matches("[placeholder^=Em]", &doc, input));
            assert!(matches("[placeholder$=ail]", &doc, input));
        }
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_test_id_selector() {
            let (doc, _, input, _) = login_form();
            let Selector::Css(css) = Selector::test_id("imputEmail1") else {
                panic!("expected css selector");
            };
            assert!(css.matches(&doc, input));
            assert_eq!(css.source(), r#"[data-cy="imputEmail1"]"#);
        }

        #[test]
        fn test_test_id_with_quotes_and_backslashes() {
            let mut doc = Document::new();
            let root = doc.root();
            let node = doc.append(
                root,
                Element::new("button").with_attr(TEST_ID_ATTRIBUTE, r#"say "hi" \ bye"#),
            );
            let sel = Selector::test_id(r#"say "hi" \ bye"#);
            let Selector::Css(css) = &sel else {
                panic!("expected css selector");
            };
            assert_eq!(css.source(), r#"[data-cy="say \"hi\" \\ bye"]"#);
            assert!(css.matches(&doc, node));

            let json = serde_json::to_string(&sel).unwrap();
            let back: Selector = serde_json::from_str(&json).unwrap();
            assert_eq!(back, sel);
        }

        #[test]
        fn test_escaped_quote_inside_single_quotes() {
            let mut doc = Document::new();
            let root = doc.root();
            let node = doc.append(root, Element::new("a").with_attr("title", "it's, here"));
            let sel = CssSelector::parse(r"a[title='it\'s, here'], b").unwrap();
            assert!(sel.matches(&doc, node));
        }

        #[test]
        fn test_from_compound_source() {
            let sel = CssSelector::from_compound(
                Compound::tag("input").with_id("x").with_class("y").with_attr("z"),
            );
            assert_eq!(sel.source(), "input#x.y[z]");
            assert_eq!(CssSelector::from_compound(Compound::any()).source(), "*");
        }

        #[test]
        fn test_display() {
            assert_eq!(Selector::contains("Forms").to_string(), "contains(\"Forms\")");
            let sel = Selector::contains_in("nb-card", "Horizontal form").unwrap();
            assert_eq!(sel.to_string(), "contains(nb-card, \"Horizontal form\")");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_simple_compounds_parse_and_match(
                tag in "[a-z][a-z0-9-]{0,8}",
                id in "[a-zA-Z][a-zA-Z0-9_-]{0,8}",
                class in "[a-zA-Z][a-zA-Z0-9_-]{0,8}",
            ) {
                let mut doc = Document::new();
                let root = doc.root();
                let node = doc.append(root, Element::new(tag.clone()).with_id(id.clone()).with_class(&class));
                let source = format!("{tag}#{id}.{class}");
                let sel = CssSelector::parse(&source).unwrap();
                prop_assert!(sel.matches(&doc, node));
                prop_assert_eq!(sel.source(), source.as_str());
            }

            #[test]
            fn prop_attribute_values_round_trip(value in "\\PC{0,24}") {
                let mut doc = Document::new();
                let root = doc.root();
                let node = doc.append(root, Element::new("div").with_attr("title", value.clone()));
                let built = CssSelector::from_compound(Compound::any().with_attr_eq("title", value));
                let parsed = CssSelector::parse(built.source()).unwrap();
                prop_assert_eq!(&parsed, &built);
                prop_assert!(parsed.matches(&doc, node));
            }

            #[test]
            fn prop_parse_never_panics(input in "\\PC{0,40}") {
                let _ = CssSelector::parse(&input);
            }
        }
    }
}
