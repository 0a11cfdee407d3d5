//! XPath 1.0 subset evaluator for the mock driver.
//!
//! Covers the grammar the lookup builders emit: absolute and relative paths
//! (`/`, `//`, `.//`), the `child`, `descendant`, `descendant-or-self`, `self`
//! and `attribute` axes, `text()` / `node()` / `*` / name tests, predicates,
//! `|`, `or`, `and`, `=`, `!=`, string literals, and the functions
//! `contains`, `starts-with`, `normalize-space`, `translate`, `concat`,
//! `string` and `not`. Positional predicates and numbers are not supported.
//!
//! An element's own text is modelled as a single text node that precedes its
//! children.

use std::iter::Peekable;
use std::str::Chars;

use crate::result::{SeleniumError, SeleniumResult};
use crate::xpath::normalize_space;

use super::document::Dom;

/// Ids of the elements `expression` selects in `doc`, in document order
pub(crate) fn evaluate(dom: &Dom, doc: usize, expression: &str) -> SeleniumResult<Vec<usize>> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(invalid(format!("unexpected trailing input in '{expression}'")));
    }
    let evaluator = Evaluator { dom, doc };
    match evaluator.eval(&expr, Item::Root)? {
        Value::Nodes(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Item::Element(id) => Some(id),
                _ => None,
            })
            .collect()),
        _ => Err(invalid(format!("'{expression}' does not select nodes"))),
    }
}

fn invalid(message: impl Into<String>) -> SeleniumError {
    SeleniumError::locator_invalid(message)
}

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    At,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Pipe,
    Eq,
    NotEq,
    ColonColon,
    Star,
    Name(String),
    Literal(String),
}

fn tokenize(source: &str) -> SeleniumResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '/' => {
                if chars.next_if_eq(&'/').is_some() {
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '.' => {
                if chars.peek() == Some(&'.') {
                    return Err(invalid("parent steps are not supported"));
                }
                Token::Dot
            }
            '@' => Token::At,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '|' => Token::Pipe,
            '=' => Token::Eq,
            '*' => Token::Star,
            '!' if chars.next_if_eq(&'=').is_some() => Token::NotEq,
            ':' if chars.next_if_eq(&':').is_some() => Token::ColonColon,
            '\'' | '"' => Token::Literal(read_literal(&mut chars, c)?),
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::from(c);
                while let Some(next) =
                    chars.next_if(|n| n.is_alphanumeric() || *n == '-' || *n == '_')
                {
                    name.push(next);
                }
                Token::Name(name)
            }
            other => return Err(invalid(format!("unexpected character '{other}'"))),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

fn read_literal(chars: &mut Peekable<Chars<'_>>, quote: char) -> SeleniumResult<String> {
    let mut out = String::new();
    for c in chars.by_ref() {
        if c == quote {
            return Ok(out);
        }
        out.push(c);
    }
    Err(invalid("unterminated string literal"))
}

// =============================================================================
// SYNTAX TREE & PARSER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Node,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    const fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(String),
    Path { absolute: bool, steps: Vec<Step> },
    Union(Vec<Expr>),
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Equals { lhs: Box<Expr>, rhs: Box<Expr>, negate: bool },
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, want: &Token) -> SeleniumResult<()> {
        match self.advance() {
            Some(ref got) if got == want => Ok(()),
            got => Err(invalid(format!("expected {want:?}, found {got:?}"))),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn parse_or(&mut self) -> SeleniumResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.is_keyword("or") {
            self.advance();
            lhs = Expr::Or(Box::new(lhs), Box::new(self.parse_and()?));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> SeleniumResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.is_keyword("and") {
            self.advance();
            lhs = Expr::And(Box::new(lhs), Box::new(self.parse_equality()?));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> SeleniumResult<Expr> {
        let lhs = self.parse_union()?;
        let negate = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_union()?;
        Ok(Expr::Equals {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            negate,
        })
    }

    fn parse_union(&mut self) -> SeleniumResult<Expr> {
        let mut branches = vec![self.parse_operand()?];
        while self.peek() == Some(&Token::Pipe) {
            self.advance();
            branches.push(self.parse_operand()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Expr::Union(branches)
        })
    }

    fn parse_operand(&mut self) -> SeleniumResult<Expr> {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Literal(_)), _) => match self.advance() {
                Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
                _ => Err(invalid("expected literal")),
            },
            (Some(Token::Name(name)), Some(Token::LParen))
                if name != "text" && name != "node" =>
            {
                let name = name.clone();
                self.pos += 2;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    args.push(self.parse_or()?);
                    while self.peek() == Some(&Token::Comma) {
                        self.advance();
                        args.push(self.parse_or()?);
                    }
                }
                self.expect(&Token::RParen)?;
                Ok(Expr::Call(name, args))
            }
            _ => self.parse_path(),
        }
    }

    fn parse_path(&mut self) -> SeleniumResult<Expr> {
        let mut steps = Vec::new();
        let (absolute, mut need_step) = match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                (true, self.at_step_start())
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                steps.push(Step::descendant_or_self());
                (true, true)
            }
            _ => (false, true),
        };
        loop {
            if need_step {
                steps.push(self.parse_step()?);
            }
            match self.peek() {
                Some(Token::Slash) => {
                    self.advance();
                    need_step = true;
                }
                Some(Token::DoubleSlash) => {
                    self.advance();
                    steps.push(Step::descendant_or_self());
                    need_step = true;
                }
                _ => break,
            }
        }
        Ok(Expr::Path { absolute, steps })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::At | Token::Star | Token::Name(_))
        )
    }

    fn parse_step(&mut self) -> SeleniumResult<Step> {
        let (axis, test) = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Dot), _) => {
                self.advance();
                (Axis::SelfNode, NodeTest::Node)
            }
            (Some(Token::At), _) => {
                self.advance();
                match self.advance() {
                    Some(Token::Name(name)) => (Axis::Attribute, NodeTest::Name(name)),
                    Some(Token::Star) => (Axis::Attribute, NodeTest::Any),
                    other => return Err(invalid(format!("bad attribute step {other:?}"))),
                }
            }
            (Some(Token::Name(name)), Some(Token::ColonColon)) => {
                let axis = match name.as_str() {
                    "child" => Axis::Child,
                    "descendant" => Axis::Descendant,
                    "descendant-or-self" => Axis::DescendantOrSelf,
                    "self" => Axis::SelfNode,
                    "attribute" => Axis::Attribute,
                    other => return Err(invalid(format!("unsupported axis '{other}'"))),
                };
                self.pos += 2;
                (axis, self.parse_node_test()?)
            }
            (Some(_), _) => (Axis::Child, self.parse_node_test()?),
            (None, _) => return Err(invalid("unexpected end of expression")),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.advance();
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> SeleniumResult<NodeTest> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Any),
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    self.expect(&Token::RParen)?;
                    match name.as_str() {
                        "text" => Ok(NodeTest::Text),
                        "node" => Ok(NodeTest::Node),
                        other => Err(invalid(format!("unsupported node test '{other}()'"))),
                    }
                } else {
                    Ok(NodeTest::Name(name))
                }
            }
            other => Err(invalid(format!("expected node test, found {other:?}"))),
        }
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Root,
    Element(usize),
    Text(usize),
    Attr(usize, usize),
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<Item>),
    Str(String),
    Bool(bool),
}

struct Evaluator<'a> {
    dom: &'a Dom,
    doc: usize,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, context: Item) -> SeleniumResult<Value> {
        Ok(match expr {
            Expr::Literal(value) => Value::Str(value.clone()),
            Expr::Path { absolute, steps } => {
                let mut items = vec![if *absolute { Item::Root } else { context }];
                for step in steps {
                    items = self.apply_step(&items, step)?;
                }
                Value::Nodes(items)
            }
            Expr::Union(branches) => {
                let mut items = Vec::new();
                for branch in branches {
                    match self.eval(branch, context)? {
                        Value::Nodes(found) => items.extend(found),
                        _ => return Err(invalid("union operands must be node-sets")),
                    }
                }
                Value::Nodes(self.document_order(items))
            }
            Expr::Or(lhs, rhs) => Value::Bool(
                self.boolean(&self.eval(lhs, context)?)
                    || self.boolean(&self.eval(rhs, context)?),
            ),
            Expr::And(lhs, rhs) => Value::Bool(
                self.boolean(&self.eval(lhs, context)?)
                    && self.boolean(&self.eval(rhs, context)?),
            ),
            Expr::Equals { lhs, rhs, negate } => {
                let lhs = self.eval(lhs, context)?;
                let rhs = self.eval(rhs, context)?;
                Value::Bool(self.equals(&lhs, &rhs, *negate))
            }
            Expr::Call(name, args) => self.call(name, args, context)?,
        })
    }

    fn apply_step(&self, items: &[Item], step: &Step) -> SeleniumResult<Vec<Item>> {
        let mut out = Vec::new();
        for &item in items {
            for candidate in self.axis(item, step.axis) {
                if !self.node_test(candidate, &step.test, step.axis) {
                    continue;
                }
                let mut keep = true;
                for predicate in &step.predicates {
                    if !self.boolean(&self.eval(predicate, candidate)?) {
                        keep = false;
                        break;
                    }
                }
                if keep {
                    out.push(candidate);
                }
            }
        }
        Ok(self.document_order(out))
    }

    fn children(&self, item: Item) -> Vec<Item> {
        match item {
            Item::Root => self.dom.roots(self.doc).map(Item::Element).collect(),
            Item::Element(id) => {
                let own_text = (!self.dom.nodes[id].text.is_empty()).then_some(Item::Text(id));
                own_text
                    .into_iter()
                    .chain(self.dom.children(id).map(Item::Element))
                    .collect()
            }
            Item::Text(_) | Item::Attr(..) => Vec::new(),
        }
    }

    fn descendants(&self, item: Item, out: &mut Vec<Item>) {
        for child in self.children(item) {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn axis(&self, item: Item, axis: Axis) -> Vec<Item> {
        match axis {
            Axis::Child => self.children(item),
            Axis::Descendant => {
                let mut out = Vec::new();
                self.descendants(item, &mut out);
                out
            }
            Axis::DescendantOrSelf => {
                let mut out = vec![item];
                self.descendants(item, &mut out);
                out
            }
            Axis::SelfNode => vec![item],
            Axis::Attribute => match item {
                Item::Element(id) => (0..self.dom.nodes[id].attrs.len())
                    .map(|i| Item::Attr(id, i))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    fn node_test(&self, item: Item, test: &NodeTest, axis: Axis) -> bool {
        if axis == Axis::Attribute {
            return match (item, test) {
                (Item::Attr(_, _), NodeTest::Any | NodeTest::Node) => true,
                (Item::Attr(id, i), NodeTest::Name(name)) => self.dom.nodes[id].attrs[i].0 == *name,
                _ => false,
            };
        }
        match (item, test) {
            (_, NodeTest::Node) => true,
            (Item::Element(_), NodeTest::Any) => true,
            (Item::Element(id), NodeTest::Name(name)) => {
                self.dom.nodes[id].tag.eq_ignore_ascii_case(name)
            }
            (Item::Text(_), NodeTest::Text) => true,
            _ => false,
        }
    }

    fn order_key(&self, item: Item) -> (usize, usize, usize, usize) {
        match item {
            Item::Root => (0, 0, 0, 0),
            Item::Element(id) => (self.dom.nodes[id].order + 1, id, 0, 0),
            Item::Text(id) => (self.dom.nodes[id].order + 1, id, 1, 0),
            Item::Attr(id, i) => (self.dom.nodes[id].order + 1, id, 2, i),
        }
    }

    fn document_order(&self, mut items: Vec<Item>) -> Vec<Item> {
        items.sort_by_key(|&item| self.order_key(item));
        items.dedup();
        items
    }

    fn string_of(&self, item: Item) -> String {
        match item {
            Item::Root => self
                .dom
                .roots(self.doc)
                .map(|id| self.dom.string_value(id))
                .collect(),
            Item::Element(id) => self.dom.string_value(id),
            Item::Text(id) => self.dom.nodes[id].text.clone(),
            Item::Attr(id, i) => self.dom.nodes[id].attrs[i].1.clone(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(items) => items
                .first()
                .map(|&item| self.string_of(item))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    fn equals(&self, lhs: &Value, rhs: &Value, negate: bool) -> bool {
        match (lhs, rhs) {
            (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                (self.boolean(lhs) == self.boolean(rhs)) != negate
            }
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|&x| {
                let x = self.string_of(x);
                b.iter().any(|&y| (x == self.string_of(y)) != negate)
            }),
            (Value::Nodes(items), Value::Str(s)) | (Value::Str(s), Value::Nodes(items)) => {
                items.iter().any(|&item| (self.string_of(item) == *s) != negate)
            }
            (Value::Str(a), Value::Str(b)) => (a == b) != negate,
        }
    }

    fn call(&self, name: &str, args: &[Expr], context: Item) -> SeleniumResult<Value> {
        let values = args
            .iter()
            .map(|arg| self.eval(arg, context))
            .collect::<SeleniumResult<Vec<_>>>()?;
        let arity = |expected: &[usize]| -> SeleniumResult<()> {
            if expected.contains(&values.len()) {
                Ok(())
            } else {
                Err(invalid(format!(
                    "{name}() takes {expected:?} argument(s), got {}",
                    values.len()
                )))
            }
        };
        let string_arg = |i: usize| -> String {
            values
                .get(i)
                .map_or_else(|| self.string_of(context), |v| self.string(v))
        };

        Ok(match name {
            "contains" => {
                arity(&[2])?;
                Value::Bool(string_arg(0).contains(&string_arg(1)))
            }
            "starts-with" => {
                arity(&[2])?;
                Value::Bool(string_arg(0).starts_with(&string_arg(1)))
            }
            "normalize-space" => {
                arity(&[0, 1])?;
                Value::Str(normalize_space(&string_arg(0)))
            }
            "string" => {
                arity(&[0, 1])?;
                Value::Str(string_arg(0))
            }
            "translate" => {
                arity(&[3])?;
                Value::Str(translate(&string_arg(0), &string_arg(1), &string_arg(2)))
            }
            "concat" => {
                if values.len() < 2 {
                    return Err(invalid("concat() takes at least 2 arguments"));
                }
                Value::Str(values.iter().map(|v| self.string(v)).collect())
            }
            "not" => {
                arity(&[1])?;
                Value::Bool(!self.boolean(&values[0]))
            }
            other => return Err(invalid(format!("unsupported function '{other}()'"))),
        })
    }
}

fn translate(source: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    source
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};

    fn page() -> Dom {
        Dom::build(
            MockPage::new()
                .with(MockElement::new("button").attr("id", "b1").text("Submit Form"))
                .with(
                    MockElement::new("button")
                        .attr("id", "b2")
                        .child(MockElement::new("span").text("  Save  ")),
                )
                .with(
                    MockElement::new("div")
                        .attr("role", "button")
                        .attr("id", "d1")
                        .text("Cancel"),
                )
                .with(
                    MockElement::new("input")
                        .attr("type", "submit")
                        .attr("value", "Send it")
                        .attr("id", "i1"),
                )
                .with(MockElement::new("p").attr("title", "O'Brien \"the\" Great")),
        )
    }

    fn ids(dom: &Dom, expr: &str) -> Vec<String> {
        evaluate(dom, 0, expr)
            .unwrap()
            .into_iter()
            .map(|id| dom.attr(id, "id").unwrap_or("?").to_string())
            .collect()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_tokenize_literals_and_axes() {
            let tokens = tokenize(".//a[descendant-or-self::*[text()=\"x\"]]").unwrap();
            assert_eq!(tokens[0], Token::Dot);
            assert_eq!(tokens[1], Token::DoubleSlash);
            assert!(tokens.contains(&Token::ColonColon));
            assert!(tokens.contains(&Token::Literal("x".to_string())));
        }

        #[test]
        fn test_rejects_garbage() {
            let dom = page();
            assert!(evaluate(&dom, 0, "//button[").is_err());
            assert!(evaluate(&dom, 0, "//button[@id='x'").is_err());
            assert!(evaluate(&dom, 0, "'abc").is_err());
            assert!(evaluate(&dom, 0, "../x").is_err());
            assert!(evaluate(&dom, 0, "//*[lower-case(.)='a']").is_err());
            assert!(evaluate(&dom, 0, "'just a string'").is_err());
        }
    }

    mod eval_tests {
        use super::*;

        #[test]
        fn test_attribute_predicates() {
            let dom = page();
            assert_eq!(ids(&dom, "//button[@id='b2']"), vec!["b2"]);
            assert_eq!(ids(&dom, "//*[contains(@id, '1')]"), vec!["b1", "d1", "i1"]);
            assert_eq!(ids(&dom, "//input[@type='button' or @type='submit']"), vec!["i1"]);
            assert_eq!(ids(&dom, "//*[@role='button' and @id!='zz']"), vec!["d1"]);
        }

        #[test]
        fn test_text_and_string_value() {
            let dom = page();
            assert!(ids(&dom, ".//button[text()='Submit']").is_empty());
            assert_eq!(ids(&dom, ".//button[contains(text(), 'Submit')]"), vec!["b1"]);
            assert_eq!(ids(&dom, ".//button[contains(., 'Save')]"), vec!["b2"]);
            assert_eq!(
                ids(&dom, ".//button[descendant::*[normalize-space(text())='Save']]"),
                vec!["b2"]
            );
        }

        #[test]
        fn test_union_is_document_ordered_and_deduplicated() {
            let dom = page();
            assert_eq!(
                ids(&dom, "//input[@id='i1'] | //button | //button[@id='b1']"),
                vec!["b1", "b2", "i1"]
            );
        }

        #[test]
        fn test_translate_and_concat() {
            let dom = page();
            assert_eq!(
                ids(
                    &dom,
                    "//*[translate(text(), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')='cancel']"
                ),
                vec!["d1"]
            );
            let quoted = dom
                .nodes
                .iter()
                .position(|n| n.tag == "p")
                .unwrap();
            assert_eq!(
                evaluate(&dom, 0, "//p[@title=concat('O', \"'\", 'Brien \"the\" Great')]").unwrap(),
                vec![quoted]
            );
        }

        #[test]
        fn test_descendant_or_self_matches_own_text() {
            let dom = page();
            assert_eq!(
                ids(&dom, ".//*[descendant-or-self::*[text()='Cancel']]"),
                vec!["d1"]
            );
        }

        #[test]
        fn test_detached_nodes_invisible() {
            let dom = Dom::build(
                MockPage::new()
                    .with(MockElement::new("a").attr("id", "x").detached())
                    .with(MockElement::new("a").attr("id", "y")),
            );
            assert_eq!(ids(&dom, "//a"), vec!["y"]);
        }

        #[test]
        fn test_translate_drops_unmapped_chars() {
            assert_eq!(translate("a-b-c", "-", ""), "abc");
            assert_eq!(translate("ABC", "AB", "ab"), "abC");
        }
    }
}
