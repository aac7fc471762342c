//! Parser for the brace template language
//!
//! ```text
//! {{ action.context.sourceName }}            escaped output
//! {{{ action.context.logoUrl | default:"" }}} raw output
//! {% if action.events %} ... {% else %} ... {% endif %}
//! {% for event in action.events %} ... {% endfor %}
//! ```

use std::iter::Peekable;
use std::vec::IntoIter;

use chrono::format::{Item, StrftimeItems};
use serde_json::{Number, Value};

use super::types::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output {
        expr: Expr,
        raw: bool,
    },
    If {
        condition: Condition,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Path(Vec<String>),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub operand: Operand,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    Default(Value),
    Upper,
    Lower,
    Trim,
    Length,
    Join(String),
    Pluralize { singular: String, plural: String },
    Date(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub negated: bool,
    pub left: Expr,
    pub compare: Option<(Comparison, Expr)>,
}

/// Parse template source into a node tree
pub(crate) fn parse(source: &str) -> TemplateResult<Vec<Node>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };
    let (nodes, _) = parser.parse_block(&[])?;
    Ok(nodes)
}

// ============================================================================
// Template tokens
// ============================================================================

#[derive(Debug)]
enum Token {
    Text(String),
    Output {
        source: String,
        raw: bool,
        offset: usize,
    },
    Tag {
        source: String,
        offset: usize,
    },
}

fn tokenize(source: &str) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let next = match (rest.find("{{"), rest.find("{%")) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let Some(start) = next else {
            tokens.push(Token::Text(rest.to_string()));
            break;
        };

        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }

        let open = pos + start;
        let tail = &source[open..];
        let (open_len, close) = if tail.starts_with("{{{") {
            (3, "}}}")
        } else if tail.starts_with("{{") {
            (2, "}}")
        } else {
            (2, "%}")
        };

        let inner_start = open + open_len;
        let Some(end) = source[inner_start..].find(close) else {
            return Err(TemplateError::syntax(
                open,
                format!("unterminated tag, expected `{}`", close),
            ));
        };

        let inner = source[inner_start..inner_start + end].trim().to_string();
        if inner.is_empty() {
            return Err(TemplateError::syntax(open, "empty tag"));
        }

        tokens.push(match close {
            "%}" => Token::Tag {
                source: inner,
                offset: open,
            },
            _ => Token::Output {
                source: inner,
                raw: open_len == 3,
                offset: open,
            },
        });

        pos = inner_start + end + close.len();
    }

    Ok(tokens)
}

// ============================================================================
// Block structure
// ============================================================================

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    /// Parse nodes until one of `terminators` (or end of input) is reached.
    /// Returns the terminator keyword that closed the block.
    fn parse_block(&mut self, terminators: &[&str]) -> TemplateResult<(Vec<Node>, Option<String>)> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Output {
                    source,
                    raw,
                    offset,
                } => {
                    let expr = ExprParser::new(&source, offset)?.parse_complete_expr()?;
                    nodes.push(Node::Output { expr, raw });
                }
                Token::Tag { source, offset } => {
                    let (keyword, rest) = split_keyword(&source);
                    if terminators.contains(&keyword) {
                        return Ok((nodes, Some(keyword.to_string())));
                    }
                    match keyword {
                        "if" => nodes.push(self.parse_if(rest, offset)?),
                        "for" => nodes.push(self.parse_for(rest, offset)?),
                        other => {
                            return Err(TemplateError::syntax(
                                offset,
                                format!("unexpected tag `{}`", other),
                            ))
                        }
                    }
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_if(&mut self, rest: &str, offset: usize) -> TemplateResult<Node> {
        let condition = ExprParser::new(rest, offset)?.parse_condition()?;

        let (then_branch, end) = self.parse_block(&["else", "endif"])?;
        let else_branch = match end.as_deref() {
            Some("else") => match self.parse_block(&["endif"])? {
                (nodes, Some(_)) => nodes,
                (_, None) => return Err(TemplateError::syntax(offset, "unclosed `if` block")),
            },
            Some(_) => Vec::new(),
            None => return Err(TemplateError::syntax(offset, "unclosed `if` block")),
        };

        Ok(Node::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_for(&mut self, rest: &str, offset: usize) -> TemplateResult<Node> {
        let (binding, rest) = split_keyword(rest);
        if binding.is_empty() || !binding.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(TemplateError::syntax(
                offset,
                format!("invalid loop variable `{}`", binding),
            ));
        }

        let (keyword, iterable_source) = split_keyword(rest);
        if keyword != "in" {
            return Err(TemplateError::syntax(offset, "expected `in` in `for` tag"));
        }

        let iterable = ExprParser::new(iterable_source, offset)?.parse_complete_expr()?;

        let (body, end) = self.parse_block(&["endfor"])?;
        if end.is_none() {
            return Err(TemplateError::syntax(offset, "unclosed `for` block"));
        }

        Ok(Node::For {
            binding: binding.to_string(),
            iterable,
            body,
        })
    }
}

fn split_keyword(source: &str) -> (&str, &str) {
    let source = source.trim();
    match source.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim_start()),
        None => (source, ""),
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Word(String),
    Str(String),
    Pipe,
    Colon,
    Comma,
    Eq,
    Ne,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn lex_expr(source: &str, offset: usize) -> TemplateResult<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '|' => tokens.push(ExprToken::Pipe),
            ':' => tokens.push(ExprToken::Colon),
            ',' => tokens.push(ExprToken::Comma),
            '=' | '!' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(if c == '=' { ExprToken::Eq } else { ExprToken::Ne });
                } else {
                    return Err(TemplateError::syntax(
                        offset + i,
                        format!("unexpected `{}`", c),
                    ));
                }
            }
            '"' | '\'' => {
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            literal.push(escaped);
                        }
                    } else if ch == c {
                        closed = true;
                        break;
                    } else {
                        literal.push(ch);
                    }
                }
                if !closed {
                    return Err(TemplateError::syntax(offset + i, "unterminated string literal"));
                }
                tokens.push(ExprToken::Str(literal));
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(ExprToken::Word(word));
            }
            other => {
                return Err(TemplateError::syntax(
                    offset + i,
                    format!("unexpected `{}`", other),
                ))
            }
        }
    }

    Ok(tokens)
}

fn literal_value(word: &str) -> Option<Value> {
    match word {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }

    let numeric_start = word
        .trim_start_matches('-')
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    if !numeric_start {
        return None;
    }

    if let Ok(int) = word.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    word.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
    offset: usize,
}

impl ExprParser {
    fn new(source: &str, offset: usize) -> TemplateResult<Self> {
        Ok(Self {
            tokens: lex_expr(source, offset)?,
            pos: 0,
            offset,
        })
    }

    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(self.offset, message)
    }

    fn expect_end(&self) -> TemplateResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected trailing input {:?}", token))),
        }
    }

    fn parse_complete_expr(mut self) -> TemplateResult<Expr> {
        let expr = self.parse_expr()?;
        self.expect_end()?;
        Ok(expr)
    }

    fn parse_condition(mut self) -> TemplateResult<Condition> {
        let negated = matches!(self.peek(), Some(ExprToken::Word(w)) if w == "not");
        if negated {
            self.pos += 1;
        }

        let left = self.parse_expr()?;
        let compare = match self.peek() {
            Some(ExprToken::Eq) => {
                self.pos += 1;
                Some((Comparison::Eq, self.parse_expr()?))
            }
            Some(ExprToken::Ne) => {
                self.pos += 1;
                Some((Comparison::Ne, self.parse_expr()?))
            }
            _ => None,
        };

        self.expect_end()?;
        Ok(Condition {
            negated,
            left,
            compare,
        })
    }

    fn parse_expr(&mut self) -> TemplateResult<Expr> {
        let operand = match self.next() {
            Some(ExprToken::Str(s)) => Operand::Literal(Value::String(s)),
            Some(ExprToken::Word(word)) => match literal_value(&word) {
                Some(value) => Operand::Literal(value),
                None => {
                    let segments: Vec<String> = word.split('.').map(String::from).collect();
                    if segments.iter().any(|s| s.is_empty()) {
                        return Err(self.error(format!("invalid path `{}`", word)));
                    }
                    Operand::Path(segments)
                }
            },
            other => return Err(self.error(format!("expected a value, found {:?}", other))),
        };

        let mut filters = Vec::new();
        while self.peek() == Some(&ExprToken::Pipe) {
            self.pos += 1;
            filters.push(self.parse_filter()?);
        }

        Ok(Expr { operand, filters })
    }

    fn parse_filter(&mut self) -> TemplateResult<Filter> {
        let name = match self.next() {
            Some(ExprToken::Word(name)) => name,
            other => return Err(self.error(format!("expected filter name, found {:?}", other))),
        };

        let mut args = Vec::new();
        if self.peek() == Some(&ExprToken::Colon) {
            self.pos += 1;
            loop {
                args.push(self.parse_literal()?);
                if self.peek() == Some(&ExprToken::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }

        self.build_filter(&name, args)
    }

    fn parse_literal(&mut self) -> TemplateResult<Value> {
        match self.next() {
            Some(ExprToken::Str(s)) => Ok(Value::String(s)),
            Some(ExprToken::Word(word)) => literal_value(&word)
                .ok_or_else(|| self.error(format!("filter argument `{}` must be a literal", word))),
            other => Err(self.error(format!("expected filter argument, found {:?}", other))),
        }
    }

    fn build_filter(&self, name: &str, args: Vec<Value>) -> TemplateResult<Filter> {
        let arity = |expected: &[usize]| -> TemplateResult<()> {
            if expected.contains(&args.len()) {
                Ok(())
            } else {
                Err(self.error(format!(
                    "filter `{}` takes {:?} argument(s), got {}",
                    name,
                    expected,
                    args.len()
                )))
            }
        };

        let filter = match name {
            "default" => {
                arity(&[1])?;
                Filter::Default(args[0].clone())
            }
            "upper" => {
                arity(&[0])?;
                Filter::Upper
            }
            "lower" => {
                arity(&[0])?;
                Filter::Lower
            }
            "trim" => {
                arity(&[0])?;
                Filter::Trim
            }
            "length" => {
                arity(&[0])?;
                Filter::Length
            }
            "join" => {
                arity(&[0, 1])?;
                Filter::Join(args.first().map(literal_text).unwrap_or_else(|| ", ".to_string()))
            }
            "pluralize" => {
                arity(&[0, 1, 2])?;
                let (singular, plural) = match args.as_slice() {
                    [] => (String::new(), "s".to_string()),
                    [plural] => (String::new(), literal_text(plural)),
                    [singular, plural, ..] => (literal_text(singular), literal_text(plural)),
                };
                Filter::Pluralize { singular, plural }
            }
            "date" => {
                arity(&[1])?;
                let format = literal_text(&args[0]);
                if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
                    return Err(self.error(format!("invalid date format `{}`", format)));
                }
                Filter::Date(format)
            }
            other => return Err(self.error(format!("unknown filter `{}`", other))),
        };

        Ok(filter)
    }
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
