//! gcloud-style filter expressions
//!
//! Implements the filter language Google list calls accept
//! (<https://cloud.google.com/sdk/gcloud/reference/topic/filters>) over the JSON
//! rendering of a resource:
//!
//! ```text
//! expr  := unary ((AND | OR | <whitespace>) unary)*
//! unary := NOT unary | "(" expr ")" | "-" key ":" "*" | term
//! term  := key ":" "*" | key op value | key (":(" | "=(") value ([ ,] value)* ")"
//! op    := ":" | "=" | "!=" | "<" | "<=" | ">" | ">=" | "~" | "!~"
//! ```
//!
//! Tokens are recognized with `nom`; the grammar above is walked by hand.
//! `AND` and `OR` may not be mixed in one chain without parentheses.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{anychar, char, multispace0, multispace1, none_of},
    combinator::{cut, eof, map, peek, recognize, value},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("unexpected end of filter expression")]
    UnexpectedEnd,

    /// `position` is a byte offset into the filter text
    #[error("unexpected '{found}' at position {position}")]
    Unexpected { found: char, position: usize },

    #[error("expected a key at position {0}")]
    ExpectedKey(usize),

    #[error("ambiguous mix of AND and OR; add parentheses")]
    Ambiguous,

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Has,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
    NotMatches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Expr {
    Compare {
        key: String,
        op: Op,
        value: String,
        pattern: Option<Regex>,
    },
    AnyOf {
        key: String,
        op: Op,
        values: Vec<String>,
    },
    Defined(String),
    Not(Box<Expr>),
    All(Vec<Expr>),
    Any(Vec<Expr>),
}

/// Compiled filter expression
#[derive(Debug, Clone)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let parser = Parser { source: text };
        let (rest, expr) = parser.expression(text)?;
        let rest = rest.trim_start();
        if !rest.is_empty() {
            return Err(parser.unexpected(rest));
        }
        Ok(Self { expr })
    }

    /// Whether a resource matches
    pub fn matches(&self, resource: &Value) -> bool {
        evaluate(&self.expr, resource)
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// `word` standing alone, followed by whitespace, `(` or the end of input
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), peek(alt((eof, multispace1, tag("(")))))
}

fn connective(input: &str) -> IResult<&str, Logic> {
    alt((
        value(Logic::And, keyword("AND")),
        value(Logic::Or, keyword("OR")),
    ))(input)
}

fn open_paren(input: &str) -> IResult<&str, char> {
    char('(')(input)
}

fn close_paren(input: &str) -> IResult<&str, char> {
    preceded(multispace0, char(')'))(input)
}

fn minus(input: &str) -> IResult<&str, char> {
    terminated(char('-'), multispace0)(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// `a.b.c`
fn dotted_key(input: &str) -> IResult<&str, &str> {
    recognize(separated_list1(char('.'), identifier))(input)
}

/// Longest operators first; the bool marks the list forms `:(` and `=(`
fn operator(input: &str) -> IResult<&str, (Op, bool)> {
    preceded(
        multispace0,
        alt((
            value((Op::Has, true), tag(":(")),
            value((Op::Eq, true), tag("=(")),
            value((Op::Ne, false), tag("!=")),
            value((Op::NotMatches, false), tag("!~")),
            value((Op::Le, false), tag("<=")),
            value((Op::Ge, false), tag(">=")),
            value((Op::Has, false), tag(":")),
            value((Op::Eq, false), tag("=")),
            value((Op::Lt, false), tag("<")),
            value((Op::Gt, false), tag(">")),
            value((Op::Matches, false), tag("~")),
        )),
    )(input)
}

/// `:*` wildcard, followed by whitespace, `)` or the end of input
fn wildcard(input: &str) -> IResult<&str, char> {
    terminated(char('*'), peek(alt((eof, multispace1, tag(")")))))(input)
}

/// `':*'` after a `-`
fn undefined_marker(input: &str) -> IResult<&str, char> {
    preceded(tuple((multispace0, char(':'), multispace0)), char('*'))(input)
}

/// Quoted string with backslash escapes; an unterminated quote is fatal
fn quoted<'a>(quote: char, stop: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    preceded(
        char(quote),
        cut(terminated(
            map(
                many0(alt((preceded(char('\\'), anychar), none_of(stop)))),
                |chars: Vec<char>| chars.into_iter().collect(),
            ),
            char(quote),
        )),
    )
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != ')')(input)
}

fn bare_item(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != ')' && c != ',')(input)
}

fn literal(input: &str) -> IResult<&str, String> {
    alt((
        quoted('\'', "\\'"),
        quoted('"', "\\\""),
        map(bare, str::to_string),
    ))(input)
}

fn list_item(input: &str) -> IResult<&str, String> {
    alt((
        quoted('\'', "\\'"),
        quoted('"', "\\\""),
        map(bare_item, str::to_string),
    ))(input)
}

fn list_separator(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace() || c == ',')(input)
}

/// Items of `:( ... )` / `=( ... )`, up to and including the closing parenthesis
fn list_items(input: &str) -> IResult<&str, Vec<String>> {
    terminated(
        many1(preceded(list_separator, list_item)),
        delimited(list_separator, char(')'), multispace0),
    )(input)
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

struct Parser<'a> {
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn position(&self, rest: &str) -> usize {
        self.source.len() - rest.len()
    }

    fn unexpected(&self, rest: &str) -> FilterError {
        match rest.chars().next() {
            None => FilterError::UnexpectedEnd,
            Some(found) => FilterError::Unexpected {
                found,
                position: self.position(rest),
            },
        }
    }

    /// Convert a token failure into a positioned error
    fn token<T>(&self, result: IResult<&'a str, T>) -> Result<(&'a str, T), FilterError> {
        result.map_err(|err| match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => self.unexpected(e.input),
            nom::Err::Incomplete(_) => FilterError::UnexpectedEnd,
        })
    }

    fn key(&self, input: &'a str) -> Result<(&'a str, String), FilterError> {
        dotted_key(input)
            .map(|(rest, key)| (rest, key.to_string()))
            .map_err(|_| FilterError::ExpectedKey(self.position(input)))
    }

    fn expression(&self, input: &'a str) -> Result<(&'a str, Expr), FilterError> {
        let (mut rest, first) = self.unary(input)?;
        let mut terms = vec![first];
        let mut logic: Option<Logic> = None;

        loop {
            let trimmed = rest.trim_start();
            if trimmed.is_empty() || trimmed.starts_with(')') {
                rest = trimmed;
                break;
            }

            let (after, next) = connective(trimmed).unwrap_or((trimmed, Logic::And));
            if logic.is_some_and(|l| l != next) {
                return Err(FilterError::Ambiguous);
            }
            logic = Some(next);

            let (after, term) = self.unary(after)?;
            terms.push(term);
            rest = after;
        }

        Ok(match (logic, terms.len()) {
            (_, 1) => (rest, terms.remove(0)),
            (Some(Logic::Or), _) => (rest, Expr::Any(terms)),
            _ => (rest, Expr::All(terms)),
        })
    }

    fn unary(&self, input: &'a str) -> Result<(&'a str, Expr), FilterError> {
        let input = input.trim_start();
        if input.is_empty() {
            return Err(FilterError::UnexpectedEnd);
        }

        if let Ok((rest, _)) = keyword("NOT")(input) {
            let (rest, inner) = self.unary(rest)?;
            return Ok((rest, Expr::Not(Box::new(inner))));
        }

        if let Ok((rest, _)) = open_paren(input) {
            let (rest, expr) = self.expression(rest)?;
            let (rest, _) = self.token(close_paren(rest))?;
            return Ok((rest, expr));
        }

        if let Ok((rest, _)) = minus(input) {
            let (rest, key) = self.key(rest)?;
            let (rest, _) = self.token(undefined_marker(rest))?;
            return Ok((rest, Expr::Not(Box::new(Expr::Defined(key)))));
        }

        self.term(input)
    }

    fn term(&self, input: &'a str) -> Result<(&'a str, Expr), FilterError> {
        let (rest, key) = self.key(input)?;
        let (rest, (op, list)) = self.token(operator(rest))?;

        if list {
            let (rest, values) = self.token(list_items(rest))?;
            return Ok((rest, Expr::AnyOf { key, op, values }));
        }

        let rest = rest.trim_start();
        if op == Op::Has {
            if let Ok((rest, _)) = wildcard(rest) {
                return Ok((rest, Expr::Defined(key)));
            }
        }

        let (rest, value) = self.token(literal(rest))?;
        let pattern = match op {
            Op::Matches | Op::NotMatches => Some(compile(&value)?),
            _ => None,
        };
        Ok((
            rest,
            Expr::Compare {
                key,
                op,
                value,
                pattern,
            },
        ))
    }
}

/// Patterns are anchored at the start only, like a prefix match
fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(&format!("^(?:{})", pattern)).map_err(|e| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn lookup<'a>(resource: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(resource, |current, part| current.as_object()?.get(part))
}

fn evaluate(expr: &Expr, resource: &Value) -> bool {
    match expr {
        Expr::Defined(key) => lookup(resource, key).is_some(),
        Expr::Not(inner) => !evaluate(inner, resource),
        Expr::All(terms) => terms.iter().all(|t| evaluate(t, resource)),
        Expr::Any(terms) => terms.iter().any(|t| evaluate(t, resource)),
        Expr::Compare {
            key,
            op,
            value,
            pattern,
        } => match lookup(resource, key) {
            // A key missing from the resource never matches
            None => false,
            Some(actual) => compare(actual, *op, value, pattern.as_ref()),
        },
        Expr::AnyOf { key, op, values } => match lookup(resource, key) {
            None => false,
            Some(actual) => values.iter().any(|v| compare(actual, *op, v, None)),
        },
    }
}

fn compare(actual: &Value, op: Op, expected: &str, pattern: Option<&Regex>) -> bool {
    let text = match actual {
        Value::Array(items) => {
            return items.iter().any(|item| compare(item, op, expected, pattern));
        },
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Object(_) => return false,
    };

    match op {
        Op::Has => has_word(&text, expected),
        Op::Eq => equals(actual, &text, expected),
        Op::Ne => !equals(actual, &text, expected),
        Op::Lt => order(&text, expected) == Ordering::Less,
        Op::Le => order(&text, expected) != Ordering::Greater,
        Op::Gt => order(&text, expected) == Ordering::Greater,
        Op::Ge => order(&text, expected) != Ordering::Less,
        Op::Matches => pattern.is_some_and(|p| p.is_match(&text)),
        Op::NotMatches => pattern.is_some_and(|p| !p.is_match(&text)),
    }
}

/// Lowercased alphanumeric runs of `text`
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `:` matches a run of whole words, ignoring case and punctuation; a trailing
/// `*` lets the last word match as a prefix
fn has_word(text: &str, expected: &str) -> bool {
    let (pattern, prefix) = match expected.strip_suffix('*') {
        Some(pattern) => (pattern, true),
        None => (expected, false),
    };
    let wanted = words(pattern);
    if wanted.is_empty() {
        return text.eq_ignore_ascii_case(pattern);
    }

    let haystack = words(text);
    let last = wanted.len() - 1;
    haystack.windows(wanted.len()).any(|window| {
        window.iter().zip(&wanted).enumerate().all(|(i, (word, want))| {
            if prefix && i == last {
                word.starts_with(want.as_str())
            } else {
                word == want
            }
        })
    })
}

fn equals(actual: &Value, text: &str, expected: &str) -> bool {
    match actual {
        Value::Bool(_) => text.eq_ignore_ascii_case(expected),
        Value::Number(_) => match (text.parse::<f64>(), expected.parse::<f64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => text == expected,
        },
        _ => text == expected,
    }
}

/// Numeric order when both sides are numbers, lexicographic otherwise
fn order(text: &str, expected: &str) -> Ordering {
    match (text.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => text.cmp(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(filter: &str, resource: &Value) -> bool {
        Filter::parse(filter)
            .unwrap_or_else(|e| panic!("'{}' failed to parse: {}", filter, e))
            .matches(resource)
    }

    #[test]
    fn test_simple_match() {
        assert!(matches("name=instance", &json!({"name": "instance"})));
        assert!(!matches("name=instance", &json!({"name": "nonstance"})));
    }

    #[test]
    fn test_simple_forms_parse() {
        let instance = json!({"name": "instance"});
        for filter in [
            "name:instance-1",
            "zone:( europe-west1-d )",
            "zone:( europe-west1-d, other-zone )",
            "zone:( europe-west1-d other-zone )",
            "name=wordpress-dev",
            "name:'Compute Engine default service account'",
            "name != example-instance",
            "tags.items~^production$",
            "name~^es",
            "scheduling.automaticRestart = false",
            "zone :*",
            "- zone:*",
        ] {
            matches(filter, &instance);
        }
    }

    #[test]
    fn test_logical_forms_parse() {
        let instance = json!({"name": "instance"});
        for filter in [
            "NOT name:instance-1",
            "labels.env=test AND labels.version=alpha",
            "tags.items~^production$ AND tags.items~^european$",
            "network:mynetwork AND name=mynetwork-deny-icmp",
            "NOT tags:* AND timestamp.datetime < '2018-10-01'",
            "(scheduling.automaticRestart = true) (cpuPlatform = 'Intel Skylake')",
            "cpuPlatform = 'Skylake' OR (cpuPlatform = 'Broadwell' AND automaticRestart = true)",
            "(cpuPlatform = 'Skylake' OR cpuPlatform = 'Broadwell') AND automaticRestart = true",
            "NOT network=default",
            "a=a AND b=b AND c=c",
            "NOT a=a AND b=b",
        ] {
            matches(filter, &instance);
        }
    }

    #[test]
    fn test_mixed_and_or_is_ambiguous() {
        let err = Filter::parse(
            "cpuPlatform = 'Skylake' OR cpuPlatform = 'Broadwell' AND automaticRestart = true",
        )
        .unwrap_err();
        assert_eq!(err, FilterError::Ambiguous);
    }

    #[test]
    fn test_other_expressions_parse() {
        assert!(Filter::parse("email ~ [0-9]*-compute@.*").is_ok());
        let member = "bindings.members:serviceAccount:terraform@foo.iam.gserviceaccount.com";
        assert!(Filter::parse(member).is_ok());
    }

    #[test]
    fn test_compare_list() {
        let instance = json!({"zone": "europe-west1-d"});
        for filter in [
            "zone:( europe-west1-d )",
            "zone:( europe-west1-d, other-zone )",
            "zone:( europe-west1-d other-zone )",
            "zone:( other-zone europe-west1-d )",
            "zone:( other-zone, europe-west1-d )",
            "zone=(other-zone, europe-west1-d)",
        ] {
            assert!(matches(filter, &instance), "{}", filter);
        }
        assert!(!matches("zone:( us-east1-b )", &instance));
    }

    #[test]
    fn test_is_defined() {
        let instance = json!({"name": "instance", "l1": {"l2": "foo"}});
        for (filter, expected) in [
            ("name :*", true),
            ("- name :*", false),
            ("- zone:*", true),
            ("zone:*", false),
            ("l1:*", true),
            ("l1.l2:*", true),
        ] {
            assert_eq!(matches(filter, &instance), expected, "{}", filter);
        }
    }

    #[test]
    fn test_quoted_values() {
        let instance = json!({"name": "n1-standard-1", "description": "1 vCPU, 3.75 GB RAM"});
        assert!(matches("name='n1-standard-1'", &instance));
        assert!(matches("name=\"n1-standard-1\"", &instance));
        assert!(matches("description:vCPU", &instance));
        assert!(matches("description:'3.75'", &instance));
    }

    #[test]
    fn test_has_matches_words_ignoring_case_and_punctuation() {
        let instance = json!({
            "description": "Efficient Instance, 2 vCPU (1/2 shared physical core)"
        });
        assert!(matches("description:vcpu", &instance));
        assert!(matches("description:INSTANCE", &instance));
        assert!(matches("description:'shared physical'", &instance));
        assert!(matches("description:phys*", &instance));
        assert!(!matches("description:'physical shared'", &instance));
        assert!(!matches("description:effic", &instance));
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(
            Filter::parse("name=a )").unwrap_err(),
            FilterError::Unexpected {
                found: ')',
                position: 7
            }
        );
        assert_eq!(Filter::parse("name='open").unwrap_err(), FilterError::UnexpectedEnd);
        assert_eq!(Filter::parse("zone:(a, b").unwrap_err(), FilterError::UnexpectedEnd);
        assert_eq!(Filter::parse("name=a AND 9=b").unwrap_err(), FilterError::ExpectedKey(11));
        assert!(Filter::parse("zone:()").is_err());
    }

    #[test]
    fn test_quoted_escapes() {
        let instance = json!({"name": "it's"});
        assert!(matches(r"name='it\'s'", &instance));
        assert!(matches("name=\"it's\"", &instance));
        assert!(matches("name=''", &json!({"name": ""})));
    }

    #[test]
    fn test_numeric_and_bool_comparisons() {
        let instance = json!({
            "guestCpus": 2,
            "memoryMb": 7680,
            "scheduling": {"automaticRestart": true}
        });
        assert!(matches("guestCpus=2", &instance));
        assert!(matches("guestCpus>1", &instance));
        assert!(matches("memoryMb<=7680", &instance));
        assert!(!matches("memoryMb<1000", &instance));
        assert!(matches("scheduling.automaticRestart=true", &instance));
        assert!(matches("scheduling.automaticRestart!=false", &instance));
    }

    #[test]
    fn test_regex_anchored_at_start() {
        let instance = json!({"name": "es-node-1"});
        assert!(matches("name~^es", &instance));
        assert!(matches("name~node", &instance) == false);
        assert!(matches("name!~node", &instance));
    }

    #[test]
    fn test_array_values_match_any_element() {
        let instance = json!({"tags": {"items": ["production", "european"]}});
        assert!(matches("tags.items~^production$ AND tags.items~^european$", &instance));
        assert!(matches("tags.items:production", &instance));
        assert!(!matches("tags.items:staging", &instance));
    }

    #[test]
    fn test_prefix_wildcard() {
        let instance = json!({"name": "web-frontend"});
        assert!(matches("name:web*", &instance));
        assert!(!matches("name:api*", &instance));
    }

    #[test]
    fn test_logic() {
        let instance = json!({"name": "a", "zone": "z1"});
        assert!(matches("name=a zone=z1", &instance));
        assert!(!matches("name=a AND zone=z2", &instance));
        assert!(matches("name=b OR zone=z1", &instance));
        assert!(matches("NOT name=b", &instance));
        assert!(matches("(name=b OR name=a) AND zone=z1", &instance));
    }

    #[test]
    fn test_missing_key_never_matches() {
        let instance = json!({"name": "a"});
        assert!(!matches("zone=z1", &instance));
        assert!(!matches("zone!=z1", &instance));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(Filter::parse("").is_err());
        assert!(Filter::parse("name=").is_err());
        assert!(Filter::parse("(name=a").is_err());
        assert!(Filter::parse("name=a)").is_err());
        assert!(Filter::parse("=a").is_err());
        assert!(matches!(
            Filter::parse("name~(unclosed"),
            Err(FilterError::InvalidPattern { .. })
        ));
    }
}
