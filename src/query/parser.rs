use chrono::{DateTime, Utc};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::FieldValue;
use crate::query::ast::{BoolQuery, PrefixQuery, Query, RangeQuery, TermQuery, WildcardQuery};

/// Query parser for converting string queries to AST
///
/// Accepts the Lucene query-string dialect:
/// - `rust programming` -> clauses joined by the default operator
/// - `rust AND programming`, `a && b`, `a || b`, `+a -b`, `NOT a`, `!a`
/// - `title:rust`, `title:(rust OR go)`
/// - `"exact value"` -> every analyzed term must match
/// - `Price_Range:[10 TO 100]`, `Name:{a TO *]`
/// - `rus*` -> prefix, `r?st` / `*ust` -> wildcard, `*:*` -> match all
/// - `rust^2` -> boosted clause
#[derive(Debug, Clone)]
pub struct QueryParser {
    pub default_field: String,
    pub default_operator: BooleanOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanOperator {
    And,
    #[default]
    Or,
}

impl QueryParser {
    pub fn new() -> Self {
        QueryParser {
            default_field: "content".to_string(),
            default_operator: BooleanOperator::Or,
        }
    }

    pub fn with_default_field(mut self, field: &str) -> Self {
        self.default_field = field.to_string();
        self
    }

    pub fn with_default_operator(mut self, operator: BooleanOperator) -> Self {
        self.default_operator = operator;
        self
    }

    /// Parse a query string into Query AST. Blank input matches everything.
    pub fn parse(&self, input: &str) -> Result<Query> {
        if input.trim().is_empty() {
            return Ok(Query::MatchAll);
        }

        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            default_operator: self.default_operator,
        };

        let query = parser.parse_query(&self.default_field)?;
        if parser.pos < parser.tokens.len() {
            return Err(parse_error(format!("Unexpected token at position {} in '{}'", parser.pos, input)));
        }
        Ok(query)
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_error(context: String) -> Error {
    Error::new(ErrorKind::Parse, context)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Colon,
    And,
    Or,
    Not,
    Required,
    Prohibited,
    Boost(f32),
    Word { text: String, wildcard: bool },
    Quoted(String),
    Range {
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Lexer { chars: input.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let token = match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                '(' => { self.pos += 1; Token::LParen }
                ')' => { self.pos += 1; Token::RParen }
                ':' => { self.pos += 1; Token::Colon }
                '+' => { self.pos += 1; Token::Required }
                '-' => { self.pos += 1; Token::Prohibited }
                '!' => { self.pos += 1; Token::Not }
                '&' if self.peek_at(1) == Some('&') => { self.pos += 2; Token::And }
                '|' if self.peek_at(1) == Some('|') => { self.pos += 2; Token::Or }
                '^' => self.read_boost()?,
                '"' => Token::Quoted(self.read_quoted()?),
                '[' | '{' => self.read_range()?,
                _ => self.read_word()?,
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn read_boost(&mut self) -> Result<Token> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f32>()
            .map(Token::Boost)
            .map_err(|_| parse_error(format!("Invalid boost '{}'", text)))
    }

    fn read_quoted(&mut self) -> Result<String> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(parse_error("Unterminated quoted string".to_string())),
                Some('"') => {
                    self.pos += 1;
                    return Ok(text);
                }
                Some('\\') => {
                    self.pos += 1;
                    if let Some(escaped) = self.peek() {
                        text.push(escaped);
                        self.pos += 1;
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_word(&mut self) -> Result<Token> {
        let mut text = String::new();
        let mut wildcard = false;
        let mut escaped = false;

        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.pos += 1;
                    if let Some(next) = self.peek() {
                        text.push(next);
                        self.pos += 1;
                        escaped = true;
                    }
                    continue;
                }
                c if c.is_whitespace() => break,
                '(' | ')' | ':' | '^' | '"' | '[' | ']' | '{' | '}' => break,
                '*' | '?' => wildcard = true,
                _ => {}
            }
            text.push(c);
            self.pos += 1;
        }

        if text.is_empty() {
            return Err(parse_error(format!(
                "Unexpected character '{}' at position {}",
                self.peek().unwrap_or(' '),
                self.pos
            )));
        }

        Ok(match text.as_str() {
            "AND" if !escaped => Token::And,
            "OR" if !escaped => Token::Or,
            "NOT" if !escaped => Token::Not,
            _ => Token::Word { text, wildcard },
        })
    }

    fn read_range(&mut self) -> Result<Token> {
        let include_lower = self.peek() == Some('[');
        self.pos += 1;

        self.skip_whitespace();
        let lower = self.read_range_bound()?;
        self.skip_whitespace();

        let keyword = self.read_range_bound()?;
        if keyword.as_deref() != Some("TO") {
            return Err(parse_error("Range must be written as [lower TO upper]".to_string()));
        }

        self.skip_whitespace();
        let upper = self.read_range_bound()?;
        self.skip_whitespace();

        let include_upper = match self.peek() {
            Some(']') => true,
            Some('}') => false,
            _ => return Err(parse_error("Unterminated range".to_string())),
        };
        self.pos += 1;

        Ok(Token::Range { lower, upper, include_lower, include_upper })
    }

    /// `*` is an open bound.
    fn read_range_bound(&mut self) -> Result<Option<String>> {
        if self.peek() == Some('"') {
            return self.read_quoted().map(Some);
        }

        let start = self.pos;
        while self.peek().is_some_and(|c| !c.is_whitespace() && c != ']' && c != '}') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.as_str() {
            "" => Err(parse_error("Missing range bound".to_string())),
            "*" => Ok(None),
            _ => Ok(Some(text)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Not,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    default_operator: BooleanOperator,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_group_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::RParen))
    }

    fn parse_query(&mut self, field: &str) -> Result<Query> {
        let mut clauses: Vec<(Occur, Query)> = Vec::new();

        while !self.at_group_end() {
            let conjunction = match self.peek() {
                Some(Token::And) => { self.pos += 1; Conjunction::And }
                Some(Token::Or) => { self.pos += 1; Conjunction::Or }
                _ => Conjunction::None,
            };
            let modifier = match self.peek() {
                Some(Token::Required) => { self.pos += 1; Modifier::Required }
                Some(Token::Prohibited) | Some(Token::Not) => { self.pos += 1; Modifier::Not }
                _ => Modifier::None,
            };

            if self.at_group_end() {
                return Err(parse_error("Operator is missing its operand".to_string()));
            }

            let query = self.parse_clause(field)?;
            self.add_clause(&mut clauses, conjunction, modifier, query);
        }

        Ok(build_bool(clauses))
    }

    /// Clause occurrence follows the classic query-parser rules: an `AND`
    /// makes the previous optional clause required, and under a default
    /// `AND` operator an `OR` makes the previous required clause optional.
    fn add_clause(
        &self,
        clauses: &mut Vec<(Occur, Query)>,
        conjunction: Conjunction,
        modifier: Modifier,
        query: Query,
    ) {
        if let Some(last) = clauses.last_mut() {
            if conjunction == Conjunction::And && last.0 == Occur::Should {
                last.0 = Occur::Must;
            }
            if self.default_operator == BooleanOperator::And
                && conjunction == Conjunction::Or
                && last.0 == Occur::Must
            {
                last.0 = Occur::Should;
            }
        }

        let occur = match modifier {
            Modifier::Not => Occur::MustNot,
            Modifier::Required => Occur::Must,
            Modifier::None => match (self.default_operator, conjunction) {
                (_, Conjunction::And) => Occur::Must,
                (BooleanOperator::And, Conjunction::None) => Occur::Must,
                _ => Occur::Should,
            },
        };

        clauses.push((occur, query));
    }

    fn parse_clause(&mut self, field: &str) -> Result<Query> {
        let query = match self.next() {
            Some(Token::LParen) => self.parse_group(field)?,
            Some(Token::Word { text, .. }) if self.peek() == Some(&Token::Colon) => {
                self.pos += 1;
                match self.next() {
                    Some(Token::LParen) => self.parse_group(&text)?,
                    Some(token) => value_query(&text, token)?,
                    None => return Err(parse_error(format!("Field '{}' has no value", text))),
                }
            }
            Some(token) => value_query(field, token)?,
            None => return Err(parse_error("Unexpected end of query".to_string())),
        };

        if let Some(Token::Boost(boost)) = self.peek() {
            let boost = *boost;
            self.pos += 1;
            return Ok(query.with_boost(boost));
        }

        Ok(query)
    }

    fn parse_group(&mut self, field: &str) -> Result<Query> {
        let query = self.parse_query(field)?;
        match self.next() {
            Some(Token::RParen) => Ok(query),
            _ => Err(parse_error("Missing closing parenthesis".to_string())),
        }
    }
}

fn build_bool(clauses: Vec<(Occur, Query)>) -> Query {
    if clauses.is_empty() {
        return Query::MatchAll;
    }
    if clauses.len() == 1 && clauses[0].0 != Occur::MustNot {
        if let Some((_, query)) = clauses.into_iter().next() {
            return query;
        }
        return Query::MatchAll;
    }

    let mut bool_query = BoolQuery::new();
    for (occur, query) in clauses {
        match occur {
            Occur::Must => bool_query.must.push(query),
            Occur::Should => bool_query.should.push(query),
            Occur::MustNot => bool_query.must_not.push(query),
        }
    }

    // A purely negative query subtracts from everything.
    if bool_query.must.is_empty() && bool_query.should.is_empty() {
        bool_query.must.push(Query::MatchAll);
    }

    Query::Bool(bool_query)
}

fn value_query(field: &str, token: Token) -> Result<Query> {
    match token {
        Token::Word { text, wildcard: false } | Token::Quoted(text) => Ok(Query::Term(TermQuery {
            field: field.to_string(),
            value: text,
            boost: None,
        })),
        Token::Word { text, wildcard: true } => {
            if field == "*" && text == "*" {
                return Ok(Query::MatchAll);
            }
            match text.strip_suffix('*') {
                Some(stem) if !stem.contains(['*', '?']) => Ok(Query::Prefix(PrefixQuery {
                    field: field.to_string(),
                    prefix: stem.to_string(),
                    boost: None,
                })),
                _ => Ok(Query::Wildcard(WildcardQuery {
                    field: field.to_string(),
                    pattern: text,
                    boost: None,
                })),
            }
        }
        Token::Range { lower, upper, include_lower, include_upper } => {
            let lower = lower.map(|text| parse_bound(&text));
            let upper = upper.map(|text| parse_bound(&text));
            Ok(Query::Range(RangeQuery {
                field: field.to_string(),
                gt: if include_lower { None } else { lower.clone() },
                gte: if include_lower { lower } else { None },
                lt: if include_upper { None } else { upper.clone() },
                lte: if include_upper { upper } else { None },
                boost: None,
            }))
        }
        other => Err(parse_error(format!("Expected a value, found {:?}", other))),
    }
}

fn parse_bound(text: &str) -> FieldValue {
    if let Ok(num) = text.parse::<f64>() {
        return FieldValue::Number(num);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return FieldValue::Date(date.with_timezone(&Utc));
    }
    FieldValue::Text(text.to_string())
}
