//! SPDX license expressions
//!
//! Parses compound expressions such as `MIT OR Apache-2.0`,
//! `GPL-2.0-only WITH Classpath-exception-2.0` and
//! `(MIT AND BSD-2-Clause) OR Apache-2.0`.
//! Precedence: WITH binds tightest, then AND, then OR.

use std::fmt;

use crate::errors::{DomainError, DomainResult};

/// A parsed SPDX license expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpdxExpression {
    /// Single license identifier, e.g. `MIT` or `LicenseRef-foo`
    License(String),
    /// License with exception, e.g. `GPL-2.0-only WITH Classpath-exception-2.0`
    With { license: String, exception: String },
    /// Both sides apply
    And(Box<SpdxExpression>, Box<SpdxExpression>),
    /// Either side may be chosen
    Or(Box<SpdxExpression>, Box<SpdxExpression>),
}

impl SpdxExpression {
    /// Parse an expression
    pub fn parse(input: &str) -> DomainResult<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(invalid("expression cannot be empty"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected token '{}'", token)));
        }
        Ok(expr)
    }

    /// Check that a string is a valid expression
    pub fn validate(input: &str) -> DomainResult<()> {
        Self::parse(input).map(|_| ())
    }

    /// All license identifiers referenced by the expression, in order
    pub fn licenses(&self) -> Vec<&str> {
        match self {
            Self::License(id) => vec![id.as_str()],
            Self::With { license, .. } => vec![license.as_str()],
            Self::And(a, b) | Self::Or(a, b) => {
                let mut ids = a.licenses();
                ids.extend(b.licenses());
                ids
            }
        }
    }

    /// Join expressions with AND, skipping duplicates.
    ///
    /// Returns `None` when `expressions` is empty. Inputs that fail to parse
    /// are kept verbatim as opaque operands.
    pub fn conjunction<'a>(expressions: impl IntoIterator<Item = &'a str>) -> Option<String> {
        let mut seen: Vec<String> = Vec::new();
        for expression in expressions {
            let rendered = match Self::parse(expression) {
                Ok(parsed) => parsed.to_string(),
                Err(_) => expression.trim().to_string(),
            };
            if !rendered.is_empty() && !seen.contains(&rendered) {
                seen.push(rendered);
            }
        }

        match seen.len() {
            0 => None,
            1 => seen.pop(),
            _ => Some(
                seen.iter()
                    .map(|expr| {
                        if expr.contains(" OR ") || expr.contains(" AND ") {
                            format!("({})", expr)
                        } else {
                            expr.clone()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" AND "),
            ),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 0,
            Self::And(..) => 1,
            Self::License(_) | Self::With { .. } => 2,
        }
    }

    /// Operators are left-associative, so a right operand of equal
    /// precedence keeps its parentheses.
    fn fmt_operand(&self, operand: &Self, right: bool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needs_parens = if right {
            operand.precedence() <= self.precedence()
        } else {
            operand.precedence() < self.precedence()
        };
        if needs_parens {
            write!(f, "({})", operand)
        } else {
            write!(f, "{}", operand)
        }
    }
}

impl fmt::Display for SpdxExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::License(id) => f.write_str(id),
            Self::With { license, exception } => write!(f, "{} WITH {}", license, exception),
            Self::And(a, b) => {
                self.fmt_operand(a, false, f)?;
                f.write_str(" AND ")?;
                self.fmt_operand(b, true, f)
            }
            Self::Or(a, b) => {
                self.fmt_operand(a, false, f)?;
                f.write_str(" OR ")?;
                self.fmt_operand(b, true, f)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(id) => f.write_str(id),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::With => f.write_str("WITH"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn invalid(reason: impl Into<String>) -> DomainError {
    DomainError::validation("licenseExpression", reason)
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | ':')
}

fn tokenize(input: &str) -> DomainResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            c if is_identifier_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_identifier_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" | "and" => Token::And,
                    "OR" | "or" => Token::Or,
                    "WITH" | "with" => Token::With,
                    _ => Token::Identifier(word),
                });
            }
            other => return Err(invalid(format!("invalid character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> DomainResult<SpdxExpression> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = SpdxExpression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> DomainResult<SpdxExpression> {
        let mut left = self.parse_with()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_with()?;
            left = SpdxExpression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_with(&mut self) -> DomainResult<SpdxExpression> {
        let base = self.parse_primary()?;
        if self.peek() != Some(&Token::With) {
            return Ok(base);
        }
        self.pos += 1;

        let SpdxExpression::License(license) = base else {
            return Err(invalid("WITH must follow a license identifier"));
        };
        match self.next() {
            Some(Token::Identifier(exception)) => Ok(SpdxExpression::With { license, exception }),
            _ => Err(invalid("expected exception identifier after WITH")),
        }
    }

    fn parse_primary(&mut self) -> DomainResult<SpdxExpression> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(invalid("missing closing parenthesis")),
                }
            }
            Some(Token::Identifier(id)) => Ok(SpdxExpression::License(id)),
            Some(token) => Err(invalid(format!("unexpected token '{}'", token))),
            None => Err(invalid("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        let expr = SpdxExpression::parse("MIT").unwrap();
        assert_eq!(expr, SpdxExpression::License("MIT".into()));
        assert_eq!(expr.licenses(), vec!["MIT"]);
    }

    #[test]
    fn test_precedence() {
        let expr = SpdxExpression::parse("MIT OR Apache-2.0 AND BSD-3-Clause").unwrap();
        assert!(matches!(expr, SpdxExpression::Or(..)));
        assert_eq!(expr.to_string(), "MIT OR Apache-2.0 AND BSD-3-Clause");

        let grouped = SpdxExpression::parse("(MIT OR Apache-2.0) AND BSD-3-Clause").unwrap();
        assert!(matches!(grouped, SpdxExpression::And(..)));
        assert_eq!(grouped.to_string(), "(MIT OR Apache-2.0) AND BSD-3-Clause");

        let right = SpdxExpression::parse("MIT AND (ISC AND Zlib)").unwrap();
        assert_eq!(right.to_string(), "MIT AND (ISC AND Zlib)");
    }

    #[test]
    fn test_with_exception() {
        let expr = SpdxExpression::parse("GPL-2.0-only WITH Classpath-exception-2.0").unwrap();
        assert!(matches!(expr, SpdxExpression::With { .. }));
        assert_eq!(expr.licenses(), vec!["GPL-2.0-only"]);
    }

    #[test]
    fn test_license_refs() {
        assert!(SpdxExpression::validate("LicenseRef-scancode-public-domain").is_ok());
        assert!(SpdxExpression::validate("NOASSERTION").is_ok());
        assert!(SpdxExpression::validate("GPL-2.0+").is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(SpdxExpression::validate("").is_err());
        assert!(SpdxExpression::validate("MIT OR").is_err());
        assert!(SpdxExpression::validate("(MIT").is_err());
        assert!(SpdxExpression::validate("MIT)").is_err());
        assert!(SpdxExpression::validate("MIT, Apache-2.0").is_err());
        assert!(SpdxExpression::validate("(MIT OR ISC) WITH foo").is_err());
    }

    #[test]
    fn test_conjunction() {
        assert_eq!(SpdxExpression::conjunction(Vec::<&str>::new()), None);
        assert_eq!(
            SpdxExpression::conjunction(["MIT", "MIT"]),
            Some("MIT".to_string())
        );
        assert_eq!(
            SpdxExpression::conjunction(["MIT", "Apache-2.0 OR ISC"]),
            Some("MIT AND (Apache-2.0 OR ISC)".to_string())
        );
    }
}
