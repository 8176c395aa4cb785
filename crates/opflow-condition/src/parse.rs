//! Condition expression parser
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := term ('|' term)*
//! term   := factor ('&' factor)*
//! factor := '!' factor | '(' expr ')' | leaf
//! leaf   := '[' name (',' number (',' number)?)? ']' | name
//! ```
//!
//! A bracketed leaf may carry a recency window: `[dodge, 0.5]` means
//! "dodge recorded at least 0.5s ago", `[dodge, 0, 1]` means "recorded
//! between 0 and 1s ago". A bare name is a windowless leaf.
//!
//! Every leaf is resolved against the recorder set while parsing, so a
//! reference to an unknown state is a parse error rather than a silent
//! false at evaluation time.

use crate::node::ConditionNode;
use opflow_state::StateRecorderSet;
use thiserror::Error;

/// Expression parse errors
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("empty condition expression")]
    Empty,

    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("unclosed state bracket")]
    UnclosedBracket,

    #[error("invalid window bound: {0}")]
    InvalidBound(String),

    #[error("trailing input after expression: {0}")]
    TrailingInput(String),
}

/// Result type for expression parsing
pub type ExprResult<T> = Result<T, ExprError>;

/// Parse an expression into a condition tree bound to `recorders`
pub fn parse_expr(expr: &str, recorders: &StateRecorderSet) -> ExprResult<ConditionNode> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        recorders,
    };
    let node = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ExprError::TrailingInput(token.to_string()));
    }
    Ok(node)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    /// State name plus optional window bounds
    Leaf {
        name: String,
        low: Option<f64>,
        high: Option<f64>,
    },
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::And => write!(f, "&"),
            Token::Or => write!(f, "|"),
            Token::Not => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Leaf { name, .. } => write!(f, "[{name}]"),
        }
    }
}

fn tokenize(expr: &str) -> ExprResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '&' => {
                chars.next();
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Or);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => body.push(c),
                        None => return Err(ExprError::UnclosedBracket),
                    }
                }
                tokens.push(parse_leaf_body(&body)?);
            }
            ']' => return Err(ExprError::UnexpectedToken("]".to_string())),
            _ => {
                // Bare state name: everything up to an operator or space
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if matches!(c, '&' | '|' | '!' | '(' | ')' | '[' | ']') || c.is_whitespace() {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                tokens.push(Token::Leaf {
                    name,
                    low: None,
                    high: None,
                });
            }
        }
    }

    Ok(tokens)
}

/// Parse the inside of a bracketed leaf: `name`, `name, low` or `name, low, high`
fn parse_leaf_body(body: &str) -> ExprResult<Token> {
    let mut parts = body.split(',').map(str::trim);
    let name = parts.next().unwrap_or("").to_string();
    if name.is_empty() {
        return Err(ExprError::UnexpectedToken("[]".to_string()));
    }

    let parse_bound = |part: Option<&str>| -> ExprResult<Option<f64>> {
        match part {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ExprError::InvalidBound(raw.to_string())),
        }
    };

    let low = parse_bound(parts.next())?;
    let high = parse_bound(parts.next())?;
    if let Some(extra) = parts.next() {
        return Err(ExprError::InvalidBound(extra.to_string()));
    }

    Ok(Token::Leaf { name, low, high })
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    recorders: &'a StateRecorderSet,
}

impl Parser<'_> {
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

    fn parse_or(&mut self) -> ExprResult<ConditionNode> {
        let mut node = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            node = ConditionNode::or(node, right);
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> ExprResult<ConditionNode> {
        let mut node = self.parse_factor()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_factor()?;
            node = ConditionNode::and(node, right);
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> ExprResult<ConditionNode> {
        match self.next() {
            Some(Token::Not) => {
                let child = self.parse_factor()?;
                Ok(ConditionNode::not(child))
            }
            Some(Token::LParen) => {
                let node = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(node),
                    Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(Token::Leaf { name, low, high }) => {
                let recorder = self
                    .recorders
                    .get(&name)
                    .ok_or(ExprError::UnknownState(name))?;
                Ok(ConditionNode::state_in_window(
                    recorder,
                    low.unwrap_or(0.0),
                    high,
                ))
            }
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflow_state::StateRecorder;

    fn recorders(names: &[&str]) -> StateRecorderSet {
        let set = StateRecorderSet::new();
        for name in names {
            set.register(StateRecorder::new(*name));
        }
        set
    }

    #[test]
    fn test_bare_and_bracketed_names_are_equivalent() {
        let set = recorders(&["a"]);
        let bare = parse_expr("a", &set).unwrap();
        let bracketed = parse_expr("[a]", &set).unwrap();

        for node in [&bare, &bracketed] {
            match node {
                ConditionNode::State { low, high, .. } => {
                    assert_eq!(*low, 0.0);
                    assert_eq!(*high, None);
                }
                other => panic!("expected leaf, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_leaf_window_bounds() {
        let set = recorders(&["dodge"]);
        let node = parse_expr("[dodge, 0.5, 2]", &set).unwrap();
        match node {
            ConditionNode::State { low, high, .. } => {
                assert_eq!(low, 0.5);
                assert_eq!(high, Some(2.0));
            }
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let set = recorders(&["a", "b", "c"]);
        let node = parse_expr("a | b & c", &set).unwrap();
        // Expect a | (b & c)
        match node {
            ConditionNode::Or(_, right) => {
                assert!(matches!(*right, ConditionNode::And(_, _)));
            }
            other => panic!("expected Or at root, got {other:?}"),
        }
    }

    #[test]
    fn test_parens_override_precedence() {
        let set = recorders(&["a", "b", "c"]);
        let node = parse_expr("(a | b) & c", &set).unwrap();
        match node {
            ConditionNode::And(left, _) => {
                assert!(matches!(*left, ConditionNode::Or(_, _)));
            }
            other => panic!("expected And at root, got {other:?}"),
        }
    }

    #[test]
    fn test_not_factor() {
        let set = recorders(&["a", "b"]);
        let node = parse_expr("a & !b", &set).unwrap();
        match node {
            ConditionNode::And(_, right) => {
                assert!(matches!(*right, ConditionNode::Not(_)));
            }
            other => panic!("expected And at root, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_then_evaluate() {
        let set = recorders(&["a", "b"]);
        set.record("a", 9.8);

        let node = parse_expr("a & !b", &set).unwrap();
        assert!(node.evaluate(10.0));

        set.record("b", 10.0);
        assert!(!node.evaluate(10.0));
    }

    #[test]
    fn test_unknown_state() {
        let set = recorders(&["a"]);
        let err = parse_expr("a & ghost", &set).unwrap_err();
        assert!(matches!(err, ExprError::UnknownState(name) if name == "ghost"));
    }

    #[test]
    fn test_empty_expression() {
        let set = recorders(&[]);
        assert!(matches!(parse_expr("", &set), Err(ExprError::Empty)));
        assert!(matches!(parse_expr("   ", &set), Err(ExprError::Empty)));
    }

    #[test]
    fn test_syntax_errors() {
        let set = recorders(&["a", "b"]);
        assert!(matches!(
            parse_expr("[a", &set),
            Err(ExprError::UnclosedBracket)
        ));
        assert!(matches!(
            parse_expr("a &", &set),
            Err(ExprError::UnexpectedEnd)
        ));
        assert!(matches!(
            parse_expr("(a | b", &set),
            Err(ExprError::UnexpectedEnd)
        ));
        assert!(matches!(
            parse_expr("a b", &set),
            Err(ExprError::TrailingInput(_))
        ));
        assert!(matches!(
            parse_expr("[a, x]", &set),
            Err(ExprError::InvalidBound(_))
        ));
        assert!(matches!(
            parse_expr("[a, 1, 2, 3]", &set),
            Err(ExprError::InvalidBound(_))
        ));
    }
}
