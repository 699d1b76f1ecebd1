//! Source text to an unbound block.
//!
//! Tokenizing is done by `logos`; nesting is tracked on an explicit stack so
//! arbitrarily deep brackets load without recursion.

use std::rc::Rc;

use logos::Logos;

use crate::error::EvalError;
use crate::value::{Block, Symbol, Value};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
enum Token {
    #[token("[")]
    OpenBlock,
    #[token("]")]
    CloseBlock,
    #[token("]:")]
    CloseSetBlock,
    #[token("(")]
    OpenGroup,
    #[token(")")]
    CloseGroup,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Text(String),

    #[regex(r#""([^"\\]|\\.)*"#, priority = 0)]
    UnterminatedText,

    /// Words, numbers and every other delimiter-free run of characters.
    #[regex(r#"[^ \t\r\n\[\]()";]+"#, |lex| lex.slice().to_owned())]
    Atom(String),
}

/// Strip the quotes and resolve escapes; unknown escapes are kept verbatim.
fn unescape(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Root,
    Block,
    Group,
}

impl Nesting {
    fn opener(self) -> &'static str {
        match self {
            Nesting::Root => "",
            Nesting::Block => "[",
            Nesting::Group => "(",
        }
    }
}

struct Open {
    nesting: Nesting,
    offset: usize,
    items: Vec<Value>,
}

/// Load `source` into a block of unevaluated values.
pub fn load(source: &str) -> Result<Block, EvalError> {
    let mut stack = vec![Open {
        nesting: Nesting::Root,
        offset: 0,
        items: Vec::new(),
    }];
    let mut lexer = Token::lexer(source);

    while let Some(token) = lexer.next() {
        let offset = lexer.span().start;
        let token = token.map_err(|_| {
            EvalError::syntax(offset, format!("unexpected character {:?}", lexer.slice()))
        })?;

        let value = match token {
            Token::OpenBlock | Token::OpenGroup => {
                let nesting = if token == Token::OpenBlock {
                    Nesting::Block
                } else {
                    Nesting::Group
                };
                stack.push(Open {
                    nesting,
                    offset,
                    items: Vec::new(),
                });
                continue;
            }
            Token::CloseBlock | Token::CloseSetBlock | Token::CloseGroup => {
                let expected = if token == Token::CloseGroup {
                    Nesting::Group
                } else {
                    Nesting::Block
                };
                let open = match stack.pop() {
                    Some(open) if open.nesting == expected => open,
                    Some(open) if open.nesting == Nesting::Root => {
                        return Err(EvalError::syntax(
                            offset,
                            format!("unexpected {:?}", lexer.slice()),
                        ));
                    }
                    Some(open) => {
                        return Err(EvalError::syntax(
                            offset,
                            format!("{:?} closes {} opened at offset {}", lexer.slice(), open.nesting.opener(), open.offset),
                        ));
                    }
                    None => return Err(EvalError::internal("loader stack underflow")),
                };
                let block = Block::new(open.items);
                match token {
                    Token::CloseGroup => Value::Group(block),
                    Token::CloseSetBlock => Value::SetBlock(block),
                    _ => Value::Block(block),
                }
            }
            Token::Text(text) => Value::text(&text),
            Token::UnterminatedText => {
                return Err(EvalError::syntax(offset, "unterminated string"));
            }
            Token::Atom(atom) => atom_value(&atom, offset)?,
        };

        match stack.last_mut() {
            Some(open) => open.items.push(value),
            None => return Err(EvalError::internal("loader stack underflow")),
        }
    }

    let root = match stack.pop() {
        Some(open) if open.nesting == Nesting::Root => open,
        Some(open) => {
            return Err(EvalError::syntax(
                open.offset,
                format!("unclosed {}", open.nesting.opener()),
            ));
        }
        None => return Err(EvalError::internal("loader stack underflow")),
    };
    Ok(Block::new(root.items))
}

fn is_integer(atom: &str) -> bool {
    let digits = atom.strip_prefix(['-', '+']).unwrap_or(atom);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn atom_value(atom: &str, offset: usize) -> Result<Value, EvalError> {
    if is_integer(atom) {
        return atom
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| EvalError::syntax(offset, format!("integer out of range: {}", atom)));
    }
    if atom == "_" {
        return Ok(Value::Blank);
    }
    if atom == "/" {
        return Ok(Value::word(atom));
    }

    let word = |spelling: &str| -> Result<Symbol, EvalError> {
        if spelling.is_empty() {
            return Err(EvalError::syntax(offset, format!("empty word in {:?}", atom)));
        }
        Ok(Symbol::new(spelling))
    };

    if let Some(rest) = atom.strip_prefix('\'') {
        return Ok(Value::LitWord(word(rest)?));
    }
    if let Some(rest) = atom.strip_prefix(':') {
        return Ok(Value::GetWord(word(rest)?));
    }
    if let Some(rest) = atom.strip_prefix('/') {
        return Ok(Value::Refinement(word(rest)?));
    }
    if let Some(rest) = atom.strip_suffix(':') {
        return Ok(Value::SetWord(word(rest)?));
    }
    if atom.contains('/') {
        let parts = atom.split('/').map(word).collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Path(Rc::from(parts)));
    }
    Ok(Value::Word(Symbol::new(atom)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(source: &str) -> String {
        Value::Block(load(source).unwrap()).to_string()
    }

    #[test]
    fn test_scalars_and_words() {
        assert_eq!(load_str("1 -2 +3 - foo"), "[1 -2 3 - foo]");
        assert_eq!(load_str("x: :y 'z /with _"), "[x: :y 'z /with _]");
        assert_eq!(load_str("a <= b <> c / d"), "[a <= b <> c / d]");
    }

    #[test]
    fn test_words_are_case_insensitive() {
        let block = load("Repeat").unwrap();
        assert!(matches!(block.series.get(0), Some(Value::Word(s)) if s.as_str() == "repeat"));
    }

    #[test]
    fn test_nesting_and_set_block() {
        assert_eq!(load_str("[a (b c)] [d /e _]: f"), "[[a (b c)] [d /e _]: f]");
    }

    #[test]
    fn test_paths() {
        let block = load("continue/with 1").unwrap();
        match block.series.get(0) {
            Some(Value::Path(parts)) => {
                let spelled: Vec<&str> = parts.iter().map(Symbol::as_str).collect();
                assert_eq!(spelled, vec!["continue", "with"]);
            }
            other => panic!("expected path, got {:?}", other),
        }
        assert!(matches!(load("a//b"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_strings_and_comments() {
        let block = load("\"a\\tb\\\"c\" ; trailing comment\n\"x;y\"").unwrap();
        assert_eq!(block.series.len(), 2);
        assert!(matches!(block.series.get(0), Some(Value::Text(t)) if &*t == "a\tb\"c"));
        assert!(matches!(block.series.get(1), Some(Value::Text(t)) if &*t == "x;y"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(load("[1 2"), Err(EvalError::Syntax { offset: 0, .. })));
        assert!(matches!(load("1 ]"), Err(EvalError::Syntax { offset: 2, .. })));
        assert!(matches!(load("(1]"), Err(EvalError::Syntax { .. })));
        assert!(matches!(load("\"open"), Err(EvalError::Syntax { .. })));
        assert!(matches!(
            load("99999999999999999999"),
            Err(EvalError::Syntax { .. })
        ));
    }

    #[test]
    fn test_deep_nesting_loads() {
        let depth = 50_000;
        let source = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let block = load(&source).unwrap();
        assert_eq!(block.series.len(), 1);
    }
}
