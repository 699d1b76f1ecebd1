//! Value types that flow through the evaluator.
//!
//! Three variants are markers the core recognizes structurally:
//! - `Null`: the result of BREAK and of a failed condition test.
//! - `Void`: "no value"; CONTINUE without /WITH, and a loop that never ran.
//! - `Pack`: a multi-value result, consumed positionally by SET-BLOCK.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::action::Action;
use crate::binding::Env;
use crate::error::EvalError;

/// Interned-by-value word spelling. Words are case-insensitive.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(spelling: &str) -> Self {
        Symbol(Rc::from(spelling.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

/// Backing storage shared by every position into one series.
#[derive(Debug, Default)]
pub struct SeriesData {
    pub items: Vec<Value>,
    holds: u32,
}

// Deeply nested blocks would otherwise drop recursively and overflow the
// native stack; flatten the nesting onto a worklist instead.
impl Drop for SeriesData {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.items);
        while let Some(value) = pending.pop() {
            let block = match value {
                Value::Block(b) | Value::Group(b) | Value::SetBlock(b) => b,
                _ => continue,
            };
            if let Ok(cell) = Rc::try_unwrap(block.series.data) {
                let mut inner = cell.into_inner();
                pending.append(&mut inner.items);
            }
        }
    }
}

/// A position in a shared, mutable array.
#[derive(Clone)]
pub struct Series {
    data: Rc<RefCell<SeriesData>>,
    index: usize,
}

impl Series {
    pub fn new(items: Vec<Value>) -> Self {
        Series {
            data: Rc::new(RefCell::new(SeriesData { items, holds: 0 })),
            index: 0,
        }
    }

    pub fn at(&self, index: usize) -> Self {
        Series {
            data: Rc::clone(&self.data),
            index,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Total number of items, ignoring the position.
    pub fn total_len(&self) -> usize {
        self.data.borrow().items.len()
    }

    /// Items from the current position to the tail.
    pub fn len(&self) -> usize {
        self.total_len().saturating_sub(self.index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute lookup, ignoring the position.
    pub fn get_absolute(&self, index: usize) -> Option<Value> {
        self.data.borrow().items.get(index).cloned()
    }

    /// Lookup relative to the current position.
    pub fn get(&self, offset: usize) -> Option<Value> {
        self.get_absolute(self.index + offset)
    }

    /// Copy of the items from the current position to the tail.
    pub fn to_vec(&self) -> Vec<Value> {
        let data = self.data.borrow();
        data.items.iter().skip(self.index).cloned().collect()
    }

    pub fn same_series(&self, other: &Series) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub fn is_held(&self) -> bool {
        self.data.borrow().holds > 0
    }

    /// Lock the series against structural mutation.
    pub fn hold(&self) {
        self.data.borrow_mut().holds += 1;
    }

    pub fn release(&self) {
        let mut data = self.data.borrow_mut();
        data.holds = data.holds.saturating_sub(1);
    }

    fn ensure_mutable(&self) -> Result<(), EvalError> {
        if self.is_held() {
            return Err(EvalError::SeriesHeld);
        }
        Ok(())
    }

    pub fn append(&self, value: Value) -> Result<(), EvalError> {
        self.ensure_mutable()?;
        self.data.borrow_mut().items.push(value);
        Ok(())
    }

    pub fn insert(&self, offset: usize, value: Value) -> Result<(), EvalError> {
        self.ensure_mutable()?;
        let mut data = self.data.borrow_mut();
        let at = (self.index + offset).min(data.items.len());
        data.items.insert(at, value);
        Ok(())
    }

    /// Remove everything from the current position to the tail.
    pub fn clear(&self) -> Result<(), EvalError> {
        self.ensure_mutable()?;
        let index = self.index;
        let mut data = self.data.borrow_mut();
        if index < data.items.len() {
            data.items.truncate(index);
        }
        Ok(())
    }

    /// Remove the absolute positions marked `true`.
    ///
    /// The walker that staged the marks must release its own hold first; any
    /// other hold still in place fails with `SeriesHeld`.
    pub(crate) fn remove_marked(&self, marks: &[bool]) -> Result<usize, EvalError> {
        self.ensure_mutable()?;
        let mut data = self.data.borrow_mut();
        let before = data.items.len();
        let mut position = 0usize;
        data.items.retain(|_| {
            let keep = !marks.get(position).copied().unwrap_or(false);
            position += 1;
            keep
        });
        Ok(before - data.items.len())
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("index", &self.index)
            .field("len", &self.len())
            .finish()
    }
}

/// An array value plus the environment its words resolve in.
#[derive(Clone, Debug)]
pub struct Block {
    pub series: Series,
    pub binding: Option<Env>,
}

impl Block {
    pub fn new(items: Vec<Value>) -> Self {
        Block {
            series: Series::new(items),
            binding: None,
        }
    }

    pub fn bound(&self, env: &Env) -> Self {
        Block {
            series: self.series.clone(),
            binding: Some(self.binding.clone().unwrap_or_else(|| Rc::clone(env))),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Void,
    Logic(bool),
    Integer(i64),
    Text(Rc<str>),
    Word(Symbol),
    SetWord(Symbol),
    GetWord(Symbol),
    LitWord(Symbol),
    Refinement(Symbol),
    Blank,
    Path(Rc<[Symbol]>),
    Block(Block),
    Group(Block),
    SetBlock(Block),
    Action(Rc<Action>),
    Pack(Rc<[Value]>),
    Error(Rc<EvalError>),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }

    pub fn word(s: &str) -> Self {
        Value::Word(Symbol::new(s))
    }

    pub fn block(items: Vec<Value>) -> Self {
        Value::Block(Block::new(items))
    }

    pub fn pack(items: Vec<Value>) -> Self {
        Value::Pack(Rc::from(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Void => "void",
            Value::Logic(_) => "logic",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Word(_) => "word",
            Value::SetWord(_) => "set-word",
            Value::GetWord(_) => "get-word",
            Value::LitWord(_) => "lit-word",
            Value::Refinement(_) => "refinement",
            Value::Blank => "blank",
            Value::Path(_) => "path",
            Value::Block(_) => "block",
            Value::Group(_) => "group",
            Value::SetBlock(_) => "set-block",
            Value::Action(_) => "action",
            Value::Pack(_) => "pack",
            Value::Error(_) => "error",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Unwrap a pack to its first value; empty packs decay to void.
    pub fn decay(self) -> Value {
        match self {
            Value::Pack(items) => items.first().cloned().unwrap_or(Value::Void).decay(),
            other => other,
        }
    }

    /// Wrap null and void in a one-element pack so a loop body that produced
    /// them stays distinguishable from BREAK and from "never ran".
    pub fn heavy(self) -> Value {
        match self {
            Value::Null | Value::Void => Value::pack(vec![self]),
            other => other,
        }
    }

    pub fn is_truthy(&self) -> Result<bool, EvalError> {
        match self {
            Value::Null | Value::Logic(false) => Ok(false),
            Value::Void => Err(EvalError::type_mismatch("condition", "non-void", "void")),
            Value::Pack(_) => self.clone().decay().is_truthy(),
            _ => Ok(true),
        }
    }

    /// Structural equality used by `=`; actions compare by identity.
    ///
    /// Nested blocks are compared from a worklist, so depth is bounded by
    /// memory rather than the native stack.
    pub fn equals(&self, other: &Value) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((left, right)) = pending.pop() {
            let (xs, ys) = match (&left, &right) {
                (Value::Block(a), Value::Block(b))
                | (Value::Group(a), Value::Group(b))
                | (Value::SetBlock(a), Value::SetBlock(b)) => (a.series.to_vec(), b.series.to_vec()),
                (Value::Pack(a), Value::Pack(b)) => (a.to_vec(), b.to_vec()),
                _ => {
                    if !left.equals_flat(&right) {
                        return false;
                    }
                    continue;
                }
            };
            if xs.len() != ys.len() {
                return false;
            }
            pending.extend(xs.into_iter().zip(ys));
        }
        true
    }

    fn equals_flat(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Blank, Value::Blank) => true,
            (Value::Logic(a), Value::Logic(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Word(a), Value::Word(b))
            | (Value::SetWord(a), Value::SetWord(b))
            | (Value::GetWord(a), Value::GetWord(b))
            | (Value::LitWord(a), Value::LitWord(b))
            | (Value::Refinement(a), Value::Refinement(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Action(a), Value::Action(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Items of a value that nests others, in order.
    fn nested_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Block(b) | Value::Group(b) | Value::SetBlock(b) => Some(b.series.to_vec()),
            Value::Pack(items) => Some(items.to_vec()),
            _ => None,
        }
    }

    /// JSON rendering for `--output-format json`.
    ///
    /// Arrays nest at most `MAX_JSON_DEPTH` deep; anything below that is
    /// rendered as its molded text so the result can be serialized and
    /// dropped without recursing through the whole structure.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        struct Frame {
            items: std::vec::IntoIter<Value>,
            built: Vec<Json>,
        }

        let mut stack: Vec<Frame> = Vec::new();
        let mut current = self.clone();
        loop {
            let mut finished = match current.nested_items() {
                Some(items) if stack.len() < MAX_JSON_DEPTH => {
                    stack.push(Frame {
                        items: items.into_iter(),
                        built: Vec::new(),
                    });
                    None
                }
                Some(_) => Some(Json::String(current.to_string())),
                None => Some(current.json_flat()),
            };
            loop {
                let Some(frame) = stack.last_mut() else {
                    return finished.unwrap_or(Json::Null);
                };
                if let Some(json) = finished.take() {
                    frame.built.push(json);
                }
                match frame.items.next() {
                    Some(next) => {
                        current = next;
                        break;
                    }
                    None => {
                        let built = std::mem::take(&mut frame.built);
                        stack.pop();
                        finished = Some(Json::Array(built));
                    }
                }
            }
        }
    }

    fn json_flat(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null | Value::Void | Value::Blank => Json::Null,
            Value::Logic(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Text(s) => Json::String(s.to_string()),
            Value::Error(e) => serde_json::json!({ "error": e.to_string() }),
            other => Json::String(other.to_string()),
        }
    }
}

/// Deepest array nesting `Value::to_json` produces. Kept under
/// `serde_json`'s parse recursion limit so the output can be read back.
pub const MAX_JSON_DEPTH: usize = 64;

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logic(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

/// How a value is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendering {
    /// Source-like: texts quoted, blocks bracketed.
    Mold,
    /// For display: texts bare, block items joined by spaces.
    Form,
}

enum Piece {
    Value(Value, Rendering),
    Literal(&'static str),
}

/// Write `value` without recursing per nesting level.
fn render(value: &Value, rendering: Rendering, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut pending = vec![Piece::Value(value.clone(), rendering)];
    while let Some(piece) = pending.pop() {
        let (value, rendering) = match piece {
            Piece::Literal(s) => {
                f.write_str(s)?;
                continue;
            }
            Piece::Value(value, rendering) => (value, rendering),
        };
        let (open, close, inner) = match (&value, rendering) {
            (Value::Text(s), Rendering::Form) => {
                f.write_str(s)?;
                continue;
            }
            (Value::Block(_), Rendering::Form) => ("", "", Rendering::Form),
            (Value::Block(_), Rendering::Mold) => ("[", "]", Rendering::Mold),
            (Value::Group(_), _) => ("(", ")", Rendering::Mold),
            (Value::SetBlock(_), _) => ("[", "]:", Rendering::Mold),
            (Value::Pack(_), _) => ("~[", "]~", Rendering::Mold),
            (flat, _) => {
                mold_flat(flat, f)?;
                continue;
            }
        };
        let items = value.nested_items().unwrap_or_default();
        f.write_str(open)?;
        pending.push(Piece::Literal(close));
        for (i, item) in items.into_iter().enumerate().rev() {
            pending.push(Piece::Value(item, inner));
            if i > 0 {
                pending.push(Piece::Literal(" "));
            }
        }
    }
    Ok(())
}

fn mold_flat(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Null => f.write_str("~null~"),
        Value::Void => f.write_str("~void~"),
        Value::Logic(b) => write!(f, "{}", b),
        Value::Integer(i) => write!(f, "{}", i),
        Value::Text(s) => write!(f, "{:?}", s),
        Value::Word(s) => write!(f, "{}", s),
        Value::SetWord(s) => write!(f, "{}:", s),
        Value::GetWord(s) => write!(f, ":{}", s),
        Value::LitWord(s) => write!(f, "'{}", s),
        Value::Refinement(s) => write!(f, "/{}", s),
        Value::Blank => f.write_str("_"),
        Value::Path(parts) => {
            let spelled: Vec<&str> = parts.iter().map(Symbol::as_str).collect();
            f.write_str(&spelled.join("/"))
        }
        Value::Action(a) => write!(f, "#[action {}]", a.name),
        Value::Error(e) => write!(f, "#[error {:?}]", e.to_string()),
        Value::Block(_) | Value::Group(_) | Value::SetBlock(_) | Value::Pack(_) => render(value, Rendering::Mold, f),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, Rendering::Mold, f)
    }
}

/// Display adapter that forms a value: texts unquoted, blocks spliced.
pub struct Formed<'a>(pub &'a Value);

impl fmt::Display for Formed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self.0, Rendering::Form, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_takes_first_pack_item() {
        let packed = Value::pack(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(packed.decay().as_int(), Some(1));
        assert!(Value::pack(vec![]).decay().is_void());
    }

    #[test]
    fn test_heavy_only_wraps_null_and_void() {
        assert!(matches!(Value::Null.heavy(), Value::Pack(p) if p[0].is_null()));
        assert!(matches!(Value::Void.heavy(), Value::Pack(p) if p[0].is_void()));
        assert_eq!(Value::Integer(7).heavy().as_int(), Some(7));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy().unwrap());
        assert!(!Value::Logic(false).is_truthy().unwrap());
        assert!(Value::Integer(0).is_truthy().unwrap());
        assert!(Value::Void.is_truthy().is_err());
    }

    #[test]
    fn test_series_hold_blocks_mutation() {
        let series = Series::new(vec![Value::Integer(1)]);
        series.hold();
        assert!(matches!(series.append(Value::Integer(2)), Err(EvalError::SeriesHeld)));
        series.release();
        series.append(Value::Integer(2)).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_series_positions_share_storage() {
        let head = Series::new(vec![Value::Integer(1), Value::Integer(2)]);
        let next = head.at(1);
        head.append(Value::Integer(3)).unwrap();
        assert_eq!(next.len(), 2);
        assert!(next.same_series(&head));
        assert_eq!(next.get(1).and_then(|v| v.as_int()), Some(3));
    }

    #[test]
    fn test_remove_marked() {
        let series = Series::new((1..=5).map(Value::Integer).collect());
        let removed = series.remove_marked(&[false, true, false, true, false]).unwrap();
        assert_eq!(removed, 2);
        let left: Vec<i64> = series.to_vec().iter().filter_map(Value::as_int).collect();
        assert_eq!(left, vec![1, 3, 5]);

        series.hold();
        assert!(matches!(series.remove_marked(&[true]), Err(EvalError::SeriesHeld)));
        series.release();
        let left: Vec<i64> = series.to_vec().iter().filter_map(Value::as_int).collect();
        assert_eq!(left, vec![1, 3, 5]);
    }

    #[test]
    fn test_mold() {
        let block = Value::block(vec![
            Value::SetWord(Symbol::new("x")),
            Value::Integer(1),
            Value::text("hi"),
        ]);
        assert_eq!(block.to_string(), "[x: 1 \"hi\"]");
        assert_eq!(Value::pack(vec![Value::Null]).to_string(), "~[~null~]~");
    }

    #[test]
    fn test_form_splices_blocks_and_unquotes_text() {
        let value = Value::block(vec![
            Value::text("a"),
            Value::block(vec![Value::Integer(1), Value::text("b")]),
            Value::Group(Block::new(vec![Value::text("c")])),
        ]);
        assert_eq!(Formed(&value).to_string(), "a 1 b (\"c\")");
    }

    fn nested(depth: usize, leaf: i64) -> Value {
        let mut value = Value::Integer(leaf);
        for _ in 0..depth {
            value = Value::block(vec![value]);
        }
        value
    }

    #[test]
    fn test_mold_deep_block() {
        let depth = 100_000;
        let molded = nested(depth, 1).to_string();
        assert_eq!(molded.len(), depth * 2 + 1);
        assert!(molded.starts_with("[[[["));
        assert!(molded.ends_with("1]]]]"));
        assert_eq!(Formed(&nested(depth, 1)).to_string(), "1");
    }

    #[test]
    fn test_equals_deep_block() {
        let depth = 100_000;
        assert!(nested(depth, 1).equals(&nested(depth, 1)));
        assert!(!nested(depth, 1).equals(&nested(depth, 2)));
        assert!(!nested(depth, 1).equals(&nested(depth - 1, 1)));
    }

    #[test]
    fn test_to_json_caps_nesting() {
        let shallow = Value::block(vec![Value::Integer(1), Value::block(vec![Value::Null])]);
        assert_eq!(shallow.to_json(), serde_json::json!([1, [null]]));

        let mut json = nested(100_000, 1).to_json();
        let mut arrays = 0;
        while let serde_json::Value::Array(mut items) = json {
            arrays += 1;
            json = items.pop().unwrap_or(serde_json::Value::Null);
        }
        assert_eq!(arrays, MAX_JSON_DEPTH);
        match json {
            serde_json::Value::String(rest) => assert!(rest.starts_with("[[") && rest.ends_with("1]]")),
            other => panic!("expected molded remainder, got {}", other),
        }
    }
}
