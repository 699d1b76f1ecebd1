//! Cursor over the block an evaluator is consuming.
//!
//! A feed is shared between an expression stepper and the argument-gathering
//! levels it spawns, so every consumer advances the same position.

use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::Env;
use crate::value::{Block, Series, Value};

#[derive(Debug)]
pub struct Feed {
    series: Series,
    index: usize,
    env: Env,
}

pub type FeedRef = Rc<RefCell<Feed>>;

impl Feed {
    /// Feed over `block` from its position; unbound blocks use `fallback`.
    pub fn new(block: &Block, fallback: &Env) -> FeedRef {
        let env = block.binding.clone().unwrap_or_else(|| Rc::clone(fallback));
        Rc::new(RefCell::new(Feed {
            index: block.series.index(),
            series: block.series.clone(),
            env,
        }))
    }

    /// Feed whose words resolve in `env` regardless of the block's binding.
    pub fn with_env(block: &Block, env: Env) -> FeedRef {
        Rc::new(RefCell::new(Feed {
            index: block.series.index(),
            series: block.series.clone(),
            env,
        }))
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Length is re-read every time; the block may change under the feed.
    pub fn is_at_end(&self) -> bool {
        self.index >= self.series.total_len()
    }

    pub fn peek(&self) -> Option<Value> {
        self.series.get_absolute(self.index)
    }

    pub fn next_value(&mut self) -> Option<Value> {
        let value = self.peek()?;
        self.index += 1;
        Some(value)
    }

    pub fn position(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Scope;

    #[test]
    fn test_feed_advances_shared_position() {
        let block = Block::new(vec![Value::Integer(1), Value::Integer(2)]);
        let feed = Feed::new(&block, &Scope::root());
        let other = Rc::clone(&feed);

        assert_eq!(feed.borrow_mut().next_value().and_then(|v| v.as_int()), Some(1));
        assert_eq!(other.borrow().peek().and_then(|v| v.as_int()), Some(2));
        other.borrow_mut().next_value();
        assert!(feed.borrow().is_at_end());
        assert!(feed.borrow_mut().next_value().is_none());
    }

    #[test]
    fn test_feed_sees_appended_items() {
        let block = Block::new(vec![Value::Integer(1)]);
        let feed = Feed::new(&block, &Scope::root());
        feed.borrow_mut().next_value();
        assert!(feed.borrow().is_at_end());
        block.series.append(Value::Integer(2)).unwrap();
        assert!(!feed.borrow().is_at_end());
    }
}
