//! Structural bounds on values entering engine-visible state.
//!
//! The guard walks a [`serde_json::Value`] and enforces three limits:
//! string byte length, sequence element count (recursively), and nesting
//! depth of mappings and sequences. It runs on every node output,
//! variable write, accumulator fold, and cache insert, at the moment the
//! value is stored.

use serde_json::Value;

use crate::error::LimitError;
use crate::limits::Limits;

/// Validator applying the data-size limits to any value.
#[derive(Debug, Clone, Copy)]
pub struct ValueGuard {
    max_string_length: usize,
    max_array_length: usize,
    max_context_depth: usize,
}

impl ValueGuard {
    /// Build a guard from the data-size fields of `limits`.
    #[must_use]
    pub fn new(limits: &Limits) -> Self {
        Self {
            max_string_length: limits.max_string_length,
            max_array_length: limits.max_array_length,
            max_context_depth: limits.max_context_depth,
        }
    }

    /// Check `value` against all three bounds.
    ///
    /// Scalars (numbers, booleans, null) count toward depth only through
    /// their enclosing containers; a bare scalar has depth zero.
    pub fn check(&self, value: &Value) -> Result<(), LimitError> {
        self.walk(value, 0)
    }

    fn walk(&self, value: &Value, depth: usize) -> Result<(), LimitError> {
        match value {
            Value::String(s) => {
                if s.len() > self.max_string_length {
                    return Err(LimitError::StringTooLong {
                        length: s.len(),
                        limit: self.max_string_length,
                    });
                }
                Ok(())
            }
            Value::Array(items) => {
                let next = depth + 1;
                if next > self.max_context_depth {
                    return Err(LimitError::DepthExceeded {
                        depth: next,
                        limit: self.max_context_depth,
                    });
                }
                if items.len() > self.max_array_length {
                    return Err(LimitError::ArrayTooLong {
                        length: items.len(),
                        limit: self.max_array_length,
                    });
                }
                for item in items {
                    self.walk(item, next)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                let next = depth + 1;
                if next > self.max_context_depth {
                    return Err(LimitError::DepthExceeded {
                        depth: next,
                        limit: self.max_context_depth,
                    });
                }
                for (key, item) in map {
                    if key.len() > self.max_string_length {
                        return Err(LimitError::StringTooLong {
                            length: key.len(),
                            limit: self.max_string_length,
                        });
                    }
                    self.walk(item, next)?;
                }
                Ok(())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        }
    }
}
