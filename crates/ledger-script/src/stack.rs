//! Data stack of a running script.

use crate::num::{NumError, ScriptNum};
use std::fmt;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StackError {
    #[error("stack underflow")]
    Underflow,
    #[error(transparent)]
    Num(#[from] NumError),
}

type Result<T> = std::result::Result<T, StackError>;

/// Byte elements with the top at the end of the vector.
///
/// Depth arguments count from the top, so depth 0 is the top element. Numbers read
/// back from the stack must be minimally encoded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stack {
    elements: Vec<Vec<u8>>,
}

impl From<Vec<Vec<u8>>> for Stack {
    fn from(elements: Vec<Vec<u8>>) -> Self {
        Self { elements }
    }
}

impl Deref for Stack {
    type Target = Vec<Vec<u8>>;

    fn deref(&self) -> &Self::Target {
        &self.elements
    }
}

impl DerefMut for Stack {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.elements
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .elements
            .iter()
            .map(|element| {
                if element.is_empty() {
                    "<empty>".to_string()
                } else {
                    hex::encode(element)
                }
            })
            .collect::<Vec<_>>();
        write!(f, "[{}]", rendered.join(", "))
    }
}

impl Stack {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<Vec<u8>> {
        self.elements
    }

    /// Index of the lowest of the `n` topmost elements.
    fn window(&self, n: usize) -> Result<usize> {
        self.elements.len().checked_sub(n).ok_or(StackError::Underflow)
    }

    pub fn require(&self, n: usize) -> Result<()> {
        self.window(n).map(|_| ())
    }

    pub fn last(&self) -> Result<&Vec<u8>> {
        self.elements.last().ok_or(StackError::Underflow)
    }

    pub fn pop(&mut self) -> Result<Vec<u8>> {
        self.elements.pop().ok_or(StackError::Underflow)
    }

    pub fn push(&mut self, element: Vec<u8>) -> &mut Self {
        self.elements.push(element);
        self
    }

    pub fn push_num(&mut self, num: impl Into<ScriptNum>) -> &mut Self {
        self.push(num.into().to_bytes())
    }

    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.push(if value { vec![1] } else { Vec::new() })
    }

    /// Pops an arithmetic operand of at most [`ScriptNum::MAX_NUM_SIZE`] bytes.
    pub fn pop_num(&mut self) -> Result<ScriptNum> {
        let element = self.pop()?;
        Ok(ScriptNum::from_bytes(&element, true, None)?)
    }

    /// Reads the top element as a number of up to `max_size` bytes, leaving it in place.
    pub fn peek_num_with_max_size(&self, max_size: usize) -> Result<ScriptNum> {
        Ok(ScriptNum::from_bytes(self.last()?, true, Some(max_size))?)
    }

    pub fn peek_bool(&self) -> Result<bool> {
        self.last().map(|element| cast_to_bool(element))
    }

    pub fn pop_bool(&mut self) -> Result<bool> {
        self.pop().map(|element| cast_to_bool(&element))
    }

    pub fn top(&self, depth: usize) -> Result<&Vec<u8>> {
        let index = self.window(depth + 1)?;
        Ok(&self.elements[index])
    }

    pub fn remove(&mut self, depth: usize) -> Result<Vec<u8>> {
        let index = self.window(depth + 1)?;
        Ok(self.elements.remove(index))
    }

    /// Discards the `n` topmost elements.
    pub fn drop(&mut self, n: usize) -> Result<()> {
        let start = self.window(n)?;
        self.elements.truncate(start);
        Ok(())
    }

    /// Copies the `n` topmost elements onto the top, keeping their order.
    pub fn dup(&mut self, n: usize) -> Result<()> {
        let start = self.window(n)?;
        self.elements.extend_from_within(start..);
        Ok(())
    }

    /// Copies the group of `n` elements lying below the top `n` onto the top.
    pub fn over(&mut self, n: usize) -> Result<()> {
        let start = self.window(2 * n)?;
        self.elements.extend_from_within(start..start + n);
        Ok(())
    }

    /// Moves the third group of `n` elements from the top to the top.
    pub fn rot(&mut self, n: usize) -> Result<()> {
        let start = self.window(3 * n)?;
        self.elements[start..].rotate_left(n);
        Ok(())
    }

    /// Exchanges the two topmost groups of `n` elements.
    pub fn swap(&mut self, n: usize) -> Result<()> {
        let start = self.window(2 * n)?;
        self.elements[start..].rotate_left(n);
        Ok(())
    }

    /// Removes the element below the top.
    pub fn nip(&mut self) -> Result<()> {
        self.remove(1).map(|_| ())
    }

    /// Inserts a copy of the top element below the second one.
    pub fn tuck(&mut self) -> Result<()> {
        let index = self.window(2)?;
        let top = self.elements[index + 1].clone();
        self.elements.insert(index, top);
        Ok(())
    }
}

/// Truthiness of a stack element.
///
/// Any non-zero byte makes the element true, except a lone sign bit in the final
/// byte, which encodes negative zero.
pub fn cast_to_bool(data: &[u8]) -> bool {
    match data.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&byte| byte != 0) || last & 0x7f != 0,
    }
}
