//! Edit scripts and their compact textual form
//!
//! An edit script is a sequence of operations walked left to right over the original
//! line:
//!
//! | Text    | Operation                                |
//! | ------- | ---------------------------------------- |
//! | `=N`    | keep the next `N` characters             |
//! | `-N`    | delete the next `N` characters           |
//! | `+text` | insert `text` (percent-escaped)          |
//!
//! Operations are joined by tabs. Lengths count Unicode scalar values. The empty script is
//! written as `=0` so that a token is never a blank line.

use std::fmt::Write as _;

use crate::error::{DeltaError, Result};

/// Separator between the operations of a script
const OP_SEPARATOR: char = '\t';

/// Textual form of the empty script
pub const EMPTY_SCRIPT: &str = "=0";

/// A single edit operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Keep(usize),
    Delete(usize),
    Insert(String),
}

/// A reversible instruction set transforming one line into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    edits: Vec<Edit>,
}
impl EditScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Appends an edit, merging it into the previous one when both are of the same kind
    pub fn push(&mut self, edit: Edit) {
        // lengths taken from in-memory lines cannot overflow
        let _ = self.try_push(edit);
    }

    /// Like [`EditScript::push`], failing with [`DeltaError::InvalidScript`] when merged
    /// lengths overflow
    pub fn try_push(&mut self, edit: Edit) -> Result<()> {
        match edit {
            Edit::Keep(0) | Edit::Delete(0) => {}
            Edit::Insert(ref text) if text.is_empty() => {}
            Edit::Keep(m) => {
                if let Some(Edit::Keep(n)) = self.edits.last_mut() {
                    *n = n.checked_add(m).ok_or_else(overflow)?;
                } else {
                    self.edits.push(Edit::Keep(m));
                }
            }
            Edit::Delete(m) => {
                if let Some(Edit::Delete(n)) = self.edits.last_mut() {
                    *n = n.checked_add(m).ok_or_else(overflow)?;
                } else {
                    self.edits.push(Edit::Delete(m));
                }
            }
            Edit::Insert(text) => {
                if let Some(Edit::Insert(prev)) = self.edits.last_mut() {
                    prev.push_str(&text);
                } else {
                    self.edits.push(Edit::Insert(text));
                }
            }
        }
        Ok(())
    }

    /// Number of original characters the script walks over (kept plus deleted)
    pub fn source_len(&self) -> Result<usize> {
        self.edits
            .iter()
            .try_fold(0usize, |total, edit| match edit {
                Edit::Keep(n) | Edit::Delete(n) => total.checked_add(*n),
                Edit::Insert(_) => Some(total),
            })
            .ok_or_else(|| overflow().into())
    }

    /// Applies the script to `original`.
    ///
    /// Fails with [`DeltaError::LengthMismatch`] when the script does not walk over exactly
    /// the characters of `original`.
    pub fn apply(&self, original: &str) -> Result<String> {
        let total = original.chars().count();
        let expected = self.source_len()?;
        if expected != total {
            return Err(DeltaError::LengthMismatch {
                expected,
                got: total,
            }
            .into());
        }

        let mut out = String::with_capacity(original.len());
        let mut chars = original.chars();
        for edit in &self.edits {
            match edit {
                Edit::Keep(n) => out.extend(chars.by_ref().take(*n)),
                Edit::Delete(n) => {
                    chars.by_ref().take(*n).for_each(drop);
                }
                Edit::Insert(text) => out.push_str(text),
            }
        }
        Ok(out)
    }

    /// Parses the textual form of a script
    pub fn parse(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(DeltaError::InvalidScript("empty token".to_string()).into());
        }
        let mut script = Self::new();
        for op in token.split(OP_SEPARATOR) {
            let mut chars = op.chars();
            let edit = match chars.next() {
                Some('=') => Edit::Keep(parse_count(chars.as_str())?),
                Some('-') => Edit::Delete(parse_count(chars.as_str())?),
                Some('+') => Edit::Insert(unescape(chars.as_str())?),
                Some(c) => {
                    return Err(DeltaError::InvalidScript(format!("unknown operation '{c}'")).into())
                }
                None => return Err(DeltaError::InvalidScript("empty operation".to_string()).into()),
            };
            script.try_push(edit)?;
        }
        Ok(script)
    }

    /// Writes the textual form of the script
    #[must_use]
    pub fn to_token(&self) -> String {
        if self.edits.is_empty() {
            return EMPTY_SCRIPT.to_string();
        }
        let mut token = String::new();
        let mut ibuf = itoa::Buffer::new();
        for (idx, edit) in self.edits.iter().enumerate() {
            if idx > 0 {
                token.push(OP_SEPARATOR);
            }
            match edit {
                Edit::Keep(n) => {
                    token.push('=');
                    token.push_str(ibuf.format(*n));
                }
                Edit::Delete(n) => {
                    token.push('-');
                    token.push_str(ibuf.format(*n));
                }
                Edit::Insert(text) => {
                    token.push('+');
                    escape_into(text, &mut token);
                }
            }
        }
        token
    }
}

fn overflow() -> DeltaError {
    DeltaError::InvalidScript("edit lengths overflow".to_string())
}

fn parse_count(digits: &str) -> Result<usize> {
    digits
        .parse()
        .map_err(|_| DeltaError::InvalidScript(format!("invalid length '{digits}'")).into())
}

/// Percent-escapes the characters that would break the line-oriented token syntax
fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '%' | '\t' | '\n' | '\r' => {
                let _ = write!(out, "%{:02X}", c as u32);
            }
            _ => out.push(c),
        }
    }
}

fn unescape(text: &str) -> Result<String> {
    if !text.contains('%') {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest
            .get(pos + 1..pos + 3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .filter(u8::is_ascii)
            .ok_or_else(|| DeltaError::InvalidScript(format!("invalid escape in '{text}'")))?;
        out.push(char::from(code));
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}
