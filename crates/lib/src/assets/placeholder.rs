//! `$${key}` substitution in the display document.
//!
//! # Syntax
//!
//! - `$${key}` is replaced by the value bound to `key`
//! - `$$${` produces a literal `$${`
//! - a single `$` passes through, so inline scripts using `$` are untouched
//!
//! Keys are fixed per ownable kind; an unknown key is an error rather than
//! being left in the output.
//!
//! ```
//! use std::collections::BTreeMap;
//! use ownable_lib::assets::placeholder::substitute;
//!
//! let values = BTreeMap::from([("name", "sun-icon".to_string())]);
//! let html = substitute("<h1>$${name}</h1> costs $5", &values).unwrap();
//! assert_eq!(html, "<h1>sun-icon</h1> costs $5");
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
  Literal(String),
  Key(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at byte {0}")]
  Unclosed(usize),

  #[error("empty placeholder at byte {0}")]
  Empty(usize),

  #[error("unknown placeholder '{key}' (known: {known})")]
  Unknown { key: String, known: String },
}

/// Split `input` into literal text and placeholder keys.
pub fn parse(input: &str) -> Result<Vec<Segment<'_>>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;
  let mut offset = 0;

  while let Some(idx) = rest.find("$$") {
    literal.push_str(&rest[..idx]);
    let after = &rest[idx + 2..];

    if let Some(tail) = after.strip_prefix("${") {
      literal.push_str("$${");
      offset += idx + 4;
      rest = tail;
    } else if let Some(tail) = after.strip_prefix('{') {
      let start = offset + idx;
      let close = tail.find('}').ok_or(PlaceholderError::Unclosed(start))?;
      let key = tail[..close].trim();
      if key.is_empty() {
        return Err(PlaceholderError::Empty(start));
      }
      if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(&mut literal)));
      }
      segments.push(Segment::Key(key));
      offset += idx + 3 + close + 1;
      rest = &tail[close + 1..];
    } else {
      literal.push_str("$$");
      offset += idx + 2;
      rest = after;
    }
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }
  Ok(segments)
}

/// Replace every placeholder in `input` with its bound value.
pub fn substitute(input: &str, values: &BTreeMap<&str, String>) -> Result<String, PlaceholderError> {
  let mut out = String::with_capacity(input.len());

  for segment in parse(input)? {
    match segment {
      Segment::Literal(text) => out.push_str(&text),
      Segment::Key(key) => match values.get(key) {
        Some(value) => out.push_str(value),
        None => {
          return Err(PlaceholderError::Unknown {
            key: key.to_string(),
            known: values.keys().copied().collect::<Vec<_>>().join(", "),
          });
        }
      },
    }
  }

  Ok(out)
}
