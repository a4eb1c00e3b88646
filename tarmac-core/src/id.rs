//! Composite resource identifiers
//!
//! Resources keyed by more than one value are stored under a single string
//! identifier. [`IdScheme`] joins parts with a fixed separator, which is how
//! existing identifiers are shaped. [`LengthPrefixedScheme`] encodes each part
//! as a netstring and is unambiguous for any part content.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("unexpected format for ID ({id}), expected {expected}")]
    UnexpectedFormat { id: String, expected: String },

    #[error("ID part {name} must not be empty")]
    EmptyPart { name: String },

    #[error("ID part {name} ({value}) must not contain '{separator}'")]
    SeparatorInPart {
        name: String,
        value: String,
        separator: String,
    },
}

impl IdError {
    pub fn unexpected_format(id: &str, expected: impl Into<String>) -> Self {
        Self::UnexpectedFormat {
            id: id.to_string(),
            expected: expected.into(),
        }
    }
}

/// How a separator-joined identifier is split back into parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Every separator splits; parts never contain it
    Exact,
    /// Split at most `N - 1` times; the last part keeps any further separators
    RemainderInLast,
}

/// Separator-joined identifier with `N` named parts
#[derive(Debug, Clone, Copy)]
pub struct IdScheme<const N: usize> {
    separator: &'static str,
    names: [&'static str; N],
    mode: SplitMode,
    default_leading: Option<&'static str>,
}

impl<const N: usize> IdScheme<N> {
    pub const fn new(separator: &'static str, names: [&'static str; N]) -> Self {
        Self {
            separator,
            names,
            mode: SplitMode::Exact,
            default_leading: None,
        }
    }

    /// The last part may contain the separator
    pub const fn remainder_in_last(mut self) -> Self {
        self.mode = SplitMode::RemainderInLast;
        self
    }

    /// The leading part may be omitted, in which case it is `default`.
    ///
    /// `create` omits it only when it equals `default`, so identifiers of
    /// resources using the default keep their single-part legacy form. An
    /// empty leading part is rejected like any other empty part.
    pub const fn with_default_leading(mut self, default: &'static str) -> Self {
        self.default_leading = Some(default);
        self
    }

    pub fn separator(&self) -> &'static str {
        self.separator
    }

    /// Human readable shape, e.g. `APP-ID/BRANCH-NAME`
    pub fn expected(&self) -> String {
        let full = self.names.join(self.separator);
        match self.default_leading {
            Some(_) if N > 1 => format!("{} or {}", full, self.names[1..].join(self.separator)),
            _ => full,
        }
    }

    pub fn create(&self, parts: [&str; N]) -> Result<String, IdError> {
        let mut kept = Vec::with_capacity(N);
        for (i, part) in parts.iter().enumerate() {
            if i == 0 && self.default_leading == Some(*part) {
                continue;
            }
            if part.is_empty() {
                return Err(IdError::EmptyPart {
                    name: self.names[i].to_string(),
                });
            }
            let may_hold_separator = self.mode == SplitMode::RemainderInLast && i + 1 == N;
            if !may_hold_separator && part.contains(self.separator) {
                return Err(IdError::SeparatorInPart {
                    name: self.names[i].to_string(),
                    value: part.to_string(),
                    separator: self.separator.to_string(),
                });
            }
            kept.push(*part);
        }
        Ok(kept.join(self.separator))
    }

    pub fn parse(&self, id: &str) -> Result<[String; N], IdError> {
        let pieces: Vec<&str> = match self.mode {
            SplitMode::Exact => id.split(self.separator).collect(),
            SplitMode::RemainderInLast => id.splitn(N, self.separator).collect(),
        };

        if pieces.iter().any(|p| p.is_empty()) {
            return Err(IdError::unexpected_format(id, self.expected()));
        }

        if pieces.len() == N {
            return Ok(std::array::from_fn(|i| pieces[i].to_string()));
        }

        if let Some(default) = self.default_leading
            && N > 1
            && pieces.len() == N - 1
        {
            return Ok(std::array::from_fn(|i| {
                if i == 0 {
                    default.to_string()
                } else {
                    pieces[i - 1].to_string()
                }
            }));
        }

        Err(IdError::unexpected_format(id, self.expected()))
    }
}

/// Netstring encoded identifier with `N` named parts: `<len>:<bytes>,` per part
#[derive(Debug, Clone, Copy)]
pub struct LengthPrefixedScheme<const N: usize> {
    names: [&'static str; N],
}

impl<const N: usize> LengthPrefixedScheme<N> {
    pub const fn new(names: [&'static str; N]) -> Self {
        Self { names }
    }

    pub fn expected(&self) -> String {
        self.names
            .iter()
            .map(|name| format!("<len>:{},", name))
            .collect()
    }

    pub fn create(&self, parts: [&str; N]) -> Result<String, IdError> {
        let mut id = String::new();
        for (name, part) in self.names.iter().zip(parts) {
            if part.is_empty() {
                return Err(IdError::EmptyPart {
                    name: name.to_string(),
                });
            }
            id.push_str(&format!("{}:{},", part.len(), part));
        }
        Ok(id)
    }

    pub fn parse(&self, id: &str) -> Result<[String; N], IdError> {
        let malformed = || IdError::unexpected_format(id, self.expected());

        let mut parts: [String; N] = std::array::from_fn(|_| String::new());
        let mut rest = id;
        for slot in parts.iter_mut() {
            let (len, tail) = rest.split_once(':').ok_or_else(malformed)?;
            if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            let len: usize = len.parse().map_err(|_| malformed())?;
            let value = tail.get(..len).ok_or_else(malformed)?;
            if value.is_empty() {
                return Err(malformed());
            }
            rest = tail[len..].strip_prefix(',').ok_or_else(malformed)?;
            *slot = value.to_string();
        }

        if !rest.is_empty() {
            return Err(malformed());
        }
        Ok(parts)
    }
}
