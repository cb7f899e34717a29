//! Key ranges and iteration direction for ordered scans.

/// Iteration order over keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Next,
    /// Descending.
    Prev,
}

impl Direction {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            Direction::Next => "ASC",
            Direction::Prev => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    key: String,
    open: bool,
}

/// A contiguous interval of keys. Either end may be absent (unbounded)
/// or open (exclusive).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyRange {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl KeyRange {
    /// Every key.
    pub fn all() -> Self {
        Self::default()
    }

    /// Keys at or above `key` (strictly above when `open`).
    pub fn lower_bound(key: impl Into<String>, open: bool) -> Self {
        Self {
            lower: Some(Bound { key: key.into(), open }),
            upper: None,
        }
    }

    /// Keys at or below `key` (strictly below when `open`).
    pub fn upper_bound(key: impl Into<String>, open: bool) -> Self {
        Self {
            lower: None,
            upper: Some(Bound { key: key.into(), open }),
        }
    }

    pub fn bound(
        lower: impl Into<String>,
        upper: impl Into<String>,
        lower_open: bool,
        upper_open: bool,
    ) -> Self {
        Self {
            lower: Some(Bound { key: lower.into(), open: lower_open }),
            upper: Some(Bound { key: upper.into(), open: upper_open }),
        }
    }

    /// Exactly one key.
    pub fn only(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::bound(key.clone(), key, false, false)
    }

    /// In-memory equivalent of [`KeyRange::sql`].
    #[cfg(test)]
    pub(crate) fn contains(&self, key: &str) -> bool {
        let above = match &self.lower {
            Some(b) if b.open => key > b.key.as_str(),
            Some(b) => key >= b.key.as_str(),
            None => true,
        };
        let below = match &self.upper {
            Some(b) if b.open => key < b.key.as_str(),
            Some(b) => key <= b.key.as_str(),
            None => true,
        };
        above && below
    }

    /// SQL condition over `column` plus its parameters, for appending to a
    /// `WHERE` clause with positional `?` placeholders.
    pub(crate) fn sql(&self, column: &str) -> (String, Vec<String>) {
        let mut clause = String::new();
        let mut params = Vec::new();
        if let Some(b) = &self.lower {
            clause.push_str(&format!(" AND {} {} ?", column, if b.open { ">" } else { ">=" }));
            params.push(b.key.clone());
        }
        if let Some(b) = &self.upper {
            clause.push_str(&format!(" AND {} {} ?", column, if b.open { "<" } else { "<=" }));
            params.push(b.key.clone());
        }
        (clause, params)
    }
}
