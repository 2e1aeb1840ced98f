use log::debug;

/// Case-insensitive line search over the active buffer with a cyclic cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchEngine {
    query: String,
    matches: Vec<usize>,
    cursor: Option<usize>,
}

/// 1-based numbers of the lines containing `query`, ignoring case.
pub fn matching_lines(buffer: &str, query: &str) -> Vec<usize> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    buffer
        .lines()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .map(|(index, _)| index + 1)
        .collect()
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Line number under the cursor, if any.
    pub fn highlighted_line(&self) -> Option<usize> {
        self.cursor.and_then(|i| self.matches.get(i).copied())
    }

    /// Recomputes matches for `query` against `buffer` and resets the cursor
    /// to the first match. Returns the line to reveal.
    pub fn set_query(&mut self, buffer: &str, query: &str) -> Option<usize> {
        self.query = query.to_string();
        self.refresh(buffer)
    }

    /// Recomputes matches for the current query against a new buffer.
    pub fn refresh(&mut self, buffer: &str) -> Option<usize> {
        self.matches = matching_lines(buffer, &self.query);
        self.cursor = if self.matches.is_empty() { None } else { Some(0) };
        debug!(
            "Search '{}' found {} matching lines",
            self.query,
            self.matches.len()
        );
        self.highlighted_line()
    }

    pub fn next(&mut self) -> Option<usize> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        self.cursor = Some(self.cursor.map_or(0, |i| (i + 1) % len));
        self.highlighted_line()
    }

    pub fn previous(&mut self) -> Option<usize> {
        let len = self.matches.len();
        if len == 0 {
            return None;
        }
        self.cursor = Some(self.cursor.map_or(len - 1, |i| (i + len - 1) % len));
        self.highlighted_line()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
