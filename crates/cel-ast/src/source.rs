use indexmap::IndexMap;

use crate::{Expr, ExprId};

/// A line/column pair. Lines are 1-based, columns 0-based and counted in
/// characters. `Location::NONE` marks diagnostics with no source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: i32,
    pub column: i32,
}

impl Location {
    pub const NONE: Location = Location {
        line: -1,
        column: -1,
    };

    pub fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }
}

/// Expression text plus the line table needed to map offsets to locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    content: String,
    description: String,
    /// Byte offset at which each line starts.
    line_starts: Vec<u32>,
}

impl Source {
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_description(content, "<input>")
    }

    pub fn with_description(content: impl Into<String>, description: impl Into<String>) -> Self {
        let content = content.into();
        let mut line_starts = vec![0];
        line_starts.extend(
            content
                .match_indices('\n')
                .map(|(idx, _)| idx as u32 + 1),
        );
        Self {
            content,
            description: description.into(),
            line_starts,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn location(&self, offset: u32) -> Location {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .content
            .get(start as usize..offset as usize)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset.saturating_sub(start) as usize);
        Location::new(line as i32, column as i32)
    }

    /// Text of a 1-based line without its terminator.
    pub fn snippet(&self, line: i32) -> Option<&str> {
        if line < 1 {
            return None;
        }
        let idx = line as usize - 1;
        let start = *self.line_starts.get(idx)? as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&next| next as usize - 1)
            .unwrap_or(self.content.len());
        self.content.get(start..end)
    }
}

/// Source metadata produced alongside an expression tree.
///
/// `positions` maps every allocated id (including ids never attached to a
/// node) to the byte offset it was allocated at. `macro_calls` maps the id
/// of each macro expansion to the call it replaced, when the parser was
/// asked to keep them.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Source,
    pub positions: IndexMap<ExprId, u32>,
    pub macro_calls: IndexMap<ExprId, Expr>,
}

impl SourceInfo {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            positions: IndexMap::new(),
            macro_calls: IndexMap::new(),
        }
    }

    pub fn offset(&self, id: ExprId) -> Option<u32> {
        self.positions.get(&id).copied()
    }

    /// The call a macro expansion rooted at `id` was built from.
    pub fn macro_call(&self, id: ExprId) -> Option<&Expr> {
        self.macro_calls.get(&id)
    }

    pub fn location(&self, id: ExprId) -> Location {
        self.offset(id)
            .map(|offset| self.source.location(offset))
            .unwrap_or(Location::NONE)
    }
}
