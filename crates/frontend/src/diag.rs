use std::fmt;

/// A source position. Lines and columns are 1-based; built-in symbols use
/// the sentinel `0:0` since they have no place in the user's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(line: usize, col: usize) -> Self {
        Pos { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Syntax,
    Semantic,
    Type,
    Internal,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Syntax => "Syntax error",
            Category::Semantic => "Semantic error",
            Category::Type => "Type error",
            Category::Internal => "Internal compiler error",
        };
        f.write_str(name)
    }
}

/// One user-facing compiler message, printed to stderr as
/// `[line:col] Category: message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub category: Category,
    pub message: String,
}

impl Diagnostic {
    pub fn new(pos: Pos, category: Category, message: impl Into<String>) -> Self {
        Diagnostic {
            pos,
            category,
            message: message.into(),
        }
    }

    pub fn syntax(pos: Pos, message: impl Into<String>) -> Self {
        Diagnostic::new(pos, Category::Syntax, message)
    }

    pub fn semantic(pos: Pos, message: impl Into<String>) -> Self {
        Diagnostic::new(pos, Category::Semantic, message)
    }

    pub fn type_error(pos: Pos, message: impl Into<String>) -> Self {
        Diagnostic::new(pos, Category::Type, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.pos, self.category, self.message)
    }
}
