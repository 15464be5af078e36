use core_items::IndexError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("column count must be at least 1 (got {0})")]
    InvalidColumns(usize),
    #[error("container width must be positive and finite (got {0})")]
    InvalidContainerWidth(f64),
    #[error("spacing must be non-negative and finite (got {0})")]
    InvalidSpacing(f64),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("layout engine requires a tokio runtime")]
    NoRuntime,
}
