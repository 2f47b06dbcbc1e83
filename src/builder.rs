//! Builder pattern utilities
//!
//! Marker types for builders that validate required parameters at compile
//! time: a builder method is only available once its required fields are [`Set`].

/// A required builder field that has not been provided yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unset;

/// A required builder field that has been provided.
#[derive(Debug, Clone)]
pub struct Set<T> {
    value: T,
}

impl<T> Set<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Consumes the wrapper and returns the inner value.
    pub fn into_inner(self) -> T {
        self.value
    }
}
