/// Result alias used throughout the crate.
pub type EmberResult<T> = Result<T, EmberError>;

/// Errors reported by ember.
#[derive(thiserror::Error, Debug)]
pub enum EmberError {
    /// A caller-provided value is out of range or inconsistent.
    #[error("validation error: {0}")]
    Validation(String),

    /// A scratch or buffer allocation failed or its size overflowed.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// Work could not be carried out on otherwise valid input.
    #[error("render error: {0}")]
    Render(String),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EmberError {
    /// Build a [`EmberError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`EmberError::Allocation`].
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`EmberError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`EmberError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Allocate a zero-filled scratch vector, reporting failure instead of aborting.
///
/// `what` names the buffer in the error message.
pub(crate) fn try_alloc_zeroed<T: Clone + Default>(
    len: usize,
    what: &str,
) -> EmberResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|e| {
        EmberError::allocation(format!(
            "{what}: failed to reserve {len} elements of {} bytes: {e}",
            std::mem::size_of::<T>()
        ))
    })?;
    v.resize(len, T::default());
    Ok(v)
}

/// `a * b * ...` with overflow reported as an allocation error.
pub(crate) fn checked_len(factors: &[usize], what: &str) -> EmberResult<usize> {
    factors.iter().try_fold(1usize, |acc, &f| {
        acc.checked_mul(f)
            .ok_or_else(|| EmberError::allocation(format!("{what}: buffer size overflow")))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
