//! Error records captured during a run.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::InvocationId;

/// Category used for units that panicked instead of returning an error.
pub const PANIC_CATEGORY: &str = "Panic";

/// Shared, type-erased error cause.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Where a captured failure came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorSource<I> {
    /// A single unit of work, identified by its submission index and input.
    Unit { index: usize, input: Option<I> },
    /// The invocation as a whole (barrier or host failures).
    Invocation,
}

impl<I> ErrorSource<I> {
    /// The input of the failing unit, if any.
    pub fn input(&self) -> Option<&I> {
        match self {
            Self::Unit { input, .. } => input.as_ref(),
            Self::Invocation => None,
        }
    }
}

/// A captured failure, ready to be reported to a pipeline host.
#[derive(Clone, Serialize)]
pub struct ErrorRecord<I> {
    /// Kind of failure: an explicit [`Categorized`] tag found in the cause,
    /// otherwise the short type name of the cause, e.g. `Boom`.
    pub category: String,
    /// Display text of the cause.
    pub message: String,
    /// What failed.
    pub source: ErrorSource<I>,
    /// The invocation that produced this record.
    pub invocation_id: InvocationId,
    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
    #[serde(skip)]
    cause: Cause,
}

impl<I> ErrorRecord<I> {
    /// Record a failure of the unit at `index`.
    pub fn unit<E>(invocation_id: InvocationId, index: usize, input: Option<I>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::with_category(
            category_for(&cause),
            ErrorSource::Unit { index, input },
            invocation_id,
            Arc::new(cause),
        )
    }

    /// Record a failure of the invocation itself.
    pub fn invocation<E>(invocation_id: InvocationId, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::with_category(
            category_for(&cause),
            ErrorSource::Invocation,
            invocation_id,
            Arc::new(cause),
        )
    }

    /// Record a unit that panicked.
    pub fn panic(
        invocation_id: InvocationId,
        index: usize,
        input: Option<I>,
        payload: &(dyn Any + Send),
    ) -> Self {
        let cause = UnitPanic {
            message: panic_message(payload),
        };
        Self::with_category(
            PANIC_CATEGORY.to_string(),
            ErrorSource::Unit { index, input },
            invocation_id,
            Arc::new(cause),
        )
    }

    fn with_category(
        category: String,
        source: ErrorSource<I>,
        invocation_id: InvocationId,
        cause: Cause,
    ) -> Self {
        Self {
            category,
            message: cause.to_string(),
            source,
            invocation_id,
            occurred_at: Utc::now(),
            cause,
        }
    }

    /// Try to recover the concrete cause type.
    pub fn downcast_cause<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause.downcast_ref::<E>()
    }
}

impl<I: fmt::Debug> fmt::Debug for ErrorRecord<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorRecord")
            .field("category", &self.category)
            .field("message", &self.message)
            .field("source", &self.source)
            .field("invocation_id", &self.invocation_id)
            .field("occurred_at", &self.occurred_at)
            .finish()
    }
}

impl<I> fmt::Display for ErrorRecord<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Error standing in for a panic payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unit panicked: {message}")]
pub struct UnitPanic {
    pub message: String,
}

/// An error tagged with the category it should be reported under.
///
/// Wrap a cause in `Categorized` when its static type says too little, e.g.
/// an `io::Error` carrying a domain error, or one variant of a broad enum.
/// The tag is found anywhere in the cause chain, including inside an
/// `io::Error`. Display and `source` are those of the wrapped error.
pub struct Categorized {
    category: String,
    inner: Box<dyn StdError + Send + Sync + 'static>,
}

impl Categorized {
    /// Tag `err` with `category`.
    pub fn new<E>(category: impl Into<String>, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            category: category.into(),
            inner: Box::new(err),
        }
    }

    /// Tag `err` with the short name of its own type, so the name survives
    /// being wrapped.
    pub fn of<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(category_of::<E>(), err)
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

impl fmt::Debug for Categorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Categorized")
            .field("category", &self.category)
            .field("inner", &self.inner)
            .finish()
    }
}

impl fmt::Display for Categorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for Categorized {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

/// Short type name of `E`, without generic arguments.
///
/// Crate types keep only their name (`Boom`). Standard library types keep
/// their top-level module as well (`io::Error`, `num::ParseIntError`), since
/// many of their names are not unique.
pub fn category_of<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    let segments: Vec<&str> = base.split("::").collect();
    match segments.as_slice() {
        [root, module, .., name] if matches!(*root, "std" | "core" | "alloc") => {
            format!("{module}::{name}")
        }
        [.., name] => (*name).to_string(),
        [] => base.to_string(),
    }
}

fn category_for<E>(cause: &E) -> String
where
    E: StdError + 'static,
{
    explicit_category(cause).unwrap_or_else(category_of::<E>)
}

/// First [`Categorized`] tag in the chain of `err`.
fn explicit_category(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(tagged) = err.downcast_ref::<Categorized>() {
            return Some(tagged.category().to_string());
        }
        // `io::Error::source` skips the custom payload itself.
        if let Some(inner) = err
            .downcast_ref::<std::io::Error>()
            .and_then(|io| io.get_ref())
        {
            if let Some(category) = explicit_category(inner) {
                return Some(category);
            }
        }
        current = err.source();
    }
    None
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
