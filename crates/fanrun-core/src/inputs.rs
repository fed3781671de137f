//! Input surfaces for an invocation.

/// The inputs of one invocation.
///
/// A caller picks exactly one surface per call. Named and piped inputs are
/// processed the same way; the distinction is kept for logging and for hosts
/// that want to know where items came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Inputs<I> {
    /// No inputs: the runner schedules a single unit with no item.
    #[default]
    None,
    /// Items given as a declared parameter list.
    Named(Vec<I>),
    /// Items bound from upstream.
    Piped(Vec<I>),
}

impl<I> Inputs<I> {
    /// Surface name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Named(_) => "named",
            Self::Piped(_) => "piped",
        }
    }

    /// Work items to schedule, one per unit.
    ///
    /// An empty surface yields a single `None` item so that exactly one unit
    /// runs.
    pub fn into_work_items(self) -> Vec<Option<I>> {
        match self {
            Self::Named(items) | Self::Piped(items) if !items.is_empty() => {
                items.into_iter().map(Some).collect()
            }
            _ => vec![None],
        }
    }
}
