use crate::ast::{Lambda, Selector};

/// Sort direction of one comparator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One key of a comparator.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub selector: Selector,
    pub direction: Direction,
}

/// Comparator built from one or more keys; later keys break ties of earlier ones.
///
/// # Examples
/// ```text
/// by age
/// by weight descending
/// by predator descending then by name
/// descending
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Comparator {
    pub keys: Vec<SortKey>,
}

impl Comparator {
    /// Natural ordering of the element, ascending.
    pub fn natural() -> Self {
        Comparator {
            keys: vec![SortKey {
                selector: Selector::Identity,
                direction: Direction::Ascending,
            }],
        }
    }
}

/// Terminal aggregator used by `collect`.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    /// `toList()` - keep the sequence as a list
    ToList,
    /// `toSet()` - distinct elements in natural order
    ToSet,
    /// `counting()` - number of elements
    Counting,
    /// `joining(sep)` - concatenate text elements
    Joining(String),
    /// `summing(selector)` - overflow-checked sum
    Summing(Selector),
}

/// Pipeline stage.
///
/// A chain is an ordered sequence of stages; each stage consumes the output
/// of the previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Keep elements for which the predicate holds
    ///
    /// # Example
    /// ```text
    /// .filter(a -> a.predator)
    /// ```
    Filter(Selector),

    /// Replace every element by the value of the expression
    ///
    /// # Example
    /// ```text
    /// .map(a -> a.name.upper())
    /// ```
    Map(Selector),

    /// Replace every element by the elements of a sequence
    ///
    /// # Example
    /// ```text
    /// .flatMap(x -> range(0, x))
    /// ```
    FlatMap(Lambda),

    /// Stable sort; `None` sorts by natural ordering
    ///
    /// # Example
    /// ```text
    /// .sorted(by age)
    /// ```
    Sort(Option<Comparator>),

    /// Drop structurally-equal repeats, keeping the first
    Distinct,

    /// Single element with the greatest key
    MaxBy(Comparator),

    /// Single element with the least key
    MinBy(Comparator),

    /// Overflow-checked sum of a numeric selector
    SumBy(Selector),

    /// Partition by key; following stages run per group
    GroupBy(Selector),

    /// Terminal aggregation
    Collect(Aggregator),

    /// Keep at most `n` elements
    Limit(usize),

    /// Drop the first `n` elements
    Skip(usize),
}

impl Operation {
    /// Name used in messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Filter(_) => "filter",
            Operation::Map(_) => "map",
            Operation::FlatMap(_) => "flatMap",
            Operation::Sort(_) => "sorted",
            Operation::Distinct => "distinct",
            Operation::MaxBy(_) => "max",
            Operation::MinBy(_) => "min",
            Operation::SumBy(_) => "sum",
            Operation::GroupBy(_) => "groupBy",
            Operation::Collect(_) => "collect",
            Operation::Limit(_) => "limit",
            Operation::Skip(_) => "skip",
        }
    }
}
