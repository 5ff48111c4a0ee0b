//! Argument matching logic.
//!
//! Matches the arguments of an intercepted call against a sample
//! definition's declared expectations. Matching is positional; a definition
//! applies only when every matcher accepts its argument.

use crate::codec::{CapturedValue, CodecRegistry};
use crate::error::{Error, Result};
use regex::Regex;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Resolution phase. Recording stays permissive, replay stays precise; a
/// [`ArgumentMatcher::Combo`] evaluates a different side per phase, every
/// other matcher behaves identically in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Record,
    Replay,
}

/// Context handed to matchers during resolution.
pub struct MatchContext<'a> {
    pub codecs: &'a CodecRegistry,
    pub phase: Phase,
    /// Method key, for error messages.
    pub method: &'a str,
}

/// A type-erased two-argument comparison, `(expected, actual)`.
pub type Comparator = Arc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// How a loaded argument value is compared against an actual argument
/// during replay.
#[derive(Clone)]
pub enum ReplayComparator {
    /// Value equality as registered with the type's codec. A type whose
    /// codec carries no equality raises [`Error::InvalidConfig`] at first
    /// match attempt.
    Equality,
    /// A user-supplied comparison, bypassing the type's own equality.
    Predicate(Comparator),
}

impl ReplayComparator {
    fn compare(
        &self,
        expected: &CapturedValue,
        actual: &CapturedValue,
        ctx: &MatchContext,
    ) -> Result<bool> {
        if expected.type_id() != actual.type_id() {
            return Ok(false);
        }
        match self {
            ReplayComparator::Equality => {
                let eq = ctx.codecs.equality(expected.type_id()).ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "the type {} must have registered equality to be used \
                         with an equality matcher (method {})",
                        expected.short_name(),
                        ctx.method
                    ))
                })?;
                Ok(eq(expected.as_any(), actual.as_any()))
            }
            ReplayComparator::Predicate(compare) => {
                Ok(compare(expected.as_any(), actual.as_any()))
            }
        }
    }
}

/// Where an equality matcher takes its comparison from.
#[derive(Clone, Copy)]
pub enum EqSource {
    /// Captured at declaration time from a `PartialEq` bound.
    Static(fn(&dyn Any, &dyn Any) -> bool),
    /// Resolved lazily from the codec registry; missing equality raises
    /// [`Error::InvalidConfig`] naming the type and method.
    FromCodec,
}

/// A declared expectation for one argument position.
#[derive(Clone)]
pub enum ArgumentMatcher {
    /// Matches anything.
    Any,
    /// Matches any value of one concrete type.
    AnyOfType {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Matches by value equality.
    EqualTo {
        expected: CapturedValue,
        eq: EqSource,
    },
    /// Matches via a user-supplied comparison against a declared value.
    Predicate {
        expected: CapturedValue,
        compare: Comparator,
    },
    /// Matches string arguments against a regular expression.
    Regex { pattern: Regex },
    /// A record-phase matcher paired with a replay-phase comparator. The
    /// comparator runs against the recorded value bound by the loader; the
    /// two sides never share state.
    Combo {
        record: Box<ArgumentMatcher>,
        replay: ReplayComparator,
        bound: Option<CapturedValue>,
    },
}

impl ArgumentMatcher {
    pub fn any() -> Self {
        ArgumentMatcher::Any
    }

    pub fn any_of<T: Any>() -> Self {
        ArgumentMatcher::AnyOfType {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn equal_to<T: Any + Clone + PartialEq>(expected: T) -> Self {
        ArgumentMatcher::EqualTo {
            expected: CapturedValue::new(expected),
            eq: EqSource::Static(static_eq::<T>),
        }
    }

    /// Equality matcher whose comparison is looked up in the codec registry
    /// at match time. Used for loaded samples, where the declaration never
    /// names the concrete type.
    pub fn equal_to_loaded(expected: CapturedValue) -> Self {
        ArgumentMatcher::EqualTo {
            expected,
            eq: EqSource::FromCodec,
        }
    }

    /// Custom comparison against a declared value, for types that cannot or
    /// should not implement equality.
    pub fn matching<T, F>(expected: T, compare: F) -> Self
    where
        T: Any + Clone,
        F: Fn(&T, &T) -> bool + 'static,
    {
        ArgumentMatcher::Predicate {
            expected: CapturedValue::new(expected),
            compare: erase_comparator(compare),
        }
    }

    /// Match string arguments against a regular expression.
    pub fn regex(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::InvalidConfig(format!("invalid regex matcher: {e}")))?;
        Ok(ArgumentMatcher::Regex { pattern })
    }

    /// Pair a permissive record-phase matcher with a replay comparator.
    pub fn combo<T, F>(record: ArgumentMatcher, compare: F) -> Self
    where
        T: Any,
        F: Fn(&T, &T) -> bool + 'static,
    {
        ArgumentMatcher::Combo {
            record: Box::new(record),
            replay: ReplayComparator::Predicate(erase_comparator(compare)),
            bound: None,
        }
    }

    /// The comparator the loader pairs with recorded argument values:
    /// a combo's replay side, value equality for everything else.
    pub fn replay_comparator(&self) -> ReplayComparator {
        match self {
            ArgumentMatcher::Combo { replay, .. } => replay.clone(),
            _ => ReplayComparator::Equality,
        }
    }

    /// Test one actual argument. Errors are raised, never swallowed: a
    /// matcher that cannot execute must not silently fall through.
    pub fn matches(&self, actual: &CapturedValue, ctx: &MatchContext) -> Result<bool> {
        match self {
            ArgumentMatcher::Any => Ok(true),
            ArgumentMatcher::AnyOfType { type_id, .. } => Ok(actual.type_id() == *type_id),
            ArgumentMatcher::EqualTo { expected, eq } => {
                if expected.type_id() != actual.type_id() {
                    return Ok(false);
                }
                let eq = match eq {
                    EqSource::Static(eq) => *eq,
                    EqSource::FromCodec => {
                        ctx.codecs.equality(expected.type_id()).ok_or_else(|| {
                            Error::InvalidConfig(format!(
                                "the type {} must have registered equality to be used \
                                 with an equality matcher (method {})",
                                expected.short_name(),
                                ctx.method
                            ))
                        })?
                    }
                };
                Ok(eq(expected.as_any(), actual.as_any()))
            }
            ArgumentMatcher::Predicate { expected, compare } => {
                Ok(compare(expected.as_any(), actual.as_any()))
            }
            ArgumentMatcher::Regex { pattern } => Ok(actual
                .downcast_ref::<String>()
                .map(|s| pattern.is_match(s))
                .unwrap_or(false)),
            ArgumentMatcher::Combo {
                record,
                replay,
                bound,
            } => match ctx.phase {
                Phase::Record => record.matches(actual, ctx),
                Phase::Replay => match bound {
                    Some(expected) => replay.compare(expected, actual, ctx),
                    None => Err(Error::InvalidConfig(format!(
                        "combo matcher for method {} has no recorded value bound; \
                         load samples before replaying",
                        ctx.method
                    ))),
                },
            },
        }
    }

    /// Copy of this matcher with a recorded value bound for replay.
    pub fn bind_recorded(&self, value: CapturedValue) -> Self {
        match self {
            ArgumentMatcher::Combo { record, replay, .. } => ArgumentMatcher::Combo {
                record: record.clone(),
                replay: replay.clone(),
                bound: Some(value),
            },
            _ => ArgumentMatcher::equal_to_loaded(value),
        }
    }
}

fn static_eq<T: Any + PartialEq>(left: &dyn Any, right: &dyn Any) -> bool {
    match (left.downcast_ref::<T>(), right.downcast_ref::<T>()) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

fn erase_comparator<T, F>(compare: F) -> Comparator
where
    T: Any,
    F: Fn(&T, &T) -> bool + 'static,
{
    Arc::new(move |left, right| {
        match (left.downcast_ref::<T>(), right.downcast_ref::<T>()) {
            (Some(l), Some(r)) => compare(l, r),
            _ => false,
        }
    })
}

impl fmt::Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArgumentMatcher::Any => f.write_str("any"),
            ArgumentMatcher::AnyOfType { type_name, .. } => {
                write!(f, "any_of<{}>", crate::codec::short_type_name(type_name))
            }
            ArgumentMatcher::EqualTo { expected, .. } => {
                write!(f, "equal_to<{}>", expected.short_name())
            }
            ArgumentMatcher::Predicate { expected, .. } => {
                write!(f, "matching<{}>", expected.short_name())
            }
            ArgumentMatcher::Regex { pattern } => write!(f, "regex({})", pattern.as_str()),
            ArgumentMatcher::Combo { record, bound, .. } => {
                write!(f, "combo({record:?}, bound: {})", bound.is_some())
            }
        }
    }
}
