//! Sample definitions.
//!
//! A sample is a declarative rule mapping a method call (identified by
//! method and argument matchers) to a stubbed behavior.

use crate::codec::CapturedValue;
use crate::error::{Error, Result};
use crate::matcher::ArgumentMatcher;
use std::any::Any;
use std::fmt;

/// Stable identity of a stubbed operation: target type, method name and
/// parameter-type signature. Declared once per stubbed method, usually as a
/// `const` next to the interception wrapper.
///
/// Parameter and return types are named by their path-stripped type names
/// (`i32`, `Person`), matching how codecs index types for document loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodIdentity {
    pub target: &'static str,
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub returns: &'static str,
}

impl MethodIdentity {
    pub const fn new(
        target: &'static str,
        name: &'static str,
        params: &'static [&'static str],
        returns: &'static str,
    ) -> Self {
        Self {
            target,
            name,
            params,
            returns,
        }
    }

    /// Primary key under which samples are grouped:
    /// `PersonDao::load_person(i32)`.
    pub fn key(&self) -> String {
        format!("{}::{}({})", self.target, self.name, self.params.join(", "))
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// What a matching sample definition does with the intercepted call.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return a fixed stub value.
    Return(CapturedValue),
    /// Raise a fixed error value; the interception wrapper hands it back to
    /// the caller as the method's error type.
    Raise(CapturedValue),
    /// Delegate to the real implementation and, while recording is active,
    /// capture the call under this sample id for later persistence.
    Record { sample_id: String },
}

/// One declared stub: a method, one matcher per parameter, and a behavior.
///
/// Definitions live for the duration of one test and are destroyed by the
/// lifecycle `clear` operation.
#[derive(Debug, Clone)]
pub struct SampleDefinition {
    method: MethodIdentity,
    matchers: Vec<ArgumentMatcher>,
    behavior: Behavior,
}

impl SampleDefinition {
    /// Start a definition for a method. Finish with
    /// [`SampleBuilder::returns`], [`SampleBuilder::raises`] or
    /// [`SampleBuilder::records`].
    pub fn for_method(method: &MethodIdentity) -> SampleBuilder {
        SampleBuilder {
            method: *method,
            matchers: Vec::new(),
        }
    }

    /// Used by the persistence loader to materialize recorded calls.
    pub(crate) fn from_parts(
        method: MethodIdentity,
        matchers: Vec<ArgumentMatcher>,
        behavior: Behavior,
    ) -> Self {
        Self {
            method,
            matchers,
            behavior,
        }
    }

    pub fn method(&self) -> &MethodIdentity {
        &self.method
    }

    pub fn matchers(&self) -> &[ArgumentMatcher] {
        &self.matchers
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    /// Sample id, when this definition records.
    pub fn sample_id(&self) -> Option<&str> {
        match &self.behavior {
            Behavior::Record { sample_id } => Some(sample_id),
            _ => None,
        }
    }

    /// Check the declaration against its method: one matcher per parameter,
    /// non-empty sample id for recording definitions.
    pub fn validate(&self) -> Result<()> {
        if self.matchers.len() != self.method.arity() {
            return Err(Error::InvalidConfig(format!(
                "method {} takes {} parameter(s) but {} matcher(s) were declared",
                self.method.key(),
                self.method.arity(),
                self.matchers.len()
            )));
        }
        if let Behavior::Record { sample_id } = &self.behavior {
            if sample_id.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "recording definition for {} has an empty sample id",
                    self.method.key()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for a [`SampleDefinition`].
#[derive(Debug)]
pub struct SampleBuilder {
    method: MethodIdentity,
    matchers: Vec<ArgumentMatcher>,
}

impl SampleBuilder {
    /// Append the matcher for the next parameter position.
    pub fn arg(mut self, matcher: ArgumentMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Stub the method with a fixed return value.
    pub fn returns<T: Any + Clone>(self, value: T) -> SampleDefinition {
        SampleDefinition {
            method: self.method,
            matchers: self.matchers,
            behavior: Behavior::Return(CapturedValue::new(value)),
        }
    }

    /// Stub the method with a fixed error value.
    pub fn raises<E: Any + Clone>(self, error: E) -> SampleDefinition {
        SampleDefinition {
            method: self.method,
            matchers: self.matchers,
            behavior: Behavior::Raise(CapturedValue::new(error)),
        }
    }

    /// Delegate to the real implementation and record matching calls under
    /// the given sample id.
    pub fn records(self, sample_id: impl Into<String>) -> SampleDefinition {
        SampleDefinition {
            method: self.method,
            matchers: self.matchers,
            behavior: Behavior::Record {
                sample_id: sample_id.into(),
            },
        }
    }

    /// Record under a deterministic id derived from the method identity.
    pub fn records_by_method(self) -> SampleDefinition {
        let sample_id = self.method.key();
        self.records(sample_id)
    }
}
