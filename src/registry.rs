//! The in-memory sample repository.
//!
//! Maps a stubbed method's key to the ordered list of sample definitions
//! declared for it. Resolution scans in registration order and selects the
//! first definition whose matchers all accept (no backtracking, no
//! scoring), so overlapping matchers behave exactly as tests read
//! top-to-bottom.

use crate::codec::{CapturedValue, CodecRegistry};
use crate::error::{Error, Result};
use crate::matcher::{MatchContext, Phase};
use crate::sample::{MethodIdentity, SampleDefinition};
use std::collections::HashMap;
use tracing::debug;

struct MethodSamples {
    method: MethodIdentity,
    definitions: Vec<SampleDefinition>,
}

/// Process-wide store of active sample definitions.
///
/// Created empty, populated by test setup, fully cleared between tests.
/// Not synchronized: callers that parallelize tests within one process
/// must serialize access themselves.
#[derive(Default)]
pub struct SampleRepository {
    methods: HashMap<String, MethodSamples>,
}

impl SampleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Definitions for the same method keep their
    /// insertion order; recording sample ids must be unique across the
    /// repository.
    pub fn define(&mut self, definition: SampleDefinition) -> Result<()> {
        definition.validate()?;
        if let Some(sample_id) = definition.sample_id() {
            if self.recording(sample_id).is_some() {
                return Err(Error::InvalidConfig(format!(
                    "sample id {sample_id:?} is already in use"
                )));
            }
        }

        let key = definition.method().key();
        let entry = self
            .methods
            .entry(key)
            .or_insert_with(|| MethodSamples {
                method: *definition.method(),
                definitions: Vec::new(),
            });
        entry.definitions.push(definition);
        Ok(())
    }

    /// Find the first definition (in registration order) whose matchers all
    /// accept the given arguments. `Ok(None)` means no match; the caller
    /// falls through to the real implementation. Matcher failures are
    /// raised, never treated as a non-match.
    pub fn resolve(
        &self,
        method: &MethodIdentity,
        args: &[CapturedValue],
        codecs: &CodecRegistry,
        phase: Phase,
    ) -> Result<Option<&SampleDefinition>> {
        let key = method.key();
        if args.len() != method.arity() {
            return Err(Error::InvalidConfig(format!(
                "method {key} takes {} parameter(s) but the invocation carries {}",
                method.arity(),
                args.len()
            )));
        }

        let Some(entry) = self.methods.get(&key) else {
            debug!(method = %key, "no samples declared");
            return Ok(None);
        };

        let ctx = MatchContext {
            codecs,
            phase,
            method: &key,
        };
        for (index, definition) in entry.definitions.iter().enumerate() {
            let mut accepted = true;
            for (matcher, actual) in definition.matchers().iter().zip(args) {
                if !matcher.matches(actual, &ctx)? {
                    accepted = false;
                    break;
                }
            }
            if accepted {
                debug!(method = %key, definition = index, ?phase, "sample matched");
                return Ok(Some(definition));
            }
        }

        debug!(method = %key, ?phase, "no sample matched");
        Ok(None)
    }

    /// The recording definition registered under a sample id, if any.
    pub fn recording(&self, sample_id: &str) -> Option<&SampleDefinition> {
        self.methods.values().flat_map(|entry| &entry.definitions).find(
            |definition| definition.sample_id() == Some(sample_id),
        )
    }

    /// Replace the recording declaration for `sample_id` with loaded
    /// definitions, at its original position so surrounding declarations
    /// keep their precedence.
    pub fn replace_recording(
        &mut self,
        sample_id: &str,
        loaded: Vec<SampleDefinition>,
    ) -> Result<()> {
        for entry in self.methods.values_mut() {
            if let Some(position) = entry
                .definitions
                .iter()
                .position(|definition| definition.sample_id() == Some(sample_id))
            {
                entry.definitions.splice(position..=position, loaded);
                return Ok(());
            }
        }
        Err(Error::MethodNotFound(format!(
            "no recording declaration for sample id {sample_id:?}"
        )))
    }

    /// Remove every definition. Idempotent; safe with no prior state.
    pub fn clear(&mut self) {
        self.methods.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Methods with at least one definition, for diagnostics.
    pub fn method_keys(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }
}
