//! The interception engine.
//!
//! [`Sampler`] owns the sample repository, the codec registry and the
//! recording session, and implements the contract any interception
//! mechanism programs against: hand over a pending invocation plus a thunk
//! for the original implementation, act on the returned decision. The
//! engine never depends on how calls are intercepted: hand-written
//! wrapper objects, generated adapters and trait objects all work.

use crate::codec::{CapturedValue, CodecRegistry};
use crate::error::{Error, Result};
use crate::matcher::Phase;
use crate::persistence::{self, RecordingSession, SampleSource, SampleTarget};
use crate::registry::SampleRepository;
use crate::sample::{Behavior, MethodIdentity, SampleDefinition};
use std::any::Any;
use std::cell::RefCell;
use std::path::PathBuf;
use tracing::info;

/// A pending call on a stubbed method: the method identity plus the actual
/// arguments, captured in declaration order.
#[derive(Debug)]
pub struct Invocation {
    method: MethodIdentity,
    args: Vec<CapturedValue>,
}

impl Invocation {
    pub fn of(method: &MethodIdentity) -> Self {
        Self {
            method: *method,
            args: Vec::new(),
        }
    }

    /// Capture the next argument.
    pub fn arg<T: Any + Clone>(mut self, value: T) -> Self {
        self.args.push(CapturedValue::new(value));
        self
    }

    pub fn method(&self) -> &MethodIdentity {
        &self.method
    }

    pub fn args(&self) -> &[CapturedValue] {
        &self.args
    }
}

/// What the interception mechanism should do with a pending call.
#[derive(Debug)]
pub enum Decision {
    /// Return this stubbed (or previously recorded) value instead of
    /// calling the original implementation.
    Return(CapturedValue),
    /// Raise this error value instead of calling the original.
    Raise(CapturedValue),
    /// Invoke the original implementation; when a sample id is present,
    /// report the returned value back via [`Sampler::report`] for capture.
    Delegate { sample_id: Option<String> },
    /// No declared sample applies; invoke the original implementation.
    NoMatch,
}

/// A reusable bundle of sample declarations, activated once per test.
pub trait SamplerFixture {
    fn define_samplers(&self, sampler: &mut Sampler) -> Result<()>;
}

/// The engine: registry, codecs, recording state and persistence settings
/// behind one handle, passed by reference to every collaborator.
///
/// Designed for synchronous, single-threaded test execution; interception,
/// matching and persistence all run on the calling thread.
#[derive(Default)]
pub struct Sampler {
    codecs: CodecRegistry,
    repository: SampleRepository,
    recordings: RefCell<RecordingSession>,
    recording_active: bool,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    /// Register a sample definition.
    pub fn define(&mut self, definition: SampleDefinition) -> Result<()> {
        self.repository.define(definition)
    }

    /// Activate a fixture: every previously declared sample is dropped
    /// first, so activation fully replaces prior state.
    pub fn activate(&mut self, fixture: &dyn SamplerFixture) -> Result<()> {
        self.clear();
        fixture.define_samplers(self)?;
        info!(methods = self.repository.method_keys().len(), "fixture activated");
        Ok(())
    }

    /// Drop every declared sample and all captured calls, and stop
    /// recording. Idempotent.
    pub fn clear(&mut self) {
        self.repository.clear();
        self.recordings.borrow_mut().clear();
        self.recording_active = false;
    }

    pub fn is_empty(&self) -> bool {
        self.repository.is_empty()
    }

    /// Switch resolution to the record phase and start capturing delegated
    /// calls that match a recording declaration.
    pub fn start_recording(&mut self) {
        self.recording_active = true;
    }

    pub fn is_recording(&self) -> bool {
        self.recording_active
    }

    /// Number of calls captured so far in this session.
    pub fn recorded_calls(&self) -> usize {
        self.recordings.borrow().len()
    }

    fn phase(&self) -> Phase {
        if self.recording_active {
            Phase::Record
        } else {
            Phase::Replay
        }
    }

    /// Resolve a pending invocation against the repository.
    pub fn resolve(&self, invocation: &Invocation) -> Result<Decision> {
        let resolved = self.repository.resolve(
            invocation.method(),
            invocation.args(),
            &self.codecs,
            self.phase(),
        )?;
        let Some(definition) = resolved else {
            return Ok(Decision::NoMatch);
        };
        Ok(match definition.behavior() {
            Behavior::Return(value) => Decision::Return(value.clone()),
            Behavior::Raise(error) => Decision::Raise(error.clone()),
            Behavior::Record { sample_id } => Decision::Delegate {
                sample_id: self.recording_active.then(|| sample_id.clone()),
            },
        })
    }

    /// Report a delegated call's outcome for capture. Interception
    /// mechanisms that drive [`Sampler::resolve`] themselves call this when
    /// the decision carried a sample id.
    pub fn report(&self, invocation: &Invocation, sample_id: &str, returned: CapturedValue) {
        self.recordings.borrow_mut().capture(
            sample_id,
            invocation.method(),
            invocation.args().to_vec(),
            returned,
        );
    }

    /// Interception helper for infallible methods: resolve, then either
    /// hand back the stub value or run the original (capturing its result
    /// while recording).
    pub fn call<R, F>(&self, invocation: Invocation, original: F) -> Result<R>
    where
        R: Any + Clone,
        F: FnOnce() -> R,
    {
        match self.resolve(&invocation)? {
            Decision::Return(value) => value.extract::<R>().ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "stub for {} returns a {} but the method expects {}",
                    invocation.method().key(),
                    value.short_name(),
                    invocation.method().returns
                ))
            }),
            Decision::Raise(_) => Err(Error::InvalidConfig(format!(
                "stub for {} raises an error but the method has no error path",
                invocation.method().key()
            ))),
            Decision::Delegate { sample_id } => {
                let returned = original();
                if let Some(sample_id) = sample_id {
                    self.report(&invocation, &sample_id, CapturedValue::new(returned.clone()));
                }
                Ok(returned)
            }
            Decision::NoMatch => Ok(original()),
        }
    }

    /// Interception helper for `Result`-returning methods. A `Raise` stub
    /// becomes the method's error value. Only successful results are
    /// captured while recording.
    pub fn call_fallible<R, E, F>(
        &self,
        invocation: Invocation,
        original: F,
    ) -> Result<std::result::Result<R, E>>
    where
        R: Any + Clone,
        E: Any + Clone,
        F: FnOnce() -> std::result::Result<R, E>,
    {
        match self.resolve(&invocation)? {
            Decision::Return(value) => {
                let returned = value.extract::<R>().ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "stub for {} returns a {} but the method expects {}",
                        invocation.method().key(),
                        value.short_name(),
                        invocation.method().returns
                    ))
                })?;
                Ok(Ok(returned))
            }
            Decision::Raise(error) => {
                let raised = error.extract::<E>().ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "stub for {} raises a {} but the method's error type differs",
                        invocation.method().key(),
                        error.short_name()
                    ))
                })?;
                Ok(Err(raised))
            }
            Decision::Delegate { sample_id } => {
                let outcome = original();
                if let (Some(sample_id), Ok(returned)) = (sample_id, &outcome) {
                    self.report(&invocation, &sample_id, CapturedValue::new(returned.clone()));
                }
                Ok(outcome)
            }
            Decision::NoMatch => Ok(original()),
        }
    }

    /// Flush all captured calls to a sample document.
    pub fn save_recordings(&self, target: &SampleTarget) -> Result<PathBuf> {
        persistence::save(&self.recordings.borrow(), target, &self.codecs)
    }

    /// Load a sample document and replace each matching recording
    /// declaration with the recorded calls, ready for replay.
    pub fn load_samples(&mut self, source: &SampleSource) -> Result<()> {
        let loaded = persistence::load(source, &self.repository, &self.codecs)?;
        for (sample_id, definitions) in loaded {
            self.repository.replace_recording(&sample_id, definitions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::ArgumentMatcher;

    const GET_NAME: MethodIdentity =
        MethodIdentity::new("PersonDao", "get_name", &["i32"], "String");

    #[test]
    fn test_stubbed_call_returns_the_sample_value() {
        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::equal_to(1i32))
                    .returns("Sarek".to_string()),
            )
            .unwrap();

        let name = sampler
            .call(Invocation::of(&GET_NAME).arg(1i32), || {
                "Geordi La Forge".to_string()
            })
            .unwrap();
        assert_eq!(name, "Sarek");
    }

    #[test]
    fn test_unmatched_call_delegates_to_the_original() {
        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::equal_to(1i32))
                    .returns("Sarek".to_string()),
            )
            .unwrap();

        let name = sampler
            .call(Invocation::of(&GET_NAME).arg(2i32), || {
                "Geordi La Forge".to_string()
            })
            .unwrap();
        assert_eq!(name, "Geordi La Forge");
    }

    #[test]
    fn test_clear_restores_the_original_behavior() {
        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::any())
                    .returns("Sarek".to_string()),
            )
            .unwrap();

        sampler.clear();
        assert!(sampler.is_empty());

        let name = sampler
            .call(Invocation::of(&GET_NAME).arg(1i32), || {
                "Geordi La Forge".to_string()
            })
            .unwrap();
        assert_eq!(name, "Geordi La Forge");
    }

    #[test]
    fn test_recording_captures_delegated_calls() {
        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::any_of::<i32>())
                    .records("getName"),
            )
            .unwrap();
        sampler.start_recording();

        let name = sampler
            .call(Invocation::of(&GET_NAME).arg(1i32), || {
                "Geordi La Forge".to_string()
            })
            .unwrap();
        assert_eq!(name, "Geordi La Forge");
        assert_eq!(sampler.recorded_calls(), 1);
    }

    #[test]
    fn test_recording_declaration_without_recording_mode_just_delegates() {
        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::any_of::<i32>())
                    .records("getName"),
            )
            .unwrap();

        sampler
            .call(Invocation::of(&GET_NAME).arg(1i32), || "x".to_string())
            .unwrap();
        assert_eq!(sampler.recorded_calls(), 0);
    }

    #[test]
    fn test_raise_surfaces_through_fallible_calls() {
        #[derive(Debug, Clone, PartialEq)]
        struct DaoError(String);

        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::any())
                    .raises(DaoError("not found".to_string())),
            )
            .unwrap();

        let outcome = sampler
            .call_fallible(Invocation::of(&GET_NAME).arg(1i32), || {
                Ok::<_, DaoError>("unused".to_string())
            })
            .unwrap();
        assert_eq!(outcome, Err(DaoError("not found".to_string())));
    }

    #[test]
    fn test_mismatched_stub_type_is_a_configuration_error() {
        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::any())
                    .returns(42i32),
            )
            .unwrap();

        let err = sampler
            .call(Invocation::of(&GET_NAME).arg(1i32), || String::new())
            .unwrap_err();
        match err {
            Error::InvalidConfig(message) => {
                assert!(message.contains("PersonDao::get_name(i32)"));
                assert!(message.contains("i32"));
            }
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_activate_replaces_previous_state() {
        struct SarekFixture;

        impl SamplerFixture for SarekFixture {
            fn define_samplers(&self, sampler: &mut Sampler) -> Result<()> {
                sampler.define(
                    SampleDefinition::for_method(&GET_NAME)
                        .arg(ArgumentMatcher::any())
                        .returns("Sarek".to_string()),
                )
            }
        }

        let mut sampler = Sampler::new();
        sampler
            .define(
                SampleDefinition::for_method(&GET_NAME)
                    .arg(ArgumentMatcher::any())
                    .returns("Stale".to_string()),
            )
            .unwrap();

        sampler.activate(&SarekFixture).unwrap();

        let name = sampler
            .call(Invocation::of(&GET_NAME).arg(1i32), || String::new())
            .unwrap();
        assert_eq!(name, "Sarek");
    }
}
