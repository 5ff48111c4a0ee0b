//! Callsample
//!
//! A call-interception, stubbing and record/replay engine for automated
//! tests: replace selected methods on collaborator objects with
//! deterministic, declaratively defined results ("samples"), independent of
//! which wrapper or proxying mechanism hosts the intercepted object.
//!
//! # Features
//!
//! - **Argument Matching**: match by equality, type, regex, or a custom
//!   comparison; first declared match wins
//! - **Stubbing**: return fixed values or raise fixed errors
//! - **Recording**: capture real calls (arguments + return value) while
//!   tests run against the real implementation
//! - **Replay**: serve recorded values from a JSON or YAML document instead
//!   of invoking the original
//! - **Codec Registry**: explicit per-type conversion to a
//!   serialization-neutral value model, with converter extensions and
//!   per-type serializer overrides
//! - **Lifecycle**: activate fixtures per test, clear all state between
//!   tests
//!
//! # Example
//!
//! ```
//! use callsample::{ArgumentMatcher, Invocation, MethodIdentity, SampleDefinition, Sampler};
//!
//! const GET_NAME: MethodIdentity =
//!     MethodIdentity::new("PersonDao", "get_name", &["i32"], "String");
//!
//! let mut sampler = Sampler::new();
//! sampler.define(
//!     SampleDefinition::for_method(&GET_NAME)
//!         .arg(ArgumentMatcher::equal_to(1i32))
//!         .returns("Sarek".to_string()),
//! )?;
//!
//! // Inside an interception wrapper:
//! let name = sampler.call(Invocation::of(&GET_NAME).arg(1i32), || {
//!     "Geordi La Forge".to_string() // the real implementation
//! })?;
//! assert_eq!(name, "Sarek");
//!
//! sampler.clear();
//! # Ok::<(), callsample::Error>(())
//! ```

pub mod codec;
pub mod error;
pub mod intercept;
pub mod matcher;
pub mod persistence;
pub mod registry;
pub mod sample;
pub mod value;

pub use codec::{Bean, CapturedValue, CodecRegistry, ConverterExtension, TypeInfo};
pub use error::{Error, Result};
pub use intercept::{Decision, Invocation, Sampler, SamplerFixture};
pub use matcher::{ArgumentMatcher, Phase};
pub use persistence::{
    derive_document_name, DocumentFormat, SampleDocument, SampleSource, SampleTarget,
};
pub use registry::SampleRepository;
pub use sample::{Behavior, MethodIdentity, SampleDefinition};
pub use value::{PersistentBean, Value};
