//! Persistence of recorded invocations.
//!
//! Serializes a recording session to a structured, human-diffable document
//! (JSON by default, YAML as an alternative) keyed by sample id, and loads
//! such documents back into sample definitions for replay. Per-type
//! serializer overrides registered with the codec registry reshape the
//! document encoding of individual types at any nesting depth.

use crate::codec::{CapturedValue, CodecRegistry};
use crate::error::{Error, Result};
use crate::sample::{Behavior, MethodIdentity, SampleDefinition};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// One recorded call: converted argument values plus the converted return
/// value, in argument order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub args: Vec<Value>,
    pub returns: Value,
}

/// All calls recorded under one sample id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleEntry {
    /// Method key: `PersonDao::load_person(i32)`.
    pub method: String,
    /// Call records in capture order.
    pub calls: Vec<CallRecord>,
}

/// The on-disk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDocument {
    pub version: u32,
    pub samples: BTreeMap<String, SampleEntry>,
}

impl SampleDocument {
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            samples: BTreeMap::new(),
        }
    }

    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self> {
        let document: Self = match format {
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
        };
        Ok(document)
    }

    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            DocumentFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }

    /// Read and parse a document; the format is taken from the file
    /// extension.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::SampleFileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, DocumentFormat::from_path(path))
    }
}

impl Default for SampleDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Document encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Where a recording is written: a root directory joined with a relative
/// file id. Overwriting requires explicit intent.
#[derive(Debug, Clone)]
pub struct SampleTarget {
    root: PathBuf,
    id: String,
    overwrite: bool,
}

impl SampleTarget {
    pub fn file(root: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            id: id.into(),
            overwrite: false,
        }
    }

    /// Allow replacing an existing document.
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        self.root.join(&self.id)
    }
}

/// Where samples are loaded from.
#[derive(Debug, Clone)]
pub enum SampleSource {
    /// A root directory joined with a relative file id.
    File { root: PathBuf, id: String },
    /// A resource id resolved against the crate manifest directory; the
    /// configured root path is ignored, mirroring classpath lookup.
    Resource { id: String },
}

impl SampleSource {
    pub fn file(root: impl Into<PathBuf>, id: impl Into<String>) -> Self {
        SampleSource::File {
            root: root.into(),
            id: id.into(),
        }
    }

    pub fn resource(id: impl Into<String>) -> Self {
        SampleSource::Resource { id: id.into() }
    }

    pub fn resolve(&self) -> PathBuf {
        match self {
            SampleSource::File { root, id } => root.join(id),
            SampleSource::Resource { id } => manifest_dir().join(id),
        }
    }
}

fn manifest_dir() -> PathBuf {
    std::env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Deterministic document name for a test without an explicit id:
/// `greeting::records_a_sample` becomes `greeting_records_a_sample.json`.
pub fn derive_document_name(test_path: &str, format: DocumentFormat) -> String {
    let stem = test_path.replace("::", "_");
    let extension = match format {
        DocumentFormat::Json => "json",
        DocumentFormat::Yaml => "yaml",
    };
    format!("{stem}.{extension}")
}

/// One captured call, immutable once recorded.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub sample_id: String,
    pub method: MethodIdentity,
    pub args: Vec<CapturedValue>,
    pub returned: CapturedValue,
    pub sequence: usize,
}

/// Calls captured during one recording session, in capture order, until
/// they are flushed to a document.
#[derive(Debug, Default)]
pub struct RecordingSession {
    invocations: Vec<RecordedInvocation>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(
        &mut self,
        sample_id: &str,
        method: &MethodIdentity,
        args: Vec<CapturedValue>,
        returned: CapturedValue,
    ) {
        let sequence = self.invocations.len();
        self.invocations.push(RecordedInvocation {
            sample_id: sample_id.to_string(),
            method: *method,
            args,
            returned,
            sequence,
        });
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn clear(&mut self) {
        self.invocations.clear();
    }

    pub fn invocations(&self) -> &[RecordedInvocation] {
        &self.invocations
    }
}

/// Build a document from a recording session and write it.
///
/// Calls are grouped by sample id with argument order and call sequence
/// preserved. Fails with [`Error::FileAlreadyExists`] before touching the
/// file unless the target allows overwriting.
pub fn save(
    session: &RecordingSession,
    target: &SampleTarget,
    codecs: &CodecRegistry,
) -> Result<PathBuf> {
    let path = target.resolve();
    if path.exists() && !target.overwrite {
        return Err(Error::FileAlreadyExists(path));
    }

    let mut document = SampleDocument::new();
    for invocation in session.invocations() {
        let entry = document
            .samples
            .entry(invocation.sample_id.clone())
            .or_insert_with(|| SampleEntry {
                method: invocation.method.key(),
                calls: Vec::new(),
            });

        let mut args = Vec::with_capacity(invocation.args.len());
        for arg in &invocation.args {
            args.push(codecs.convert(arg)?);
        }
        let returns = codecs.convert(&invocation.returned)?;
        entry.calls.push(CallRecord { args, returns });
    }

    let text = document.render(DocumentFormat::from_path(&path))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, text)?;

    info!(
        path = %path.display(),
        samples = document.samples.len(),
        calls = session.len(),
        "recording saved"
    );
    Ok(path)
}

/// Load a document and materialize its calls as sample definitions.
///
/// Every entry must correspond to a live recording declaration (matched by
/// sample id and method key); the declaration supplies the matchers whose
/// replay side is bound to each loaded argument value. Returns the loaded
/// definitions per sample id, in recorded order.
pub fn load(
    source: &SampleSource,
    repository: &crate::registry::SampleRepository,
    codecs: &CodecRegistry,
) -> Result<Vec<(String, Vec<SampleDefinition>)>> {
    let path = source.resolve();
    let document = SampleDocument::read(&path)?;

    let mut loaded = Vec::new();
    for (sample_id, entry) in &document.samples {
        let declaration = repository.recording(sample_id).ok_or_else(|| {
            Error::MethodNotFound(format!(
                "{} (sample id {sample_id:?} has no recording declaration)",
                entry.method
            ))
        })?;
        let method = *declaration.method();
        if method.key() != entry.method {
            return Err(Error::MethodNotFound(format!(
                "{} (sample id {sample_id:?} is declared for {})",
                entry.method,
                method.key()
            )));
        }

        let mut definitions = Vec::with_capacity(entry.calls.len());
        for call in &entry.calls {
            if call.args.len() != method.arity() {
                return Err(Error::Document(format!(
                    "sample {sample_id:?} has a call with {} argument(s), method {} takes {}",
                    call.args.len(),
                    method.key(),
                    method.arity()
                )));
            }

            let mut matchers = Vec::with_capacity(call.args.len());
            for ((value, param), declared) in call
                .args
                .iter()
                .zip(method.params.iter().copied())
                .zip(declaration.matchers())
            {
                let recorded = codecs.revert_named(value, param)?;
                matchers.push(declared.bind_recorded(recorded));
            }
            let returned = codecs.revert_named(&call.returns, method.returns)?;
            definitions.push(SampleDefinition::from_parts(
                method,
                matchers,
                Behavior::Return(returned),
            ));
        }
        loaded.push((sample_id.clone(), definitions));
    }

    info!(
        path = %path.display(),
        samples = loaded.len(),
        "samples loaded"
    );
    Ok(loaded)
}
