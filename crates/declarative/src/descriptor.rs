//! Resource descriptors
//!
//! A descriptor is the declaration of one resource: its kind, derived name
//! and tags, its parameters (literal or deferred), and the descriptors it
//! depends on. Descriptors are immutable once declared; only their output
//! cells change, when the executor reports what the backend assigned.

use crate::deferred::{Completer, Deferred, Provisional};
use crate::error::{ConstructionError, ResolutionError};
use crate::stack::Stack;
use naming::{ResourceKind, Tags};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Identity of a descriptor within its stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DescriptorId(pub(crate) usize);

impl DescriptorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fields a backend assigned to a realized descriptor
pub type Outputs = BTreeMap<String, Value>;

/// A parameter value as handed to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Value(Value),
    /// Preview-only stand-in, see [`Provisional`]
    Placeholder(Value),
}

/// Anything usable as a descriptor parameter
pub trait IntoInput {
    fn into_input(self) -> Deferred<Input>;
}

impl IntoInput for Deferred<Input> {
    fn into_input(self) -> Deferred<Input> {
        self
    }
}

impl IntoInput for Deferred<Value> {
    fn into_input(self) -> Deferred<Input> {
        self.map(Input::Value)
    }
}

impl IntoInput for Deferred<String> {
    fn into_input(self) -> Deferred<Input> {
        self.map(|s| Input::Value(Value::String(s)))
    }
}

impl IntoInput for Deferred<Vec<String>> {
    fn into_input(self) -> Deferred<Input> {
        self.map(|items| Input::Value(Value::from(items)))
    }
}

impl<T> IntoInput for Deferred<Provisional<T>>
where
    T: Into<Value> + Clone + Send + Sync + 'static,
{
    fn into_input(self) -> Deferred<Input> {
        self.map(|value| match value {
            Provisional::Known(v) => Input::Value(v.into()),
            Provisional::Placeholder(v) => Input::Placeholder(v.into()),
        })
    }
}

impl<T> IntoInput for &Deferred<T>
where
    Deferred<T>: IntoInput,
{
    fn into_input(self) -> Deferred<Input> {
        self.clone().into_input()
    }
}

macro_rules! literal_input {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoInput for $ty {
                fn into_input(self) -> Deferred<Input> {
                    Deferred::resolved(Input::Value(Value::from(self)))
                }
            }
        )*
    };
}

literal_input!(&str, String, bool, i64, u32, u64, Value, Vec<String>);

/// A declared resource. Shared as [`Resource`].
pub struct ResourceDescriptor {
    pub(crate) id: DescriptorId,
    pub(crate) kind: ResourceKind,
    pub(crate) sequence: u32,
    pub(crate) name: String,
    pub(crate) tags: Tags,
    pub(crate) parameters: BTreeMap<String, Deferred<Input>>,
    pub(crate) explicit: BTreeSet<DescriptorId>,
    pub(crate) realized: Deferred<Outputs>,
    pub(crate) completer: Mutex<Option<Completer<Outputs>>>,
}

/// Shared handle to a declared descriptor
pub type Resource = Arc<ResourceDescriptor>;

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("depends_on", &self.depends_on())
            .finish_non_exhaustive()
    }
}

impl ResourceDescriptor {
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn parameters(&self) -> &BTreeMap<String, Deferred<Input>> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Deferred<Input>> {
        self.parameters.get(name)
    }

    /// Descriptors that must be realized before this one.
    ///
    /// Explicit edges plus every descriptor whose outputs feed a parameter.
    /// Computed from lineage, so edges added by late binding are included.
    pub fn depends_on(&self) -> BTreeSet<DescriptorId> {
        let mut deps = self.explicit.clone();
        for cell in self.parameters.values() {
            deps.extend(cell.origins());
        }
        deps
    }

    /// All backend-assigned fields, once realized
    pub fn realized(&self) -> &Deferred<Outputs> {
        &self.realized
    }

    /// One output field; resolves to `null` if the backend did not set it
    pub fn output(&self, field: &str) -> Deferred<Value> {
        let field = field.to_string();
        self.realized
            .map(move |outputs| outputs.get(&field).cloned().unwrap_or(Value::Null))
    }

    /// One output field that must be a string
    pub fn output_string(&self, field: &str) -> Deferred<String> {
        let field = field.to_string();
        self.realized.try_map(move |outputs| match outputs.get(&field) {
            Some(Value::String(s)) => Ok(s.clone()),
            other => Err(ResolutionError::Conversion {
                field,
                expected: "string",
                found: other.map_or_else(|| "nothing".to_string(), describe),
            }),
        })
    }

    /// The derived name, available to dependents once this is realized
    pub fn name_output(&self) -> Deferred<String> {
        let name = self.name.clone();
        self.realized.map(move |_| name)
    }

    /// The backend identifier (`id` output)
    pub fn id_output(&self) -> Deferred<String> {
        self.output_string("id")
    }

    /// Settle the output cells. Only the first call has an effect.
    pub(crate) fn complete(&self, outcome: Result<Outputs, ResolutionError>) -> bool {
        let completer = self
            .completer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        completer.is_some_and(|c| c.settle(outcome))
    }

    /// Snapshot every parameter for the backend.
    ///
    /// Placeholders are accepted only when `preview` is set.
    pub fn resolve(&self, preview: bool) -> Result<ResolvedDescriptor, ResolutionError> {
        let mut parameters = BTreeMap::new();
        let mut placeholders = BTreeSet::new();

        for (key, cell) in &self.parameters {
            let input = match cell.try_get() {
                Some(outcome) => outcome?,
                None => {
                    return Err(ResolutionError::Unresolved {
                        name: self.name.clone(),
                        parameter: key.clone(),
                    });
                }
            };
            match input {
                Input::Value(value) => {
                    parameters.insert(key.clone(), value);
                }
                Input::Placeholder(value) if preview => {
                    placeholders.insert(key.clone());
                    parameters.insert(key.clone(), value);
                }
                Input::Placeholder(_) => {
                    return Err(ResolutionError::PlaceholderInput {
                        name: self.name.clone(),
                        parameter: key.clone(),
                    });
                }
            }
        }

        Ok(ResolvedDescriptor {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            tags: self.tags.as_map().clone(),
            parameters,
            placeholders,
        })
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// A descriptor with every parameter resolved, as sent to a backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDescriptor {
    pub id: DescriptorId,
    pub kind: ResourceKind,
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, Value>,
    /// Parameters carrying preview placeholders
    pub placeholders: BTreeSet<String>,
}

impl ResolvedDescriptor {
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Collects parameters for one descriptor, then declares it.
///
/// Obtained from [`Stack::descriptor`]. Declaring never blocks and never
/// looks at parameter values.
#[must_use = "a descriptor is only registered by calling declare()"]
pub struct DescriptorBuilder {
    stack: Stack,
    kind: ResourceKind,
    parameters: BTreeMap<String, Deferred<Input>>,
    tags: Vec<(String, String)>,
    explicit: Vec<Resource>,
}

impl DescriptorBuilder {
    pub(crate) fn new(stack: Stack, kind: ResourceKind) -> Self {
        Self {
            stack,
            kind,
            parameters: BTreeMap::new(),
            tags: Vec::new(),
            explicit: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl IntoInput) -> Self {
        self.parameters.insert(key.into(), value.into_input());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add an explicit ordering edge
    pub fn depends_on(mut self, resource: &Resource) -> Self {
        self.explicit.push(Arc::clone(resource));
        self
    }

    pub fn declare(self) -> Result<Resource, ConstructionError> {
        let Self {
            stack,
            kind,
            parameters,
            tags,
            explicit,
        } = self;
        stack.register(kind, parameters, tags, explicit)
    }
}
