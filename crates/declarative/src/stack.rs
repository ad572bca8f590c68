//! The deployment registry

use crate::deferred::{Deferred, Provisional};
use crate::descriptor::{DescriptorBuilder, DescriptorId, Input, Resource, ResourceDescriptor};
use crate::error::{ConstructionError, ResolutionError};
use naming::{NamingContext, ResourceKind, SequenceCounter, build_kind};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One deployment: naming context, sequence counter, declared descriptors
/// and named outputs.
///
/// Cloning shares the same deployment. Declaring is safe from any thread,
/// including continuations that fan out while the graph resolves.
#[derive(Clone)]
pub struct Stack {
    inner: Arc<StackInner>,
}

struct StackInner {
    naming: NamingContext,
    sequence: SequenceCounter,
    resources: Mutex<Vec<Resource>>,
    exports: Mutex<Vec<(String, Deferred<Input>)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Stack {
    pub fn new(naming: NamingContext) -> Self {
        Self {
            inner: Arc::new(StackInner {
                naming,
                sequence: SequenceCounter::new(),
                resources: Mutex::new(Vec::new()),
                exports: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn naming(&self) -> &NamingContext {
        &self.inner.naming
    }

    pub fn sequence(&self) -> &SequenceCounter {
        &self.inner.sequence
    }

    /// Start declaring a descriptor of `kind`
    pub fn descriptor(&self, kind: ResourceKind) -> DescriptorBuilder {
        DescriptorBuilder::new(self.clone(), kind)
    }

    pub(crate) fn register(
        &self,
        kind: ResourceKind,
        parameters: BTreeMap<String, Deferred<Input>>,
        tags: Vec<(String, String)>,
        explicit: Vec<Resource>,
    ) -> Result<Resource, ConstructionError> {
        // Held for the whole registration so sequence numbers and ids
        // follow declaration order.
        let mut resources = lock(&self.inner.resources);

        let sequence = self.inner.sequence.peek(kind);
        let mut identifier = build_kind(&self.inner.naming, kind, sequence)?;
        identifier.tags.merge(tags)?;

        if resources.iter().any(|r| r.name == identifier.name) {
            return Err(ConstructionError::NameCollision {
                name: identifier.name,
            });
        }

        let mut depends = BTreeSet::new();
        for dep in &explicit {
            let known = resources
                .get(dep.id.0)
                .is_some_and(|r| Arc::ptr_eq(r, dep));
            if !known {
                return Err(ConstructionError::ForeignDependency {
                    name: identifier.name,
                });
            }
            depends.insert(dep.id);
        }

        let taken = self.inner.sequence.next(kind);
        debug_assert_eq!(taken, sequence);

        let id = DescriptorId(resources.len());
        let (realized, completer) = Deferred::output_of(id);
        let resource = Arc::new(ResourceDescriptor {
            id,
            kind,
            sequence,
            name: identifier.name,
            tags: identifier.tags,
            parameters,
            explicit: depends,
            realized,
            completer: Mutex::new(Some(completer)),
        });

        log::debug!(
            "declared {} {} '{}' depending on {:?}",
            resource.kind,
            resource.id,
            resource.name,
            resource.depends_on()
        );
        resources.push(Arc::clone(&resource));
        Ok(resource)
    }

    /// Every descriptor declared so far, in declaration order
    pub fn resources(&self) -> Vec<Resource> {
        lock(&self.inner.resources).clone()
    }

    pub fn get(&self, id: DescriptorId) -> Option<Resource> {
        lock(&self.inner.resources).get(id.0).cloned()
    }

    pub fn find(&self, name: &str) -> Option<Resource> {
        lock(&self.inner.resources)
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.resources).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish a value as a named deployment output
    pub fn export<T>(&self, name: impl Into<String>, cell: &Deferred<T>)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let value = cell.try_map(|v| to_json(&v).map(Input::Value));
        lock(&self.inner.exports).push((name.into(), value));
    }

    /// Publish a provisional value; a placeholder stays marked as one
    pub fn export_provisional<T>(&self, name: impl Into<String>, cell: &Deferred<Provisional<T>>)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let value = cell.try_map(|v| {
            let value = to_json(v.preview_value())?;
            Ok(if v.is_placeholder() {
                Input::Placeholder(value)
            } else {
                Input::Value(value)
            })
        });
        lock(&self.inner.exports).push((name.into(), value));
    }

    /// Named outputs in export order
    pub fn exports(&self) -> Vec<(String, Deferred<Input>)> {
        lock(&self.inner.exports).clone()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ResolutionError> {
    serde_json::to_value(value).map_err(|e| ResolutionError::Serialization(e.to_string()))
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("naming", &self.inner.naming)
            .field("resources", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::CellState;
    use serde_json::json;

    fn context() -> NamingContext {
        NamingContext::new("acme", "eastus", "dev", "web").unwrap()
    }

    #[test]
    fn test_sequences_per_kind() {
        let stack = Stack::new(context());
        let names: Vec<String> = [
            ResourceKind::ResourceGroup,
            ResourceKind::FirewallRule,
            ResourceKind::FirewallRule,
            ResourceKind::ResourceGroup,
        ]
        .into_iter()
        .map(|kind| stack.descriptor(kind).declare().unwrap().name().to_string())
        .collect();

        assert_eq!(
            names,
            [
                "acmedeveuswebrg00",
                "acmedeveuswebfw00",
                "acmedeveuswebfw01",
                "acmedeveuswebrg01"
            ]
        );
        assert_eq!(stack.sequence().peek(ResourceKind::FirewallRule), 2);
    }

    #[test]
    fn test_redeclaring_in_fresh_stack_repeats_names() {
        let declare = || {
            let stack = Stack::new(context());
            let rg = stack
                .descriptor(ResourceKind::ResourceGroup)
                .declare()
                .unwrap();
            let sa = stack
                .descriptor(ResourceKind::StorageAccount)
                .param("resource_group", rg.name_output())
                .declare()
                .unwrap();
            (rg.name().to_string(), sa.name().to_string())
        };
        assert_eq!(declare(), declare());
    }

    #[test]
    fn test_foreign_dependency_rejected() {
        let other = Stack::new(context());
        let foreign = other
            .descriptor(ResourceKind::ResourceGroup)
            .declare()
            .unwrap();

        let stack = Stack::new(context());
        let err = stack
            .descriptor(ResourceKind::StorageAccount)
            .depends_on(&foreign)
            .declare()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::ForeignDependency { .. }));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_lookup() {
        let stack = Stack::new(context());
        let rg = stack
            .descriptor(ResourceKind::ResourceGroup)
            .declare()
            .unwrap();
        assert!(Arc::ptr_eq(&stack.get(rg.id()).unwrap(), &rg));
        assert!(Arc::ptr_eq(&stack.find("acmedeveuswebrg00").unwrap(), &rg));
        assert!(stack.find("missing").is_none());
    }

    #[test]
    fn test_exports() {
        let stack = Stack::new(context());
        stack.export("region", &Deferred::resolved("eastus".to_string()));
        stack.export_provisional(
            "principal",
            &Deferred::resolved(Value::Null).fallback(json!("1111")),
        );

        let exports = stack.exports();
        assert_eq!(exports[0].0, "region");
        assert_eq!(
            exports[0].1.state(),
            CellState::Resolved(Input::Value(json!("eastus")))
        );
        assert_eq!(
            exports[1].1.value(),
            Some(Input::Placeholder(json!("1111")))
        );
    }
}
