//! Property-based tests for composition and planning
//!
//! These tests verify:
//! - `all` keeps input order whatever order inputs settle in
//! - Planned waves never place a descriptor before its dependencies
//! - Fan-out declares exactly one descriptor per token, in order

use declarative::{Deferred, ExecutionPlan, Input, Stack, all};
use naming::{NamingContext, ResourceKind};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;

fn stack() -> Stack {
    Stack::new(NamingContext::new("acme", "eastus", "dev", "web").unwrap())
}

/// Strategy for a DAG: each node lists edges to earlier nodes only
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>()
            .prop_map(|edges| {
                edges
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| deps.into_iter().filter(|&d| d < i).collect())
                    .collect()
            })
    })
}

proptest! {
    /// Results follow input order, not settle order
    #[test]
    fn all_keeps_input_order(order in Just((0..8).collect::<Vec<usize>>()).prop_shuffle()) {
        let (cells, completers): (Vec<_>, Vec<_>) =
            (0..8).map(|_| Deferred::<usize>::pending()).unzip();
        let gathered = all(cells);

        let mut completers: Vec<_> = completers.into_iter().map(Some).collect();
        for i in order {
            if let Some(completer) = completers[i].take() {
                completer.resolve(i);
            }
        }
        prop_assert_eq!(gathered.value(), Some((0..8).collect::<Vec<_>>()));
    }

    /// Every dependency lands in a strictly earlier wave
    #[test]
    fn waves_respect_dependencies(dag in dag_strategy()) {
        let stack = stack();
        let mut declared = Vec::new();
        for deps in &dag {
            let mut builder = stack.descriptor(ResourceKind::StorageAccount);
            for (n, &dep) in deps.iter().enumerate() {
                let source: &declarative::Resource = &declared[dep];
                builder = builder.param(format!("in{n}"), source.name_output());
            }
            declared.push(builder.declare().unwrap());
        }

        let plan = ExecutionPlan::from_descriptors(&stack.resources()).unwrap();
        prop_assert_eq!(plan.total_resources(), dag.len());

        let wave_of: HashMap<_, _> = plan
            .waves()
            .iter()
            .enumerate()
            .flat_map(|(w, wave)| wave.iter().map(move |r| (r.id(), w)))
            .collect();
        for resource in &declared {
            for dep in resource.depends_on() {
                prop_assert!(wave_of[&dep] < wave_of[&resource.id()]);
            }
        }
    }

    /// One descriptor per token, in token order
    #[test]
    fn expand_declares_one_per_token(tokens in proptest::collection::vec("[0-9.]{0,6}", 1..8)) {
        let stack = stack();
        let inner = stack.clone();
        let rules = Deferred::resolved(tokens.join(",")).expand(",", move |ip| {
            inner
                .descriptor(ResourceKind::FirewallRule)
                .param("start_ip", ip)
                .declare()
        });

        let rules = rules.value().unwrap();
        prop_assert_eq!(rules.len(), tokens.len());
        prop_assert_eq!(stack.len(), tokens.len());
        for (rule, token) in rules.iter().zip(&tokens) {
            let start = rule.parameter("start_ip").unwrap().value();
            prop_assert_eq!(start, Some(Input::Value(json!(token))));
        }
    }
}
