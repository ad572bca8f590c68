//! Fan-out: one deferred list, many descriptors
//!
//! A backend often reports a list as a single delimited string (outbound
//! addresses, for example). Expanding it declares one descriptor per element
//! once the string resolves.

use crate::deferred::Deferred;
use crate::descriptor::Resource;
use crate::error::{ConstructionError, ResolutionError};

/// Split `list` on `delimiter`, keeping empty tokens.
///
/// `""` is one empty token and `"a,"` ends with one. An empty delimiter
/// leaves the string whole.
pub fn split_tokens(list: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return vec![list.to_string()];
    }
    list.split(delimiter).map(str::to_string).collect()
}

impl Deferred<String> {
    /// Declare one descriptor per token once the list resolves.
    ///
    /// Tokens are passed to `f` in order and the result keeps that order.
    /// Empty tokens are passed through; use [`Deferred::expand_non_empty`]
    /// to drop them. A construction error from `f` fails the result, and a
    /// failed list fails it without calling `f`.
    pub fn expand<F>(&self, delimiter: &str, f: F) -> Deferred<Vec<Resource>>
    where
        F: Fn(&str) -> Result<Resource, ConstructionError> + Send + 'static,
    {
        let delimiter = delimiter.to_string();
        self.try_map(move |list| declare_each(split_tokens(&list, &delimiter), &f))
    }

    /// Like [`Deferred::expand`], skipping empty tokens
    pub fn expand_non_empty<F>(&self, delimiter: &str, f: F) -> Deferred<Vec<Resource>>
    where
        F: Fn(&str) -> Result<Resource, ConstructionError> + Send + 'static,
    {
        let delimiter = delimiter.to_string();
        self.try_map(move |list| {
            let tokens = split_tokens(&list, &delimiter)
                .into_iter()
                .filter(|t| !t.trim().is_empty())
                .collect();
            declare_each(tokens, &f)
        })
    }
}

fn declare_each<F>(tokens: Vec<String>, f: &F) -> Result<Vec<Resource>, ResolutionError>
where
    F: Fn(&str) -> Result<Resource, ConstructionError>,
{
    log::debug!("fanning out over {} token(s)", tokens.len());
    tokens
        .iter()
        .map(|token| f(token).map_err(ResolutionError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;
    use naming::{NamingContext, ResourceKind};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stack() -> Stack {
        Stack::new(NamingContext::new("acme", "eastus", "dev", "web").unwrap())
    }

    fn firewall(stack: &Stack) -> impl Fn(&str) -> Result<Resource, ConstructionError> + Send + 'static {
        let stack = stack.clone();
        move |ip| {
            stack
                .descriptor(ResourceKind::FirewallRule)
                .param("start_ip", ip)
                .param("end_ip", ip)
                .declare()
        }
    }

    #[test]
    fn test_split_tokens() {
        assert_eq!(split_tokens("a,b,c", ","), ["a", "b", "c"]);
        assert_eq!(split_tokens("", ","), [""]);
        assert_eq!(split_tokens("a,,b,", ","), ["a", "", "b", ""]);
        assert_eq!(split_tokens("a, b", ", "), ["a", "b"]);
        assert_eq!(split_tokens("abc", ""), ["abc"]);
    }

    #[test]
    fn test_expand_in_order_with_distinct_names() {
        let stack = stack();
        let rules = Deferred::resolved("a,b,c".to_string()).expand(",", firewall(&stack));

        let rules = rules.value().unwrap();
        let starts: Vec<_> = rules
            .iter()
            .map(|r| r.parameter("start_ip").unwrap().value().unwrap())
            .collect();
        assert_eq!(
            starts,
            ["a", "b", "c"].map(|s| crate::descriptor::Input::Value(json!(s)))
        );

        let names: Vec<_> = rules.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(
            names,
            ["acmedeveuswebfw00", "acmedeveuswebfw01", "acmedeveuswebfw02"]
        );
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn test_expand_empty_string_yields_one_descriptor() {
        let stack = stack();
        let rules = Deferred::resolved(String::new()).expand(",", firewall(&stack));
        let rules = rules.value().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].parameter("start_ip").unwrap().value(),
            Some(crate::descriptor::Input::Value(json!("")))
        );
    }

    #[test]
    fn test_expand_non_empty_drops_blanks() {
        let stack = stack();
        let rules = Deferred::resolved("10.0.0.1,,10.0.0.2,".to_string())
            .expand_non_empty(",", firewall(&stack));
        assert_eq!(rules.value().unwrap().len(), 2);
    }

    #[test]
    fn test_expand_waits_for_list() {
        let stack = stack();
        let (ips, completer) = Deferred::<String>::pending();
        let rules = ips.expand(",", firewall(&stack));
        assert!(stack.is_empty());
        assert!(rules.is_pending());

        completer.resolve("10.0.0.1,10.0.0.2".into());
        assert_eq!(stack.len(), 2);
        assert_eq!(rules.value().unwrap().len(), 2);
    }

    #[test]
    fn test_expand_failed_list_declares_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stack = stack();
        let make = firewall(&stack);
        let error = ResolutionError::Cancelled { name: "app".into() };

        let rules = Deferred::<String>::failed(error.clone()).expand(",", move |ip| {
            counter.fetch_add(1, Ordering::SeqCst);
            make(ip)
        });
        assert_eq!(rules.error(), Some(error));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_expand_construction_error_fails_result() {
        let stack = stack();
        let inner = stack.clone();
        let rules = Deferred::resolved("x".to_string()).expand(",", move |_| {
            inner
                .descriptor(ResourceKind::FirewallRule)
                .tag("scope", "elsewhere")
                .declare()
        });
        assert!(matches!(
            rules.error(),
            Some(ResolutionError::Construction(ConstructionError::Naming(_)))
        ));
    }
}
