//! Property-based tests for the identifier builder
//!
//! These tests verify:
//! - Building is a pure function of its inputs
//! - Distinct sequences give distinct names
//! - Names respect the length and character-set limits

use naming::{MAX_NAME_LEN, NamingContext, ResourceKind, build, build_kind};
use proptest::prelude::*;

/// Strategy for any supported kind
fn kind_strategy() -> impl Strategy<Value = ResourceKind> {
    proptest::sample::select(ResourceKind::ALL.to_vec())
}

/// Strategy for valid naming contexts, including long and messy components
fn context_strategy() -> impl Strategy<Value = NamingContext> {
    (
        "[A-Za-z][A-Za-z0-9 _-]{0,30}",
        prop_oneof![
            Just("eastus".to_string()),
            Just("westeurope".to_string()),
            "[a-z][a-z0-9]{0,15}",
        ],
        prop_oneof![
            Just("dev".to_string()),
            Just("production".to_string()),
            "[a-z][a-z0-9]{0,10}",
        ],
        "[a-z][a-z0-9-]{0,30}",
    )
        .prop_map(|(co, loc, env, scope)| {
            NamingContext::new(co, loc, env, scope).expect("strategy yields valid contexts")
        })
}

proptest! {
    /// Same inputs, same identifier
    #[test]
    fn build_is_pure(ctx in context_strategy(), kind in kind_strategy(), seq in 0u32..10_000) {
        let first = build_kind(&ctx, kind, seq).unwrap();
        let second = build_kind(&ctx, kind, seq).unwrap();
        prop_assert_eq!(first, second);
    }

    /// String tags and typed kinds agree
    #[test]
    fn build_by_tag_matches_kind(ctx in context_strategy(), kind in kind_strategy(), seq in 0u32..1_000) {
        prop_assert_eq!(build(&ctx, kind.tag(), seq).unwrap(), build_kind(&ctx, kind, seq).unwrap());
    }

    /// Different sequences never collide
    #[test]
    fn distinct_sequences_distinct_names(
        ctx in context_strategy(),
        kind in kind_strategy(),
        s1 in 0u32..u32::MAX,
        s2 in 0u32..u32::MAX,
    ) {
        prop_assume!(s1 != s2);
        let a = build_kind(&ctx, kind, s1).unwrap();
        let b = build_kind(&ctx, kind, s2).unwrap();
        prop_assert_ne!(a.name, b.name);
    }

    /// Names are short, lowercase alphanumeric and carry the scope tag
    #[test]
    fn names_are_well_formed(ctx in context_strategy(), kind in kind_strategy(), seq in 0u32..u32::MAX) {
        let id = build_kind(&ctx, kind, seq).unwrap();
        prop_assert!(!id.name.is_empty());
        prop_assert!(id.name.len() <= MAX_NAME_LEN, "{} is too long", id.name);
        prop_assert!(id.name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        prop_assert_eq!(id.tags.get("scope"), Some(ctx.scope()));
    }
}
