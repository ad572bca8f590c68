//! # Naming
//!
//! Deterministic resource naming and tagging.
//!
//! A deployment supplies a [`NamingContext`] (company code, location,
//! environment, scope) once. Every resource then gets a name derived from
//! that context, its [`ResourceKind`] and a per-kind sequence number handed
//! out by a [`SequenceCounter`]:
//!
//! ```
//! use naming::{NamingContext, ResourceKind, SequenceCounter, build_kind};
//!
//! let ctx = NamingContext::new("acme", "eastus", "dev", "web")?;
//! let counter = SequenceCounter::new();
//!
//! let rg = build_kind(&ctx, ResourceKind::ResourceGroup, counter.next(ResourceKind::ResourceGroup))?;
//! assert_eq!(rg.name, "acmedeveuswebrg00");
//! assert_eq!(rg.tags.get("scope"), Some("web"));
//! # Ok::<(), naming::NamingError>(())
//! ```
//!
//! Names are pure functions of their inputs, so re-declaring the same
//! resources in a fresh deployment requests the same names again.

pub mod builder;
pub mod context;
pub mod error;
pub mod kind;
pub mod sequence;

pub use builder::{Identifier, MAX_NAME_LEN, SCOPE_TAG, Tags, build, build_kind};
pub use context::NamingContext;
pub use error::{NamingError, Result};
pub use kind::ResourceKind;
pub use sequence::SequenceCounter;
