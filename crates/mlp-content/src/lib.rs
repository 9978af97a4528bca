//! MLP Content
//!
//! Versioned, immutable content units and the catalog they are published to.
//!
//! # Core Concepts
//!
//! - [`ContentUnit`]: published material for one (process, week, version)
//! - [`UnitDraft`]: what the authoring collaborator submits
//! - [`ContentCatalog`]: append-only store, latest version wins on read
//!
//! # Example
//!
//! ```rust,ignore
//! use mlp_content::{ContentCatalog, ContentFields, ContentKind, FieldKey, InMemoryCatalog, Theme, UnitDraft};
//!
//! let catalog = InMemoryCatalog::new();
//! let draft = UnitDraft::new(process_id, 1, Theme::new("Active listening"), ContentKind::Microlearning)
//!     .with_fields(ContentFields::new().with_text(FieldKey::Insight, "Listen to understand"));
//! let unit = catalog.publish(draft)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod catalog;
mod id;
mod unit;

pub use catalog::{CatalogError, ContentCatalog, InMemoryCatalog};
pub use id::{ContentUnitId, OrgId, ProcessId, ResponseId, TeamId, UserId};
pub use unit::{
    Audience, ContentDigest, ContentFields, ContentKind, ContentUnit, FieldKey, FieldValue, Theme,
    UnitDraft,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
