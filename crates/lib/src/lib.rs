//! appsync-lib: keeps a local application installation in sync with a manifest
//!
//! The pieces, bottom-up:
//! - [`manifest`]: the typed application manifest and its entries
//! - [`codec`]: reading and writing manifests as XML
//! - [`reconcile`]: comparing a manifest with a destination directory
//! - [`transfer`]: executing the resulting plan, phase by phase
//! - [`install`]: a full install or update session around the above
//! - [`generate`]: rebuilding a manifest's file list from a directory

pub mod codec;
pub mod consts;
pub mod generate;
pub mod install;
pub mod manifest;
pub mod placeholder;
pub mod platform;
pub mod reconcile;
pub mod transfer;
pub mod util;
