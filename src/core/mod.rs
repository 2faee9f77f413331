// ─── Packsmith Core ───
// Keeps a modpack's metadata index consistent with the files on disk and
// with the Modrinth catalog.
//
// Architecture:
//   core/
//     hash/       Hash formats + pluggable provider
//     meta/       Per-artifact metadata records (.pw.toml)
//     index/      Index of tracked files + ignore rules
//     pack/       pack.toml document
//     side/       Client/server side resolution
//     catalog/    Modrinth client + rate limit retry
//     bundle/     .mrpack archives, manifests and overrides
//     reconcile/  Bundle import with checkpoints and cancellation
//     diff/       Pack versus bundle comparison
//     validate/   Consistency checks
//     state/      Settings + shared collaborators

pub mod bundle;
pub mod catalog;
pub mod diff;
pub mod error;
pub mod hash;
pub mod http;
pub mod index;
pub mod meta;
pub mod pack;
pub mod reconcile;
pub mod side;
pub mod state;
pub mod validate;
