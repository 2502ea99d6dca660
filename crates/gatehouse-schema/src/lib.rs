//! Shared data model for the gatehouse trust gateway.
//!
//! These types are the contract between the network-facing handshake code,
//! the package cache, the build updater, and the durable registry on disk.
//! They carry no I/O of their own.

pub mod hash;
pub mod manifest;
pub mod package;
pub mod registry;

// Re-exports
pub use hash::{DigestError, Sha256Digest};
pub use manifest::{Manifest, ManifestFile};
pub use package::{PackageDescriptor, PackageKind, PackageRequirement, PackageSource};
pub use registry::{entry_key, Registry, RegistryEntry, RegistryStatus};
