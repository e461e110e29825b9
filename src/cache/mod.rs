//! Package cache
//!
//! A flat directory of built binary packages, one file per (name, version).
//! Files are named `<name>_<version>_<arch>.<suffix>` from the package's
//! embedded metadata, never from the filename it was added under.
//!
//! # Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | one file per (name, version) | `add` is a no-op for cached pairs |
//! | name count > 0 iff a version of the name is cached | `register` / `unregister` |
//! | a rejected artifact leaves no trace | suffix and metadata checked before linking |

mod package_cache;

pub use package_cache::PackageCache;
