//! Component registry.
//!
//! # Data Flow
//! ```text
//! Registration (descriptor + instance)
//!     → validate (name, edges, kinds, cycles)
//!     → RegistryEntry { descriptor, handle, state }
//!
//! Queries → ComponentInfo snapshots (dependents derived on read)
//! ```

pub mod container;
pub mod entry;

pub use container::Registry;
pub use entry::{ComponentInfo, Registration, RegistrationInfo, RegistryEntry};
