//! Component model.
//!
//! # Data Flow
//! ```text
//! Bootstrap collaborator
//!     → descriptor.rs (identity, kind, dependencies, config contracts)
//!     → instance.rs (Component trait object behind a ComponentHandle)
//!     → registry (one entry per name)
//! ```
//!
//! # Design Decisions
//! - Components are tagged by `ComponentKind`, not by type hierarchy
//! - Dependencies and config are handed to `initialize` through `InitContext`
//! - Typed access goes through `ComponentHandle::downcast`

pub mod descriptor;
pub mod instance;

pub use descriptor::{ComponentDescriptor, ComponentKind, DescriptorBuilder, DescriptorError};
pub use instance::{Component, ComponentHandle, InitContext};
