//! Policyflow Pointer
//!
//! Addressing primitives shared by every automation component:
//!
//! - [`Data`] wraps a single resolved value together with its runtime type,
//!   and [`DataWrapper`] is the "unwrap if wrapped" capability checked
//!   during path resolution.
//! - [`Navigable`] is the capability of being walked by a pointer. It is
//!   implemented for JSON trees, maps, vectors and the automation data
//!   structures themselves, so one pointer can traverse all of them.
//! - [`Pointer`] parses absolute (`/a/b/0`) and relative (`1/d`, `0#`)
//!   pointers and evaluates them into a [`Resolution`].
//!
//! Evaluation distinguishes two kinds of failure. A missing property or an
//! out of range index is an expected outcome and comes back as
//! [`Resolution::Missing`]. A pointer that walks into the wrong shape (a
//! primitive where an object was expected, a property name on an array)
//! is a configuration defect and comes back as a [`PointerError`].

mod data;
mod error;
mod navigable;
mod pointer;

pub use data::{Data, DataWrapper};
pub use error::{PathContext, PathFailure, PathFailureKind, PointerError};
pub use navigable::{Child, Navigable, NodeKind, ScopedRoot};
pub use pointer::{Pointer, Resolution};
