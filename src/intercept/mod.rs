//! Request interception layer
//!
//! Transports keep an explicit, ordered chain of [`RequestHandler`]s. While
//! an [`InterceptionHook`] is installed in the transport's [`HookRegistry`],
//! it is placed first in that chain for every submission, so each request
//! passes through it exactly once without call sites changing.
//!
//! ```text
//! caller ──submit──▶ Transport
//!                      │  effective chain = installed hooks ++ own handlers
//!                      ├─ InterceptionHook ──publish──▶ Dispatcher ──▶ observers
//!                      ├─ handler 2
//!                      └─ default route
//! ```

pub mod hook;
pub mod registry;
pub mod transport;

pub use hook::{InterceptionHook, SEEN_MARKER};
pub use registry::{HookInstaller, HookRegistry};
pub use transport::{RequestHandler, Submission, Transport};
