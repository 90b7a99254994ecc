//! Process-wide shared state
//!
//! A registry of singletons keyed by type. The first lookup of a type
//! constructs its instance; every later lookup yields the very same `Arc`.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicUsize;
//!
//! #[derive(Default)]
//! struct Counters {
//!     hits: AtomicUsize,
//! }
//!
//! let a = nwa_common::shared::<Counters>();
//! let b = nwa_common::shared::<Counters>();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

use std::any::{Any, TypeId};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

type Instance = Arc<dyn Any + Send + Sync>;

static INSTANCES: LazyLock<DashMap<TypeId, Instance>> = LazyLock::new(DashMap::new);

/// Get the shared instance of `T`, constructing it with `Default` on first use.
pub fn shared<T>() -> Arc<T>
where
    T: Default + Send + Sync + 'static,
{
    shared_with(T::default)
}

/// Get the shared instance of `T`, constructing it with `init` on first use.
///
/// `init` is ignored when an instance already exists. Racing first lookups
/// may each run `init`, but only one instance is ever handed out.
pub fn shared_with<T, F>(init: F) -> Arc<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T,
{
    let id = TypeId::of::<T>();
    let existing = INSTANCES.get(&id).map(|entry| entry.value().clone());
    let instance = match existing {
        Some(instance) => instance,
        None => {
            // Construct outside of the shard lock so `init` may itself use shared state
            let created: Instance = Arc::new(init());
            INSTANCES.entry(id).or_insert(created).value().clone()
        }
    };

    // The map is keyed by TypeId so the downcast cannot fail
    match instance.downcast::<T>() {
        Ok(typed) => typed,
        Err(_) => unreachable!("shared state registered under a foreign TypeId"),
    }
}
