//! Request-scoped service container.
//!
//! A [`ServiceProvider`] is built once at startup and passed explicitly to
//! whoever needs to open scopes. Each request gets its own [`ServiceScope`]:
//! services resolved from it are created at most once per scope and are
//! released when the scope is dropped, whichever way the request ended.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Factory stored per registered service type.
type Factory<T> = Arc<dyn Fn(&ServiceScope) -> Arc<T> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("no service registered for {0}")]
    NotRegistered(&'static str),
}

struct Registration {
    type_name: &'static str,
    /// Always a `Factory<T>` for the `T` this registration is keyed by.
    factory: Box<dyn Any + Send + Sync>,
}

/// Root container holding service registrations.
#[derive(Default)]
pub struct ServiceProvider {
    registrations: HashMap<TypeId, Registration>,
}

impl ServiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service created fresh for every scope that resolves it.
    ///
    /// `T` is usually a trait object, e.g. `dyn AuthenticationService`.
    pub fn register_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceScope) -> Arc<T> + Send + Sync + 'static,
    {
        let factory: Factory<T> = Arc::new(factory);
        self.registrations.insert(
            TypeId::of::<T>(),
            Registration {
                type_name: type_name::<T>(),
                factory: Box::new(factory),
            },
        );
        self
    }

    /// Register one shared instance handed out to every scope.
    pub fn register_singleton<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_scoped::<T, _>(move |_| Arc::clone(&instance))
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Registered type names, for startup diagnostics.
    pub fn registered(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.registrations.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        names
    }

    /// Open a new scope. The scope keeps the provider alive.
    pub fn create_scope(self: &Arc<Self>) -> ServiceScope {
        let scope = ServiceScope {
            id: Uuid::new_v4(),
            provider: Arc::clone(self),
            instances: Mutex::new(HashMap::new()),
        };
        debug!(scope = %scope.id, "service scope opened");
        scope
    }
}

/// Per-request set of resolved services.
pub struct ServiceScope {
    id: Uuid,
    provider: Arc<ServiceProvider>,
    /// Each value is the `Arc<T>` for the `T` it is keyed by.
    instances: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ServiceScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resolve `T`, creating it on first use within this scope.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ScopeError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();

        if let Some(existing) = self
            .instances
            .lock()
            .get(&key)
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
        {
            return Ok(existing);
        }

        let factory = self
            .provider
            .registrations
            .get(&key)
            .and_then(|r| r.factory.downcast_ref::<Factory<T>>())
            .ok_or(ScopeError::NotRegistered(type_name::<T>()))?;

        // The lock is not held here so factories may resolve their own dependencies.
        let created = (factory.as_ref())(self);

        let mut instances = self.instances.lock();
        let stored = instances
            .entry(key)
            .or_insert_with(|| Box::new(Arc::clone(&created)));
        Ok(stored.downcast_ref::<Arc<T>>().cloned().unwrap_or(created))
    }

    /// Number of services this scope has created so far.
    pub fn resolved_count(&self) -> usize {
        self.instances.lock().len()
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        let instances = self.instances.get_mut();
        let released = instances.len();
        instances.clear();
        debug!(scope = %self.id, released, "service scope released");
    }
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope")
            .field("id", &self.id)
            .field("resolved", &self.resolved_count())
            .finish()
    }
}
