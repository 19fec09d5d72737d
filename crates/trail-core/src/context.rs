//! Capability traits for the collaborators the engine consults.
//!
//! Each trait has a single method and is injected into the engine at
//! construction. Closures with the matching signature implement the provider
//! traits, so tests and simple deployments need no wrapper types.

use uuid::Uuid;

/// An entity whose mutations are recorded in the trail.
///
/// Implemented by the domain types the interception layer forwards. This is
/// the identity-extraction contract: `find_id` returns `None` while the store
/// has not yet assigned a key.
pub trait Auditable {
    /// Logical type name, stable across releases (e.g. `"invoice"`).
    fn entity_type(&self) -> &str;

    /// Primary key rendered as a string.
    fn find_id(&self) -> Option<String>;

    /// Tenant stored on the entity itself. Takes precedence over the ambient
    /// tenant provider.
    fn tenant(&self) -> Option<String> {
        None
    }

    /// State captured into the trail entry.
    fn snapshot(&self) -> serde_json::Value;
}

/// Resolves the user performing the current mutation.
pub trait ActorProvider: Send + Sync {
    fn current_actor(&self) -> String;
}

/// Resolves the device the current request originates from.
pub trait DeviceProvider: Send + Sync {
    fn current_device(&self) -> Option<String>;
}

/// Resolves the ambient tenant.
pub trait TenantProvider: Send + Sync {
    fn current_tenant(&self) -> Option<String>;
}

/// Resolves the logical transaction correlation id.
pub trait CorrelationProvider: Send + Sync {
    fn current_transaction_id(&self) -> Option<Uuid>;
}

impl<F> ActorProvider for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current_actor(&self) -> String {
        self()
    }
}

impl<F> DeviceProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_device(&self) -> Option<String> {
        self()
    }
}

impl<F> TenantProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_tenant(&self) -> Option<String> {
        self()
    }
}

impl<F> CorrelationProvider for F
where
    F: Fn() -> Option<Uuid> + Send + Sync,
{
    fn current_transaction_id(&self) -> Option<Uuid> {
        self()
    }
}
