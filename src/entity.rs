//! Entity - the persisted, identifiable state a unit of work checks out.

use serde::{de::DeserializeOwned, Serialize};

/// A persisted domain object with a stable identifier.
///
/// Entities are stored as JSON documents keyed by `COLLECTION:id`. Use
/// `#[derive(Entity)]` or implement by hand:
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Product { id: String, name: String }
///
/// impl Entity for Product {
///     const COLLECTION: &'static str = "products";
///     fn id(&self) -> &str { &self.id }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection name for this entity type (table, collection, key prefix).
    const COLLECTION: &'static str;

    /// Returns the unique identifier for this entity instance.
    fn id(&self) -> &str;
}
