mod entity;
mod message;

use proc_macro::TokenStream;

use message::MessageKind;

/// Derive `transact_rust::Entity` for a struct.
///
/// The collection defaults to the snake_case type name plus `s`; the id
/// defaults to a field named `id`.
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Entity)]
/// #[entity(collection = "products")]
/// struct Product {
///     #[entity(id)]
///     sku: String,
///     name: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input)
}

/// Derive `transact_rust::Command`. The dispatch name defaults to the type
/// name and can be overridden with `#[message(name = "product.create")]`.
#[proc_macro_derive(Command, attributes(message))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    message::derive_message(input, MessageKind::Command)
}

/// Derive `transact_rust::Event`. Naming works as for `Command`.
#[proc_macro_derive(Event, attributes(message))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    message::derive_message(input, MessageKind::Event)
}
