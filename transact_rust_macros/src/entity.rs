use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr};

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let collection = match collection_attr(&input.attrs)? {
        Some(collection) => collection,
        None => default_collection(&name.to_string()),
    };
    let id_field = id_field(input)?;

    Ok(quote! {
        impl transact_rust::Entity for #name {
            const COLLECTION: &'static str = #collection;

            fn id(&self) -> &str {
                &self.#id_field
            }
        }
    })
}

/// `#[entity(collection = "...")]` on the struct. Unknown keys are errors.
fn collection_attr(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut collection = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                collection = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `collection`"))
            }
        })?;
    }
    Ok(collection)
}

/// Whether a field carries `#[entity(id)]`. Unknown keys are errors.
fn is_marked_id(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut marked = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("unsupported entity field attribute, expected `id`"))
            }
        })?;
    }
    Ok(marked)
}

fn id_field(input: &DeriveInput) -> syn::Result<Ident> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Entity derive requires named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Entity can only be derived for structs",
            ))
        }
    };

    let mut marked = Vec::new();
    for field in fields {
        if is_marked_id(&field.attrs)? {
            marked.extend(field.ident.clone());
        }
    }
    match marked.len() {
        0 => {}
        1 => return Ok(marked.remove(0)),
        _ => {
            return Err(syn::Error::new_spanned(
                &marked[1],
                "only one field may be marked #[entity(id)]",
            ))
        }
    }

    fields
        .iter()
        .filter_map(|field| field.ident.clone())
        .find(|ident| ident == "id")
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "Entity derive: no field marked with #[entity(id)] and no field named `id`",
            )
        })
}

/// `OrderLine` -> `order_lines`, `HTTPRoute` -> `http_routes`.
fn default_collection(type_name: &str) -> String {
    let chars: Vec<char> = type_name.chars().collect();
    let mut out = String::with_capacity(type_name.len() + 2);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || (chars[i - 1].is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out.push('s');
    out
}
