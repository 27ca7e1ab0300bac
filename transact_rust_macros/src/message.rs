use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr};

/// Which bus trait a derive targets.
pub enum MessageKind {
    Command,
    Event,
}

pub fn derive_message(input: TokenStream, kind: MessageKind) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let message_name = match extract_name(&input) {
        Ok(Some(name)) => name,
        Ok(None) => name.to_string(),
        Err(err) => return err.to_compile_error().into(),
    };

    let trait_path: proc_macro2::TokenStream = match kind {
        MessageKind::Command => quote!(transact_rust::Command),
        MessageKind::Event => quote!(transact_rust::Event),
    };

    let expanded = quote! {
        impl #impl_generics #trait_path for #name #ty_generics #where_clause {
            const NAME: &'static str = #message_name;
        }
    };

    TokenStream::from(expanded)
}

/// Reads `#[message(name = "...")]`.
fn extract_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported message attribute, expected `name`"))
            }
        })?;
    }
    Ok(name)
}
