use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Fields, ItemEnum, LitStr, parse::ParseBuffer};

fn variant_token(variant: &syn::Variant) -> String {
    let mut token = variant.ident.to_string();
    for attr in &variant.attrs {
        if !attr.meta.path().is_ident("cask") {
            continue;
        }
        let Ok(list) = attr.meta.require_list() else {
            panic!("Error while parsing `cask`, use it like: `#[cask(name = \"TOKEN\")]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("name") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!("Error while parsing `name`, use it like: `#[cask(name = \"TOKEN\")]`");
                };
                token = v.value();
            } else {
                panic!(
                    "Unknown attribute `{}` inside cask macro",
                    arg.path.to_token_stream()
                );
            }
            Ok(())
        });
    }
    token
}

pub(crate) fn derive_token(item: ItemEnum) -> TokenStream {
    let name = &item.ident;
    let variants: Vec<_> = item
        .variants
        .iter()
        .map(|v| {
            let Fields::Unit = v.fields else {
                panic!("Variant `{}::{}` must not have fields", name, v.ident);
            };
            (&v.ident, variant_token(v))
        })
        .collect();
    let encode = variants
        .iter()
        .map(|(ident, token)| quote!(#name::#ident => #token));
    let decode = variants
        .iter()
        .map(|(ident, token)| quote!(#token => Ok(#name::#ident)));
    quote! {
        impl ::cask::AsValue for #name {
            fn as_empty_value() -> ::cask::Value {
                ::cask::Value::Text(None)
            }

            fn as_value(self) -> ::cask::Value {
                ::cask::Value::Text(Some(
                    match self {
                        #(#encode,)*
                    }
                    .to_string(),
                ))
            }

            fn try_from_value(value: ::cask::Value) -> ::cask::Result<Self> {
                match value {
                    ::cask::Value::Text(Some(token)) => match token.as_str() {
                        #(#decode,)*
                        token => Err(::cask::Error::msg(format!(
                            "Unknown token `{}` for {}",
                            token,
                            stringify!(#name),
                        ))),
                    },
                    value => Err(::cask::Error::msg(format!(
                        "Cannot convert {} to {}",
                        value.kind(),
                        stringify!(#name),
                    ))),
                }
            }
        }
    }
}
