use crate::decode_table::TableMetadata;
use proc_macro2::TokenStream;
use quote::quote;

pub(crate) fn derive_udt(table: TableMetadata) -> TokenStream {
    let name = &table.item.ident;
    let type_name = &table.name;
    let mapped: Vec<_> = table.fields.iter().filter(|v| !v.skip).collect();
    let field_defs = mapped.iter().map(|f| {
        let field = &f.name;
        let ty = &f.ty;
        quote! {
            ::cask::FieldDef::new(
                #field,
                <#ty as ::cask::AsValue>::as_empty_value(),
                ::cask::KeyKind::None,
            )
        }
    });
    let into_fields = mapped.iter().map(|f| {
        let field = &f.name;
        let ident = &f.ident;
        quote!((#field.to_string(), ::cask::AsValue::as_value(self.#ident)))
    });
    let from_fields = table.fields.iter().map(|f| {
        let ident = &f.ident;
        let ty = &f.ty;
        let field = &f.name;
        if f.skip {
            quote!(#ident: Default::default())
        } else {
            quote! {
                #ident: <#ty as ::cask::AsValue>::try_from_value(
                    fields
                        .iter()
                        .position(|(k, _)| k == #field)
                        .map(|i| fields.swap_remove(i).1)
                        .unwrap_or_default(),
                )
                .map_err(|e| e.context(format!("While decoding the field `{}`", #field)))?
            }
        }
    });
    quote! {
        impl ::cask::Composite for #name {
            fn type_name() -> &'static str {
                #type_name
            }

            fn fields() -> &'static [::cask::FieldDef] {
                static RESULT: ::std::sync::LazyLock<Box<[::cask::FieldDef]>> =
                    ::std::sync::LazyLock::new(|| vec![#(#field_defs),*].into_boxed_slice());
                &RESULT
            }

            fn into_fields(self) -> Vec<(String, ::cask::Value)> {
                vec![#(#into_fields),*]
            }

            #[allow(unused_mut)]
            fn from_fields(mut fields: Vec<(String, ::cask::Value)>) -> ::cask::Result<Self> {
                Ok(Self {
                    #(#from_fields),*
                })
            }
        }

        impl ::cask::AsValue for #name {
            fn as_empty_value() -> ::cask::Value {
                ::cask::Value::Udt(None, ::std::borrow::Cow::Borrowed(#type_name))
            }

            fn as_value(self) -> ::cask::Value {
                ::cask::Value::Udt(
                    Some(::cask::Composite::into_fields(self)),
                    ::std::borrow::Cow::Borrowed(#type_name),
                )
            }

            fn try_from_value(value: ::cask::Value) -> ::cask::Result<Self> {
                match value {
                    ::cask::Value::Udt(Some(fields), ..) => {
                        <Self as ::cask::Composite>::from_fields(fields)
                    }
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
