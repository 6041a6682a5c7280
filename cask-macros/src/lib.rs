mod decode_field;
mod decode_table;
mod token;
mod udt;

use decode_field::KeyRole;
use decode_table::decode_table;
use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemEnum, ItemStruct, parse_macro_input};

/// Maps a struct to a table.
///
/// ```rust,ignore
/// #[derive(Entity, Clone)]
/// #[cask(keyspace = "shop", name = "orders")]
/// struct Order {
///     #[cask(partition_key)]
///     id: Uuid,
///     #[cask(clustering_key)]
///     day: Date,
///     #[cask(name = "total_price")]
///     price: Decimal,
///     tags: BTreeSet<String>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(cask))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let table = decode_table(parse_macro_input!(input as ItemStruct));
    let name = &table.item.ident;
    let keyspace = &table.keyspace;
    let table_name = &table.name;
    let mapped: Vec<_> = table.fields.iter().filter(|v| !v.skip).collect();
    if !mapped.iter().any(|v| v.key == KeyRole::Partition) {
        panic!("Entity `{}` must declare at least one `#[cask(partition_key)]` field", name);
    }
    let field_defs = mapped.iter().map(|f| {
        let column = &f.name;
        let ty = &f.ty;
        let key = match f.key {
            KeyRole::None => quote!(::cask::KeyKind::None),
            KeyRole::Partition => quote!(::cask::KeyKind::Partition),
            KeyRole::Clustering => quote!(::cask::KeyKind::Clustering),
        };
        quote! {
            ::cask::FieldDef::new(#column, <#ty as ::cask::AsValue>::as_empty_value(), #key)
        }
    });
    let row = mapped.iter().map(|f| {
        let column = &f.name;
        let ident = &f.ident;
        quote!((#column, ::cask::AsValue::as_value(self.#ident.clone())))
    });
    let from_record = table.fields.iter().map(|f| {
        let ident = &f.ident;
        let ty = &f.ty;
        let column = &f.name;
        if f.skip {
            quote!(#ident: Default::default())
        } else {
            quote!(#ident: record.field::<#ty>(#column)?)
        }
    });
    quote! {
        impl ::cask::Entity for #name {
            fn table_ref() -> &'static ::cask::TableRef {
                static TABLE_REF: ::cask::TableRef = ::cask::TableRef::new(#keyspace, #table_name);
                &TABLE_REF
            }

            fn fields() -> &'static [::cask::FieldDef] {
                static RESULT: ::std::sync::LazyLock<Box<[::cask::FieldDef]>> =
                    ::std::sync::LazyLock::new(|| vec![#(#field_defs),*].into_boxed_slice());
                &RESULT
            }

            fn row(&self) -> Vec<(&'static str, ::cask::Value)> {
                vec![#(#row),*]
            }

            fn from_record(record: ::cask::Record) -> ::cask::Result<Self> {
                Ok(Self {
                    #(#from_record),*
                })
            }
        }
    }
    .into()
}

/// Maps a struct to a user defined type, the struct then converts to and from
/// [`Value::Udt`](../cask/enum.Value.html).
#[proc_macro_derive(Udt, attributes(cask))]
pub fn derive_udt(input: TokenStream) -> TokenStream {
    udt::derive_udt(decode_table(parse_macro_input!(input as ItemStruct))).into()
}

/// Maps a fieldless enum to its textual token, `#[cask(name = "..")]` on a variant overrides
/// the identifier.
#[proc_macro_derive(Token, attributes(cask))]
pub fn derive_token(input: TokenStream) -> TokenStream {
    token::derive_token(parse_macro_input!(input as ItemEnum)).into()
}
