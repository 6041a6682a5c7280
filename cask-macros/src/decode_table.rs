use crate::decode_field::{FieldMetadata, decode_field};
use convert_case::{Case, Casing};
use quote::ToTokens;
use syn::{Fields, ItemStruct, LitStr, parse::ParseBuffer};

pub(crate) struct TableMetadata {
    pub(crate) item: ItemStruct,
    pub(crate) keyspace: String,
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldMetadata>,
}

/// Reads `#[cask(keyspace = "..", name = "..")]` from a struct, the name defaults to the snake
/// case identifier of the struct.
pub(crate) fn decode_table(item: ItemStruct) -> TableMetadata {
    let Fields::Named(..) = &item.fields else {
        panic!("`{}` must have named fields", item.ident);
    };
    let fields = item.fields.iter().map(decode_field).collect();
    let mut name = item.ident.to_string().to_case(Case::Snake);
    let mut keyspace = String::new();
    if name.starts_with('_') {
        name.remove(0);
    }
    for attr in &item.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("cask") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `cask`, use it like: `#[cask(attribute = value, ..)]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("name") {
                let Ok(value) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!("Error while parsing `name`, use it like: `#[cask(name = \"orders\")]`");
                };
                name = value.value();
            } else if arg.path.is_ident("keyspace") {
                let Ok(value) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!(
                        "Error while parsing `keyspace`, use it like: `#[cask(keyspace = \"shop\")]`"
                    );
                };
                keyspace = value.value();
            } else {
                panic!(
                    "Unknown attribute `{}` inside cask macro",
                    arg.path.to_token_stream()
                );
            }
            Ok(())
        });
    }
    TableMetadata {
        item,
        keyspace,
        name,
        fields,
    }
}
