use quote::ToTokens;
use syn::{Field, Ident, LitStr, Type, parse::ParseBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyRole {
    None,
    Partition,
    Clustering,
}

pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    /// Column or user defined type field name.
    pub(crate) name: String,
    pub(crate) key: KeyRole,
    /// Not mapped, initialized with `Default::default()` when decoding.
    pub(crate) skip: bool,
}

fn flag(arg: &syn::meta::ParseNestedMeta, usage: &str) {
    // value() is Err for Meta::Path
    if arg.value().is_ok() {
        panic!("Error while parsing `{usage}`, use it like: `#[cask({usage})]`");
    }
}

pub(crate) fn decode_field(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Field is expected to have a name");
    let mut name = ident.to_string();
    if name.starts_with("r#") {
        name.drain(..2);
    }
    let mut metadata = FieldMetadata {
        ident,
        ty: field.ty.clone(),
        name,
        key: KeyRole::None,
        skip: false,
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("cask") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `cask`, use it like: `#[cask(attribute = value, ...)]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("name") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!(
                        "Error while parsing `name`, use it like: `#[cask(name = \"my_column\")]`"
                    );
                };
                metadata.name = v.value();
            } else if arg.path.is_ident("partition_key") {
                flag(&arg, "partition_key");
                metadata.key = KeyRole::Partition;
            } else if arg.path.is_ident("clustering_key") {
                flag(&arg, "clustering_key");
                metadata.key = KeyRole::Clustering;
            } else if arg.path.is_ident("skip") {
                flag(&arg, "skip");
                metadata.skip = true;
            } else {
                panic!(
                    "Unknown attribute `{}` inside cask macro",
                    arg.path.to_token_stream()
                );
            }
            Ok(())
        });
    }
    if metadata.skip && metadata.key != KeyRole::None {
        panic!("Field `{}` cannot be both skipped and part of the key", metadata.ident);
    }
    metadata
}
