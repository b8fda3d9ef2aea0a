//! # Savegraph Derive Macros
//!
//! This crate provides the procedural macros for `savegraph`. It automates the
//! implementation of `Exportable` and `ExportClass` for plain structs with
//! named fields: every field is written under its own name and read back with
//! the value from `Default::default()` as fallback.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitInt, LitStr, parse_macro_input};

/// Derives `Exportable` and `ExportClass`.
///
/// Struct attributes:
/// - `#[savegraph(class = "...")]`: name stored in files (defaults to the
///   module path plus the type name).
/// - `#[savegraph(version = N)]`: version stamp of the class.
///
/// Field attributes:
/// - `#[savegraph(rename = "...")]`: stored field name.
/// - `#[savegraph(skip)]`: never written; left at its default on load.
/// - `#[savegraph(as_string)]`: stored by `Display` name, parsed back with `FromStr`.
#[proc_macro_derive(Exportable, attributes(savegraph))]
pub fn derive_exportable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(e) => e.to_compile_error().into(),
    }
}

struct ClassOptions {
    class: Option<LitStr>,
    version: Option<LitInt>,
}

#[derive(Default)]
struct FieldOptions {
    rename: Option<LitStr>,
    skip: bool,
    as_string: bool,
}

struct ExportedField {
    ident: syn::Ident,
    stored_name: String,
    as_string: bool,
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(ds) => ds,
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "Exportable only supports structs",
            ));
        }
    };
    let named = match &data_struct.fields {
        Fields::Named(named) => named,
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "Exportable only supports structs with named fields",
            ));
        }
    };

    let options = parse_class_attributes(&input.attrs)?;

    let mut fields = Vec::new();
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let field_options = parse_field_attributes(&field.attrs)?;
        if field_options.skip {
            continue;
        }
        let stored_name = match &field_options.rename {
            Some(rename) => rename.value(),
            None => ident.to_string().trim_start_matches("r#").to_string(),
        };
        if stored_name.is_empty() {
            return Err(syn::Error::new_spanned(ident, "Stored field name cannot be empty"));
        }
        fields.push(ExportedField {
            ident,
            stored_name,
            as_string: field_options.as_string,
        });
    }

    let class_name = match &options.class {
        Some(class) => quote! { #class },
        None => quote! { concat!(module_path!(), "::", stringify!(#name)) },
    };
    let versions = match &options.version {
        Some(version) => quote! { &[#version] },
        None => quote! { &[] },
    };

    let writes = fields.iter().map(generate_write);
    let reads = fields.iter().map(generate_read);

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics savegraph::ExportClass for #name #ty_generics #where_clause {
            const CLASS_NAME: &'static str = #class_name;
            const VERSIONS: &'static [i32] = #versions;
        }

        impl #impl_generics savegraph::Exportable for #name #ty_generics #where_clause {
            fn class_name(&self) -> &str {
                <Self as savegraph::ExportClass>::CLASS_NAME
            }

            fn class_versions(&self) -> &[i32] {
                <Self as savegraph::ExportClass>::VERSIONS
            }

            #[allow(unused_variables)]
            fn write(&self, out: &mut savegraph::WriterSession<'_>) -> savegraph::Result<()> {
                let defaults = <Self as ::core::default::Default>::default();
                #(#writes)*
                Ok(())
            }

            #[allow(unused_variables)]
            fn read(&mut self, input: &mut savegraph::ReaderContext<'_, '_>) -> savegraph::Result<()> {
                let defaults = <Self as ::core::default::Default>::default();
                #(#reads)*
                Ok(())
            }
        }
    })
}

fn generate_write(field: &ExportedField) -> proc_macro2::TokenStream {
    let ident = &field.ident;
    let stored = &field.stored_name;
    if field.as_string {
        quote! {
            if self.#ident != defaults.#ident {
                out.write_enum(#stored, &self.#ident)?;
            }
        }
    } else {
        quote! {
            savegraph::ExportField::write_field(&self.#ident, out, #stored, &defaults.#ident)?;
        }
    }
}

fn generate_read(field: &ExportedField) -> proc_macro2::TokenStream {
    let ident = &field.ident;
    let stored = &field.stored_name;
    if field.as_string {
        quote! {
            self.#ident = input.read_enum(#stored, defaults.#ident);
        }
    } else {
        quote! {
            self.#ident = savegraph::ExportField::read_field(input, #stored, defaults.#ident);
        }
    }
}

/// Parses `#[savegraph(class = "...", version = N)]` on the struct.
fn parse_class_attributes(attrs: &[Attribute]) -> syn::Result<ClassOptions> {
    let mut options = ClassOptions {
        class: None,
        version: None,
    };

    for attr in attrs {
        if attr.path().is_ident("savegraph") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("class") {
                    let value = meta.value()?;
                    let class: LitStr = value.parse()?;
                    if class.value().is_empty() {
                        return Err(meta.error("Class name cannot be empty"));
                    }
                    options.class = Some(class);
                    return Ok(());
                }

                if meta.path.is_ident("version") {
                    let value = meta.value()?;
                    let version: LitInt = value.parse()?;
                    version.base10_parse::<i32>()?;
                    options.version = Some(version);
                    return Ok(());
                }

                Err(meta.error("Unknown savegraph attribute key. Supported: class, version"))
            })?;
        }
    }
    Ok(options)
}

/// Parses `#[savegraph(rename = "...", skip, as_string)]` on a field.
fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if attr.path().is_ident("savegraph") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    return Ok(());
                }

                if meta.path.is_ident("as_string") {
                    options.as_string = true;
                    return Ok(());
                }

                if meta.path.is_ident("rename") {
                    let value = meta.value()?;
                    options.rename = Some(value.parse()?);
                    return Ok(());
                }

                Err(meta.error(
                    "Unknown savegraph attribute key. Supported: rename, skip, as_string",
                ))
            })?;
        }
    }
    Ok(options)
}
