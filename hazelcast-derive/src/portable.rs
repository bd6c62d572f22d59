//! Derive macro implementation for `HazelcastPortable`.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Lit, PathArguments, Type,
};

pub fn derive_portable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

/// How one field maps onto the portable writer and reader.
enum FieldKind {
    Primitive(&'static str),
    Utf8,
    NullableUtf8,
    Array(&'static str),
    NullableArray(&'static str),
    Nested,
    NestedArray,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let factory_id = parse_int_attr(&input.attrs, "factory_id")?.ok_or_else(|| {
        syn::Error::new_spanned(name, "HazelcastPortable requires #[hazelcast(factory_id = N)]")
    })?;
    let class_id = parse_int_attr(&input.attrs, "class_id")?.ok_or_else(|| {
        syn::Error::new_spanned(name, "HazelcastPortable requires #[hazelcast(class_id = N)]")
    })?;
    let version = match parse_int_attr(&input.attrs, "version")? {
        Some(version) => quote! { ::core::option::Option::Some(#version) },
        None => quote! { ::core::option::Option::None },
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "HazelcastPortable only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "HazelcastPortable can only be derived for structs",
            ))
        }
    };

    let some = quote! { ::core::option::Option::Some };
    let mut write_stmts = Vec::new();
    let mut read_stmts = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if has_flag(&field.attrs, "skip")? {
            continue;
        }
        let wire_name =
            parse_str_attr(&field.attrs, "field_name")?.unwrap_or_else(|| ident.to_string());

        let kind = if has_flag(&field.attrs, "portable")? {
            nested_kind(&field.ty)?
        } else {
            field_kind(&field.ty)?
        };

        let (write, read) = match kind {
            FieldKind::Primitive(ty) => {
                let write = method("write", ty);
                let read = method("read", ty);
                (
                    quote! { writer.#write(#wire_name, self.#ident)?; },
                    quote! { self.#ident = reader.#read(#wire_name)?; },
                )
            }
            FieldKind::Utf8 => (
                quote! { writer.write_string(#wire_name, #some(&self.#ident))?; },
                quote! { self.#ident = reader.read_string(#wire_name)?.unwrap_or_default(); },
            ),
            FieldKind::NullableUtf8 => (
                quote! { writer.write_string(#wire_name, self.#ident.as_deref())?; },
                quote! { self.#ident = reader.read_string(#wire_name)?; },
            ),
            FieldKind::Array(ty) => {
                let write = method("write", &format!("{}_array", ty));
                let read = method("read", &format!("{}_array", ty));
                (
                    quote! { writer.#write(#wire_name, #some(self.#ident.as_slice()))?; },
                    quote! { self.#ident = reader.#read(#wire_name)?.unwrap_or_default(); },
                )
            }
            FieldKind::NullableArray(ty) => {
                let write = method("write", &format!("{}_array", ty));
                let read = method("read", &format!("{}_array", ty));
                (
                    quote! { writer.#write(#wire_name, self.#ident.as_deref())?; },
                    quote! { self.#ident = reader.#read(#wire_name)?; },
                )
            }
            FieldKind::Nested => (
                quote! { writer.write_portable(#wire_name, self.#ident.as_ref())?; },
                quote! { self.#ident = reader.read_portable(#wire_name)?; },
            ),
            FieldKind::NestedArray => (
                quote! { writer.write_portable_array(#wire_name, #some(self.#ident.as_slice()))?; },
                quote! {
                    self.#ident = reader.read_portable_array(#wire_name)?.unwrap_or_default();
                },
            ),
        };
        write_stmts.push(write);
        read_stmts.push(read);
    }

    let krate = quote! { ::hazelcast_core::serialization };
    Ok(quote! {
        impl #impl_generics #krate::Portable for #name #ty_generics #where_clause {
            fn factory_id(&self) -> i32 {
                #factory_id
            }

            fn class_id(&self) -> i32 {
                #class_id
            }

            fn class_version(&self) -> ::core::option::Option<i32> {
                #version
            }

            fn write_portable(
                &self,
                writer: &mut dyn #krate::PortableWriter,
            ) -> ::hazelcast_core::Result<()> {
                #(#write_stmts)*
                ::core::result::Result::Ok(())
            }

            fn read_portable(
                &mut self,
                reader: &mut dyn #krate::PortableReader,
            ) -> ::hazelcast_core::Result<()> {
                #(#read_stmts)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

fn method(prefix: &str, ty: &str) -> syn::Ident {
    syn::Ident::new(&format!("{}_{}", prefix, ty), Span::call_site())
}

fn primitive(ty: &Type) -> Option<&'static str> {
    let Type::Path(path) = ty else {
        return None;
    };
    let ident = path.path.get_ident()?;
    Some(match ident.to_string().as_str() {
        "i8" => "byte",
        "bool" => "bool",
        "char" => "char",
        "i16" => "short",
        "i32" => "int",
        "i64" => "long",
        "f32" => "float",
        "f64" => "double",
        _ => return None,
    })
}

fn is_string(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.path.is_ident("String"))
}

/// Returns the single type argument of `Wrapper<T>`.
fn generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn element_kind(ty: &Type) -> Option<&'static str> {
    if is_string(ty) {
        Some("string")
    } else {
        primitive(ty)
    }
}

fn field_kind(ty: &Type) -> syn::Result<FieldKind> {
    if let Some(name) = primitive(ty) {
        return Ok(FieldKind::Primitive(name));
    }
    if is_string(ty) {
        return Ok(FieldKind::Utf8);
    }
    if let Some(element) = generic_arg(ty, "Vec").and_then(element_kind) {
        return Ok(FieldKind::Array(element));
    }
    if let Some(inner) = generic_arg(ty, "Option") {
        if is_string(inner) {
            return Ok(FieldKind::NullableUtf8);
        }
        if let Some(element) = generic_arg(inner, "Vec").and_then(element_kind) {
            return Ok(FieldKind::NullableArray(element));
        }
    }
    Err(syn::Error::new_spanned(
        ty,
        "unsupported portable field type; mark nested portables with #[hazelcast(portable)]",
    ))
}

fn nested_kind(ty: &Type) -> syn::Result<FieldKind> {
    if generic_arg(ty, "Option").is_some() {
        return Ok(FieldKind::Nested);
    }
    if generic_arg(ty, "Vec").is_some() {
        return Ok(FieldKind::NestedArray);
    }
    Err(syn::Error::new_spanned(
        ty,
        "#[hazelcast(portable)] fields must be Option<T> or Vec<T>",
    ))
}

fn parse_int_attr(attrs: &[syn::Attribute], key: &str) -> syn::Result<Option<i32>> {
    let mut result = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("hazelcast")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(key) {
                if let Lit::Int(int_lit) = meta.value()?.parse::<Lit>()? {
                    result = Some(int_lit.base10_parse()?);
                }
            } else if meta.input.peek(syn::Token![=]) {
                let _: Lit = meta.value()?.parse::<Lit>()?;
            }
            Ok(())
        })?;
    }
    Ok(result)
}

fn parse_str_attr(attrs: &[syn::Attribute], key: &str) -> syn::Result<Option<String>> {
    let mut result = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("hazelcast")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(key) {
                if let Lit::Str(s) = meta.value()?.parse::<Lit>()? {
                    result = Some(s.value());
                }
            } else if meta.input.peek(syn::Token![=]) {
                let _: Lit = meta.value()?.parse::<Lit>()?;
            }
            Ok(())
        })?;
    }
    Ok(result)
}

fn has_flag(attrs: &[syn::Attribute], flag: &str) -> syn::Result<bool> {
    let mut found = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("hazelcast")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(flag) {
                found = true;
            } else if meta.input.peek(syn::Token![=]) {
                let _: Lit = meta.value()?.parse::<Lit>()?;
            }
            Ok(())
        })?;
    }
    Ok(found)
}
