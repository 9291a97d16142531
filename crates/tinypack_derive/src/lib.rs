//! Derive macros for the `tinypack` serialization traits.
//!
//! This crate provides derive macros for the `Encode`, `Decode` and
//! `TypeName` traits from the `tinypack` crate.
//!
//! # Supported Types
//!
//! The derive macros support:
//! - Structs with named fields
//! - Tuple structs
//! - Unit structs
//! - Enums with any combination of unit, tuple, and struct variants
//!
//! Record fields are written in declaration order with no framing, so a
//! nested record encodes byte-identically to a flattened one with the same
//! effective field sequence. Enums write their variant index as a varint
//! followed by the variant's fields.
//!
//! # Field Attributes
//!
//! ## `#[tinypack(skip)]`
//!
//! Excludes a field from both directions entirely: it contributes no bytes
//! and no length. Decoding fills it with `Default::default()` when
//! constructing a fresh value, and leaves it untouched when decoding in
//! place.
//!
//! ```ignore
//! use tinypack::{Decode, Encode};
//!
//! #[derive(Encode, Decode)]
//! struct Config {
//!     name: String,
//!     #[tinypack(skip)]
//!     cache: Vec<u8>, // Uses Default::default() when decoding
//! }
//! ```
//!
//! # `TypeName`
//!
//! `#[derive(TypeName)]` produces the canonical name used by the type
//! registry: the `module_path!()`-qualified identifier, with generic
//! arguments rendered structurally.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, Data, DataEnum, DataStruct, DeriveInput, Field,
    Fields, Index,
};

/// Checks if a field has the `#[tinypack(skip)]` attribute.
fn should_skip(field: &Field) -> bool {
    field.attrs.iter().any(|attr| {
        if !attr.path().is_ident("tinypack") {
            return false;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                Ok(())
            } else {
                Err(meta.error("unknown tinypack attribute"))
            }
        })
        .is_ok()
    })
}

/// Derive macro for `Encode`.
///
/// For structs, all non-skipped fields are encoded in declaration order.
/// For enums, the variant index is encoded first as a `u32` varint,
/// followed by any variant data.
#[proc_macro_derive(Encode, attributes(tinypack))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    // Build where clause with Encode bounds for all generic type parameters
    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));
    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::tinypack::Encode));
        }
    }

    let encode_impl = match &input.data {
        Data::Struct(data_struct) => impl_encode_struct(data_struct),
        Data::Enum(data_enum) => impl_encode_enum(data_enum),
        Data::Union(_) => {
            return syn::Error::new_spanned(
                &input,
                "Encode cannot be derived for unions",
            )
            .to_compile_error()
            .into();
        }
    };

    let expanded = quote! {
        impl #impl_generics ::tinypack::Encode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode(
                &self,
                encoder: &mut ::tinypack::Encoder,
            ) -> ::std::io::Result<()> {
                #encode_impl
            }
        }
    };

    TokenStream::from(expanded)
}

fn impl_encode_struct(data_struct: &DataStruct) -> proc_macro2::TokenStream {
    match &data_struct.fields {
        Fields::Named(fields) => {
            let field_encodes = fields
                .named
                .iter()
                .filter(|field| !should_skip(field))
                .map(|field| {
                    let field_name = &field.ident;
                    quote! {
                        ::tinypack::Encode::encode(&self.#field_name, encoder)?;
                    }
                });

            quote! {
                #(#field_encodes)*
                Ok(())
            }
        }
        Fields::Unnamed(fields) => {
            let field_encodes = fields
                .unnamed
                .iter()
                .enumerate()
                .filter(|(_, field)| !should_skip(field))
                .map(|(i, _)| {
                    let index = Index::from(i);
                    quote! {
                        ::tinypack::Encode::encode(&self.#index, encoder)?;
                    }
                });

            quote! {
                #(#field_encodes)*
                Ok(())
            }
        }
        Fields::Unit => {
            quote! {
                Ok(())
            }
        }
    }
}

fn impl_encode_enum(data_enum: &DataEnum) -> proc_macro2::TokenStream {
    let variant_matches =
        data_enum.variants.iter().enumerate().map(|(idx, variant)| {
            let variant_name = &variant.ident;
            let variant_index = u32::try_from(idx).expect("too many variants");

            match &variant.fields {
                Fields::Named(fields) => {
                    let field_names: Vec<_> = fields
                        .named
                        .iter()
                        .map(|f| (&f.ident, should_skip(f)))
                        .collect();

                    let pattern_bindings =
                        field_names.iter().map(|(name, skip)| {
                            if *skip {
                                quote! { #name: _ }
                            } else {
                                quote! { #name }
                            }
                        });

                    let field_encodes = field_names
                        .iter()
                        .filter(|(_, skip)| !skip)
                        .map(|(field_name, _)| {
                            quote! {
                                ::tinypack::Encode::encode(#field_name, encoder)?;
                            }
                        });

                    quote! {
                        Self::#variant_name { #(#pattern_bindings),* } => {
                            encoder.emit_u32(#variant_index);
                            #(#field_encodes)*
                        }
                    }
                }
                Fields::Unnamed(fields) => {
                    let field_data: Vec<_> = fields
                        .unnamed
                        .iter()
                        .enumerate()
                        .map(|(i, f)| {
                            let binding = syn::Ident::new(
                                &format!("field_{i}"),
                                proc_macro2::Span::call_site(),
                            );
                            (binding, should_skip(f))
                        })
                        .collect();

                    let pattern_bindings =
                        field_data.iter().map(|(binding, skip)| {
                            if *skip {
                                quote! { _ }
                            } else {
                                quote! { #binding }
                            }
                        });

                    let field_encodes = field_data
                        .iter()
                        .filter(|(_, skip)| !skip)
                        .map(|(binding, _)| {
                            quote! {
                                ::tinypack::Encode::encode(#binding, encoder)?;
                            }
                        });

                    quote! {
                        Self::#variant_name(#(#pattern_bindings),*) => {
                            encoder.emit_u32(#variant_index);
                            #(#field_encodes)*
                        }
                    }
                }
                Fields::Unit => {
                    quote! {
                        Self::#variant_name => {
                            encoder.emit_u32(#variant_index);
                        }
                    }
                }
            }
        });

    quote! {
        match self {
            #(#variant_matches)*
        }
        Ok(())
    }
}

/// Derive macro for `Decode`.
///
/// For structs, fields are decoded in declaration order; skipped fields use
/// `Default::default()`. Structs additionally get a fieldwise
/// `decode_in_place` so nested destinations keep their storage. For enums,
/// the variant index is decoded first, then the variant data; an index with
/// no matching variant is a data error.
#[proc_macro_derive(Decode, attributes(tinypack))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    // Build where clause with Decode bounds for all generic type parameters
    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));
    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::tinypack::Decode));
        }
    }

    let (decode_impl, in_place_impl) = match &input.data {
        Data::Struct(data_struct) => (
            impl_decode_struct(data_struct),
            Some(impl_decode_struct_in_place(data_struct)),
        ),
        Data::Enum(data_enum) => (impl_decode_enum(name, data_enum), None),
        Data::Union(_) => {
            return syn::Error::new_spanned(
                &input,
                "Decode cannot be derived for unions",
            )
            .to_compile_error()
            .into();
        }
    };

    let in_place_fn = in_place_impl.map(|body| {
        quote! {
            #[allow(unused_variables)]
            fn decode_in_place(
                &mut self,
                decoder: &mut ::tinypack::Decoder<'_>,
            ) -> ::std::io::Result<()> {
                #body
            }
        }
    });

    let expanded = quote! {
        impl #impl_generics ::tinypack::Decode for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn decode(
                decoder: &mut ::tinypack::Decoder<'_>,
            ) -> ::std::io::Result<Self> {
                #decode_impl
            }

            #in_place_fn
        }
    };

    TokenStream::from(expanded)
}

fn impl_decode_struct(data_struct: &DataStruct) -> proc_macro2::TokenStream {
    match &data_struct.fields {
        Fields::Named(fields) => {
            let field_decodes = fields.named.iter().map(|field| {
                let field_name = &field.ident;
                let field_type = &field.ty;

                if should_skip(field) {
                    quote! {
                        #field_name: <#field_type as ::std::default::Default>::default(),
                    }
                } else {
                    quote! {
                        #field_name: <#field_type as ::tinypack::Decode>::decode(decoder)?,
                    }
                }
            });

            quote! {
                Ok(Self {
                    #(#field_decodes)*
                })
            }
        }
        Fields::Unnamed(fields) => {
            let field_decodes = fields.unnamed.iter().map(|field| {
                let field_type = &field.ty;

                if should_skip(field) {
                    quote! {
                        <#field_type as ::std::default::Default>::default(),
                    }
                } else {
                    quote! {
                        <#field_type as ::tinypack::Decode>::decode(decoder)?,
                    }
                }
            });

            quote! {
                Ok(Self(#(#field_decodes)*))
            }
        }
        Fields::Unit => {
            quote! {
                Ok(Self)
            }
        }
    }
}

fn impl_decode_struct_in_place(
    data_struct: &DataStruct,
) -> proc_macro2::TokenStream {
    match &data_struct.fields {
        Fields::Named(fields) => {
            let field_decodes = fields
                .named
                .iter()
                .filter(|field| !should_skip(field))
                .map(|field| {
                    let field_name = &field.ident;
                    quote! {
                        ::tinypack::Decode::decode_in_place(
                            &mut self.#field_name,
                            decoder,
                        )?;
                    }
                });

            quote! {
                #(#field_decodes)*
                Ok(())
            }
        }
        Fields::Unnamed(fields) => {
            let field_decodes = fields
                .unnamed
                .iter()
                .enumerate()
                .filter(|(_, field)| !should_skip(field))
                .map(|(i, _)| {
                    let index = Index::from(i);
                    quote! {
                        ::tinypack::Decode::decode_in_place(
                            &mut self.#index,
                            decoder,
                        )?;
                    }
                });

            quote! {
                #(#field_decodes)*
                Ok(())
            }
        }
        Fields::Unit => {
            quote! {
                Ok(())
            }
        }
    }
}

fn impl_decode_enum(
    name: &syn::Ident,
    data_enum: &DataEnum,
) -> proc_macro2::TokenStream {
    let variant_count = data_enum.variants.len();
    let variant_matches =
        data_enum.variants.iter().enumerate().map(|(idx, variant)| {
            let variant_name = &variant.ident;
            let variant_index = u32::try_from(idx).expect("too many variants");

            match &variant.fields {
                Fields::Named(fields) => {
                    let field_decodes = fields.named.iter().map(|field| {
                        let field_name = &field.ident;
                        let field_type = &field.ty;

                        if should_skip(field) {
                            quote! {
                                #field_name: <#field_type as ::std::default::Default>::default(),
                            }
                        } else {
                            quote! {
                                #field_name: <#field_type as ::tinypack::Decode>::decode(decoder)?,
                            }
                        }
                    });

                    quote! {
                        #variant_index => Ok(Self::#variant_name { #(#field_decodes)* }),
                    }
                }
                Fields::Unnamed(fields) => {
                    let field_decodes = fields.unnamed.iter().map(|field| {
                        let field_type = &field.ty;

                        if should_skip(field) {
                            quote! {
                                <#field_type as ::std::default::Default>::default(),
                            }
                        } else {
                            quote! {
                                <#field_type as ::tinypack::Decode>::decode(decoder)?,
                            }
                        }
                    });

                    quote! {
                        #variant_index => Ok(Self::#variant_name(#(#field_decodes)*)),
                    }
                }
                Fields::Unit => {
                    quote! {
                        #variant_index => Ok(Self::#variant_name),
                    }
                }
            }
        });

    let name_str = name.to_string();

    quote! {
        let variant_index = decoder.read_u32();
        match variant_index {
            #(#variant_matches)*
            _ => Err(::std::io::Error::new(
                ::std::io::ErrorKind::InvalidData,
                ::std::format!(
                    "invalid variant index {} for enum {} (expected 0..{})",
                    variant_index,
                    #name_str,
                    #variant_count
                ),
            )),
        }
    }
}

/// Derive macro for `TypeName`.
///
/// The canonical name is the `module_path!()`-qualified type identifier;
/// generic parameters are appended structurally, in declaration order, so
/// distinct instantiations never share a name.
#[proc_macro_derive(TypeName)]
pub fn derive_type_name(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) =
        input.generics.split_for_impl();

    // Build where clause with TypeName bounds for all generic type
    // parameters
    let mut where_clause =
        where_clause.cloned().unwrap_or_else(|| syn::parse_quote!(where));
    for param in &input.generics.params {
        if let syn::GenericParam::Type(type_param) = param {
            let ident = &type_param.ident;
            where_clause
                .predicates
                .push(syn::parse_quote!(#ident: ::tinypack::TypeName));
        }
    }

    // Render generic arguments structurally, in declaration order.
    let mut argument_parts = Vec::new();
    for param in &input.generics.params {
        let part = match param {
            syn::GenericParam::Type(type_param) => {
                let ident = &type_param.ident;
                quote! {
                    <#ident as ::tinypack::TypeName>::append_name(out);
                }
            }
            syn::GenericParam::Const(const_param) => {
                let ident = &const_param.ident;
                quote! {
                    out.push_str(&#ident.to_string());
                }
            }
            syn::GenericParam::Lifetime(_) => continue,
        };
        argument_parts.push(part);
    }

    let arguments = if argument_parts.is_empty() {
        quote! {}
    } else {
        let separated = argument_parts.iter().enumerate().map(|(i, part)| {
            if i == 0 {
                quote! { #part }
            } else {
                quote! {
                    out.push_str(", ");
                    #part
                }
            }
        });
        quote! {
            out.push('<');
            #(#separated)*
            out.push('>');
        }
    };

    let expanded = quote! {
        impl #impl_generics ::tinypack::TypeName for #name #ty_generics #where_clause {
            fn append_name(out: &mut ::std::string::String) {
                out.push_str(::core::module_path!());
                out.push_str("::");
                out.push_str(#name_str);
                #arguments
            }
        }
    };

    TokenStream::from(expanded)
}
