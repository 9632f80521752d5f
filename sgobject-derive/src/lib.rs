//! # sgobject Derive Macros
//!
//! `#[derive(Parameterized)]` generates the field-descriptor table of a
//! struct: its class name, its generic tag and one `Parameter::add` call per
//! named field.
//!
//! ```rust,ignore
//! #[derive(Default, Parameterized)]
//! #[sgobject(name = "GaussianKernel", generic = T, migrations = gaussian_migrations)]
//! #[sgobject(load_post = rebuild_cache)]
//! struct Gaussian<T> {
//!     /// Kernel width.
//!     width: f64,
//!     #[param(matrix(rows = num_rows, cols = num_cols))]
//!     cache: Vec<T>,
//!     #[param(skip)]
//!     num_rows: usize,
//!     #[param(skip)]
//!     num_cols: usize,
//! }
//! ```
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, LitStr, Meta, Path};

/// Derives `sgobject::Parameterized`.
#[proc_macro_derive(Parameterized, attributes(sgobject, param))]
pub fn derive_parameterized(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

struct ClassAttrs {
    name: Option<LitStr>,
    generic: Option<Ident>,
    migrations: Option<Path>,
    hooks: Vec<(Ident, Path)>,
}

const HOOKS: [&str; 4] = ["load_pre", "load_post", "save_pre", "save_post"];

enum Registration {
    Field,
    Vector,
    Matrix { rows: Ident, cols: Ident },
}

struct ParamField {
    ident: Ident,
    ty: syn::Type,
    name: String,
    description: String,
    registration: Registration,
}

fn expand(mut input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = input.ident.clone();
    let class = parse_class_attributes(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(named) => {
                let mut fields = Vec::new();
                for field in &named.named {
                    let Some(field_ident) = field.ident.clone() else {
                        continue;
                    };
                    if let Some(parsed) = parse_field_attributes(field_ident, field.ty.clone(), &field.attrs)? {
                        fields.push(parsed);
                    }
                }
                fields
            }
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new(
                    ident.span(),
                    "Parameterized needs named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                ident.span(),
                "Parameterized only supports structs",
            ))
        }
    };

    if let Some(generic) = &class.generic {
        let declared = input.generics.type_params().any(|p| p.ident == *generic);
        if !declared {
            return Err(syn::Error::new(
                generic.span(),
                "`generic` must name a type parameter of the struct",
            ));
        }
    }

    let generic = class.generic.clone();
    for param in input.generics.type_params_mut() {
        param.bounds.push(parse_quote!(::std::marker::Send));
        param.bounds.push(parse_quote!(::std::marker::Sync));
        param.bounds.push(parse_quote!('static));
        if generic.as_ref() == Some(&param.ident) {
            param.bounds.push(parse_quote!(::sgobject::rt::Element));
        }
    }
    generate(&input, &class, &fields)
}

/// Parses `#[sgobject(name = "...", generic = T, migrations = path)]` and the
/// `load_pre`, `load_post`, `save_pre` and `save_post` hook paths.
fn parse_class_attributes(attrs: &[Attribute]) -> syn::Result<ClassAttrs> {
    let mut class = ClassAttrs {
        name: None,
        generic: None,
        migrations: None,
        hooks: Vec::new(),
    };
    for attr in attrs {
        if attr.path().is_ident("sgobject") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    class.name = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                if meta.path.is_ident("generic") {
                    class.generic = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                if meta.path.is_ident("migrations") {
                    class.migrations = Some(meta.value()?.parse()?);
                    return Ok(());
                }
                if let Some(hook) = HOOKS.iter().copied().find(|h| meta.path.is_ident(h)) {
                    let ident = Ident::new(hook, proc_macro2::Span::call_site());
                    class.hooks.push((ident, meta.value()?.parse()?));
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown sgobject attribute key. Supported: name, generic, migrations, \
                     load_pre, load_post, save_pre, save_post",
                ))
            })?;
        }
    }
    Ok(class)
}

/// Parses `#[param(...)]` on one field. Returns `None` for skipped fields.
fn parse_field_attributes(ident: Ident, ty: syn::Type, attrs: &[Attribute]) -> syn::Result<Option<ParamField>> {
    let mut skip = false;
    let mut name = None;
    let mut description = None;
    let mut registration = Registration::Field;

    for attr in attrs {
        if attr.path().is_ident("param") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    return Ok(());
                }
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    name = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("description") {
                    let s: LitStr = meta.value()?.parse()?;
                    description = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("vector") {
                    registration = Registration::Vector;
                    return Ok(());
                }
                if meta.path.is_ident("matrix") {
                    let mut rows = None;
                    let mut cols = None;
                    meta.parse_nested_meta(|dim| {
                        if dim.path.is_ident("rows") {
                            rows = Some(dim.value()?.parse::<Ident>()?);
                            return Ok(());
                        }
                        if dim.path.is_ident("cols") {
                            cols = Some(dim.value()?.parse::<Ident>()?);
                            return Ok(());
                        }
                        Err(dim.error("matrix takes `rows = field` and `cols = field`"))
                    })?;
                    match (rows, cols) {
                        (Some(rows), Some(cols)) => {
                            registration = Registration::Matrix { rows, cols };
                            Ok(())
                        }
                        _ => Err(meta.error("matrix needs both `rows` and `cols`")),
                    }
                } else {
                    Err(meta.error(
                        "Unknown param attribute key. Supported: skip, name, description, vector, matrix",
                    ))
                }
            })?;
        }
    }

    if skip {
        return Ok(None);
    }
    let description = description.unwrap_or_else(|| doc_comment(attrs));
    Ok(Some(ParamField {
        name: name.unwrap_or_else(|| ident.to_string()),
        ident,
        ty,
        description,
        registration,
    }))
}

/// First line of the field's doc comment, if any.
fn doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .find_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(lit) => match &lit.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .unwrap_or_default()
}

fn generate(input: &DeriveInput, class: &ClassAttrs, fields: &[ParamField]) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let class_name = class
        .name
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| ident.to_string());

    let generic_fn = class.generic.as_ref().map(|g| {
        quote! {
            fn generic() -> ::std::option::Option<::sgobject::rt::PrimitiveType> {
                ::sgobject::rt::generic_of::<#g>()
            }
        }
    });

    let migrations_fn = class.migrations.as_ref().map(|path| {
        quote! {
            fn map_parameters(map: &mut ::sgobject::rt::ParameterMap) {
                #path(map)
            }
        }
    });

    let hook_fns = class.hooks.iter().map(|(hook, path)| {
        let receiver = if hook.to_string().starts_with("load") {
            quote!(&mut self)
        } else {
            quote!(&self)
        };
        quote! {
            fn #hook(#receiver) -> ::sgobject::rt::Result<()> {
                #path(self)
            }
        }
    });

    let registrations = fields.iter().map(|f| {
        let fident = &f.ident;
        let fty = &f.ty;
        let name = &f.name;
        let desc = &f.description;
        match &f.registration {
            Registration::Field => quote! {
                params.add::<#fty>(#name, #desc, |o| &o.#fident, |o| &mut o.#fident)?;
            },
            Registration::Vector => quote! {
                params.add_vector(#name, #desc, |o| &o.#fident, |o| &mut o.#fident)?;
            },
            Registration::Matrix { rows, cols } => quote! {
                params.add_matrix(
                    #name,
                    #desc,
                    ::sgobject::rt::Lens::<Self, #fty>::new(|o| &o.#fident, |o| &mut o.#fident),
                    ::sgobject::rt::Lens::<Self, usize>::new(|o| &o.#rows, |o| &mut o.#rows),
                    ::sgobject::rt::Lens::<Self, usize>::new(|o| &o.#cols, |o| &mut o.#cols),
                )?;
            },
        }
    });

    Ok(quote! {
        impl #impl_generics ::sgobject::rt::Parameterized for #ident #ty_generics #where_clause {
            fn class_name() -> &'static str {
                #class_name
            }

            #generic_fn

            #[allow(unused_variables)]
            fn register(params: &mut ::sgobject::rt::Parameter<Self>) -> ::sgobject::rt::Result<()> {
                #(#registrations)*
                ::std::result::Result::Ok(())
            }

            #migrations_fn

            #(#hook_fns)*
        }
    })
}
