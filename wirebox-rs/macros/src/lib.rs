//! Derive macros for wirebox-rs. `#[derive(Bean)]` writes the field wiring the container runs
//! during refresh; `#[derive(Bindable)]` binds a struct from the property keyspace.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitStr, Meta, Path};

/// Implements `Bean` from field attributes:
///
/// - `#[value("${key:=default}")]` binds a property, `#[expr("$ > 0")]` validates it;
/// - `#[autowire]` / `#[autowire("id,*?")]` injects beans (`Option<Arc<T>>`, `Vec<Arc<T>>`,
///   `HashMap<String, Arc<T>>`, `Lazy<T>`, `Context`);
/// - `#[logger]` stores the bean's `tracing::Span`.
///
/// `#[bean(init = method, destroy = method)]` on the struct routes the lifecycle hooks to
/// inherent methods returning `Result<(), E>`.
#[proc_macro_derive(Bean, attributes(bean, value, expr, autowire, logger))]
pub fn derive_bean(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_bean(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implements `Bindable` for a struct: `#[value("${key}")]` fields bind relative to the
/// struct's own key, untagged fields keep `Default::default()`.
#[proc_macro_derive(Bindable, attributes(value, expr))]
pub fn derive_bindable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_bindable(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

enum Tag {
    Value { tag: LitStr, validate: Option<LitStr> },
    Autowire(LitStr),
    Logger,
}

fn named_fields(input: &DeriveInput) -> syn::Result<Vec<&Field>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => Ok(named.named.iter().collect()),
            Fields::Unit => Ok(Vec::new()),
            Fields::Unnamed(_) => Err(syn::Error::new_spanned(
                &input.ident,
                "tuple structs are not supported, use named fields",
            )),
        },
        _ => Err(syn::Error::new_spanned(&input.ident, "only structs are supported")),
    }
}

fn field_tag(field: &Field) -> syn::Result<Option<Tag>> {
    let mut tag = None;
    let mut validate = None;
    for attr in &field.attrs {
        let found = if attr.path().is_ident("value") {
            Some(Tag::Value {
                tag: attr.parse_args()?,
                validate: None,
            })
        } else if attr.path().is_ident("autowire") {
            let selectors = match &attr.meta {
                Meta::Path(path) => LitStr::new("", path.span()),
                _ => attr.parse_args()?,
            };
            Some(Tag::Autowire(selectors))
        } else if attr.path().is_ident("logger") {
            Some(Tag::Logger)
        } else if attr.path().is_ident("expr") {
            validate = Some(attr.parse_args::<LitStr>()?);
            None
        } else {
            None
        };
        if let Some(found) = found {
            if tag.is_some() {
                return Err(syn::Error::new_spanned(
                    attr,
                    "a field takes only one of #[value], #[autowire] and #[logger]",
                ));
            }
            tag = Some(found);
        }
    }
    match (tag, validate) {
        (Some(Tag::Value { tag, .. }), validate) => Ok(Some(Tag::Value { tag, validate })),
        (_, Some(v)) => Err(syn::Error::new_spanned(v, "#[expr] needs a #[value] on the same field")),
        (other, None) => Ok(other),
    }
}

fn option_lit(lit: &Option<LitStr>) -> TokenStream2 {
    match lit {
        Some(v) => quote!(::core::option::Option::Some(#v)),
        None => quote!(::core::option::Option::None),
    }
}

#[derive(Default)]
struct Hooks {
    init: Option<Path>,
    destroy: Option<Path>,
}

fn bean_hooks(input: &DeriveInput) -> syn::Result<Hooks> {
    let mut hooks = Hooks::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("bean")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("init") {
                hooks.init = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("destroy") {
                hooks.destroy = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `init` or `destroy`"))
            }
        })?;
    }
    Ok(hooks)
}

/// `init = start` calls `Self::start`; longer paths are called as written.
fn hook_call(method: &Path) -> TokenStream2 {
    match method.get_ident() {
        Some(ident) => quote!(Self::#ident),
        None => quote!(#method),
    }
}

fn expand_bean(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut stmts = Vec::new();
    for field in named_fields(input)? {
        let ident = field.ident.as_ref().ok_or_else(|| syn::Error::new_spanned(field, "unnamed field"))?;
        let label = ident.to_string();
        match field_tag(field)? {
            Some(Tag::Value { tag, validate }) => {
                let validate = option_lit(&validate);
                stmts.push(quote! { self.#ident = wirer.value(#label, #tag, #validate)?; });
            }
            Some(Tag::Autowire(tag)) => {
                stmts.push(quote! { self.#ident = wirer.autowire(#label, #tag)?; });
            }
            Some(Tag::Logger) => {
                stmts.push(quote! { self.#ident = wirer.logger(); });
            }
            None => {}
        }
    }

    let hooks = bean_hooks(input)?;
    let init = hooks.init.as_ref().map(|method| {
        let method = hook_call(method);
        quote! {
            fn on_init(
                &self,
                ctx: &::wirebox_rs::Context,
            ) -> ::core::result::Result<(), ::wirebox_rs::BoxError> {
                #method(self, ctx).map_err(::core::convert::Into::into)
            }
        }
    });
    let destroy = hooks.destroy.as_ref().map(|method| {
        let method = hook_call(method);
        quote! {
            fn on_destroy(&self) -> ::core::result::Result<(), ::wirebox_rs::BoxError> {
                #method(self).map_err(::core::convert::Into::into)
            }
        }
    });
    let wirer = if stmts.is_empty() { quote!(_wirer) } else { quote!(wirer) };

    Ok(quote! {
        impl #impl_generics ::wirebox_rs::Bean for #name #ty_generics #where_clause {
            fn wire_fields(
                &mut self,
                #wirer: &mut ::wirebox_rs::Wirer<'_>,
            ) -> ::core::result::Result<(), ::wirebox_rs::CoreError> {
                #(#stmts)*
                ::core::result::Result::Ok(())
            }
            #init
            #destroy
        }
    })
}

fn expand_bindable(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut inits = Vec::new();
    let mut binds = false;
    for field in named_fields(input)? {
        let ident = field.ident.as_ref().ok_or_else(|| syn::Error::new_spanned(field, "unnamed field"))?;
        let label = ident.to_string();
        match field_tag(field)? {
            Some(Tag::Value { tag, validate }) => {
                let validate = option_lit(&validate);
                inits.push(quote! { #ident: props.bind_field(param, #label, #tag, #validate)? });
                binds = true;
            }
            None => inits.push(quote! { #ident: ::core::default::Default::default() }),
            Some(_) => {
                return Err(syn::Error::new_spanned(
                    field,
                    "Bindable fields take #[value] only",
                ))
            }
        }
    }
    let (props, param) = if binds {
        (quote!(props), quote!(param))
    } else {
        (quote!(_props), quote!(_param))
    };

    Ok(quote! {
        impl #impl_generics ::wirebox_rs::Bindable for #name #ty_generics #where_clause {
            fn bind(
                #props: &::wirebox_rs::Properties,
                #param: &::wirebox_rs::BindParam,
            ) -> ::core::result::Result<Self, ::wirebox_rs::CoreError> {
                ::core::result::Result::Ok(Self { #(#inits),* })
            }
        }
    })
}
