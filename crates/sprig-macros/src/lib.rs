use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, LitStr, Meta,
};

/// What a marked method is wired to.
enum Role {
    Connect,
    Disconnect,
    Action(String),
}

struct Marked {
    role: Role,
    ident: Ident,
    takes_context: bool,
}

/// Returns the role named by the marker attributes of `method` and strips them.
fn take_role(method: &mut ImplItemFn) -> syn::Result<Option<Role>> {
    let mut role = None;
    let mut kept: Vec<Attribute> = Vec::with_capacity(method.attrs.len());
    for attr in method.attrs.drain(..) {
        let found = if attr.path().is_ident("connect") {
            Role::Connect
        } else if attr.path().is_ident("disconnect") {
            Role::Disconnect
        } else if attr.path().is_ident("action") {
            let name = match &attr.meta {
                Meta::Path(_) => method.sig.ident.unraw().to_string(),
                Meta::List(_) => attr.parse_args::<LitStr>()?.value(),
                Meta::NameValue(_) => {
                    return Err(syn::Error::new_spanned(
                        &attr,
                        "expected `#[action]` or `#[action(\"name\")]`",
                    ));
                }
            };
            Role::Action(name)
        } else {
            kept.push(attr);
            continue;
        };
        if role.is_some() {
            return Err(syn::Error::new_spanned(
                &attr,
                "a controller method can carry only one role",
            ));
        }
        role = Some(found);
    }
    method.attrs = kept;
    Ok(role)
}

/// Checks the receiver and counts the extra arguments of a marked method.
fn check_signature(method: &ImplItemFn, role: &Role) -> syn::Result<bool> {
    let sig = &method.sig;
    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_some() => {}
        _ => {
            return Err(syn::Error::new(
                sig.span(),
                "controller methods must take `&mut self`",
            ));
        }
    }
    let extra = sig.inputs.len() - 1;
    match role {
        Role::Connect | Role::Disconnect if extra > 0 => Err(syn::Error::new(
            sig.inputs.span(),
            "lifecycle hooks take no arguments besides `&mut self`",
        )),
        Role::Action(_) if extra > 1 => Err(syn::Error::new(
            sig.inputs.span(),
            "actions take at most one argument, the `&mut ActionContext`",
        )),
        Role::Action(_) => Ok(extra == 1),
        _ => Ok(false),
    }
}

fn expand(mut item: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[controller] goes on an inherent impl block",
        ));
    }

    let mut marked = Vec::new();
    for impl_item in item.items.iter_mut() {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let Some(role) = take_role(method)? else {
            continue;
        };
        let takes_context = check_signature(method, &role)?;
        marked.push(Marked {
            role,
            ident: method.sig.ident.clone(),
            takes_context,
        });
    }

    let self_ty = &item.self_ty;
    let mut connect = None;
    let mut disconnect = None;
    let mut arms = Vec::new();
    let mut names: Vec<String> = Vec::new();
    for Marked {
        role,
        ident,
        takes_context,
    } in &marked
    {
        match role {
            Role::Connect => {
                if connect.is_some() {
                    return Err(syn::Error::new_spanned(ident, "duplicate #[connect] hook"));
                }
                connect = Some(quote! {
                    fn connect(&mut self) {
                        <#self_ty>::#ident(self)
                    }
                });
            }
            Role::Disconnect => {
                if disconnect.is_some() {
                    return Err(syn::Error::new_spanned(
                        ident,
                        "duplicate #[disconnect] hook",
                    ));
                }
                disconnect = Some(quote! {
                    fn disconnect(&mut self) {
                        <#self_ty>::#ident(self)
                    }
                });
            }
            Role::Action(name) => {
                if names.contains(name) {
                    return Err(syn::Error::new_spanned(
                        ident,
                        format!("action `{name}` is declared twice"),
                    ));
                }
                names.push(name.clone());
                let call = if *takes_context {
                    quote! { <#self_ty>::#ident(self, __ctx) }
                } else {
                    quote! { <#self_ty>::#ident(self) }
                };
                arms.push(quote! {
                    #name => ::core::option::Option::Some(
                        sprig_core::IntoActionResult::into_action_result(#call)
                    ),
                });
            }
        }
    }

    let (impl_generics, _ty_generics, where_clause) = item.generics.split_for_impl();
    let controller_impl = quote! {
        impl #impl_generics sprig_core::Controller for #self_ty #where_clause {
            #connect
            #disconnect

            fn action(
                &mut self,
                __method: &str,
                __ctx: &mut sprig_core::ActionContext<'_>,
            ) -> ::core::option::Option<sprig_core::ActionResult> {
                match __method {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    Ok(quote! {
        #item
        #controller_impl
    })
}

/// Implements `sprig_core::Controller` for the type of an inherent impl block.
///
/// Methods are wired by marker attributes:
///
/// * `#[connect]` and `#[disconnect]` mark the lifecycle hooks. Both take
///   only `&mut self`.
/// * `#[action]` exposes a method under its own name, `#[action("name")]`
///   under `name`. Actions take `&mut self` and optionally a
///   `&mut ActionContext<'_>`, and return `()` or a `Result<(), E>` whose
///   error converts into `Box<dyn Error>`.
///
/// Unmarked methods are left alone.
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_tokens = TokenStream2::from(attr);
    if !attr_tokens.is_empty() {
        return syn::Error::new_spanned(attr_tokens, "#[controller] takes no arguments")
            .to_compile_error()
            .into();
    }
    let item = parse_macro_input!(item as ItemImpl);
    match expand(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
