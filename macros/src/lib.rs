#![deny(clippy::disallowed_methods)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    FnArg, Ident, ItemFn, Path, Token,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

mod util;
use util::*;

/// `#[marbles::test]` options: `annotated` and `fixture = path`.
#[derive(Default)]
struct TestArgs {
    annotated: bool,
    fixture: Option<Path,>,
}

impl Parse for TestArgs {
    fn parse(input: ParseStream,) -> syn::Result<Self,> {
        let mut args = TestArgs::default();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            match key.to_string().as_str() {
                "annotated" => args.annotated = true,
                "fixture" => {
                    input.parse::<Token![=]>()?;
                    args.fixture = Some(input.parse()?,);
                }
                _ => {
                    return Err(syn::Error::new_spanned(&key, "expected `annotated` or `fixture = path`",),);
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(args,)
    }
}

/// Turns a function into a test whose assertions report the test's locals.
///
/// The function may take `&TestCase` as its only parameter and may return
/// `()` or a `Result`. Every local the body binds is recorded as it is bound,
/// so a failing assertion can list it. `annotated` makes every assertion in
/// the test require a note; `fixture = path` passes the case through
/// `path(TestCase) -> TestCase` first, for shared attributes or sinks.
///
/// ```ignore
/// #[marbles::test(annotated)]
/// fn orders_balance(case: &TestCase) {
///     let total = ledger().total();
///     check!(case.assert_equal(&total, &0), note = "ledger is off by {total}");
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream,) -> TokenStream {
    let TestArgs { annotated, fixture, } = parse_macro_input!(attr as TestArgs);

    let mut f = match syn::parse::<ItemFn,>(item,) {
        Ok(f,) => f,
        Err(_,) => {
            return syn::Error::new(proc_macro2::Span::call_site(), "#[marbles::test] can only be applied to a function",)
                .to_compile_error()
                .into();
        }
    };

    if let Some(asyncness,) = &f.sig.asyncness {
        return syn::Error::new_spanned(asyncness, "#[marbles::test] functions must not be async",)
            .to_compile_error()
            .into();
    }
    if !f.sig.generics.params.is_empty() {
        return syn::Error::new_spanned(&f.sig.generics, "#[marbles::test] functions must not be generic",)
            .to_compile_error()
            .into();
    }
    if f.sig.inputs.len() > 1 {
        return syn::Error::new_spanned(
            &f.sig.inputs,
            "#[marbles::test] functions take at most one parameter, the test case",
        )
        .to_compile_error()
        .into();
    }
    if let Some(receiver @ FnArg::Receiver(_,),) = f.sig.inputs.first() {
        return syn::Error::new_spanned(receiver, "#[marbles::test] functions cannot take self",)
            .to_compile_error()
            .into();
    }

    let name = f.sig.ident.to_string();
    let inputs = f.sig.inputs.clone();
    let output = f.sig.output.clone();
    let mut body = *f.block;
    record_bindings(&mut body,);

    let call = if inputs.is_empty() { quote!(__marbles_run()) } else { quote!(__marbles_run(&__marbles_case)) };
    let annotate = annotated.then(|| quote!(.annotated()),);
    let fixture = fixture.map(|path| quote!(let __marbles_case = #path(__marbles_case);),);

    f.sig.inputs.clear();
    f.attrs.insert(0, syn::parse_quote!(#[test]),);
    f.block = Box::new(syn::parse_quote!({
        fn __marbles_run(#inputs) #output #body

        let __marbles_case = ::marbles::TestCase::new(::std::module_path!(), #name) #annotate;
        #fixture
        let __marbles_frame = ::marbles::frame::enter(&__marbles_case);
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| #call)) {
            ::std::result::Result::Ok(__marbles_ret) => {
                __marbles_frame.finish(::marbles::frame::TestReturn::is_failure(&__marbles_ret));
                __marbles_ret
            }
            ::std::result::Result::Err(__marbles_panic) => {
                __marbles_frame.finish(true);
                ::std::panic::resume_unwind(__marbles_panic)
            }
        }
    }),);

    TokenStream::from(quote!(#f),)
}
