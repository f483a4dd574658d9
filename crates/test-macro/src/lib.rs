use proc_macro::TokenStream;
use quote::ToTokens;
use syn::{parse_macro_input, parse_quote, Block, ItemFn};

/// Enables log output for a test when it is run with `--nocapture`.
///
/// Works for both `#[test]` and `#[tokio::test]` functions. The test body runs inside a span
/// named after the test so interleaved output of concurrent tests can be told apart.
#[proc_macro_attribute]
pub fn enable_logging(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut function = parse_macro_input!(item as ItemFn);

    let name = function.sig.ident.to_string();
    let stmts = function.block.stmts;
    let block: Block = parse_quote! {{
        if ::std::env::args().any(|e| e == "--nocapture") {
            // Another test in the same binary may have installed the subscriber already.
            let _ = ::rollup_sync_utils::logging::setup_tracing();
            let _span = ::tracing::span!(::tracing::Level::INFO, #name).entered();

            #(#stmts)*
        } else {
            #(#stmts)*
        }
    }};
    function.block = Box::new(block);

    function.into_token_stream().into()
}
