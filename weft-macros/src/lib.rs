use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs an `async fn main` as the root task of a fresh scheduler.
///
/// Accepts an optional `max_read = N` argument, forwarded to
/// `SchedulerBuilder::max_read`.
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let builder = match builder(attr) {
        Ok(builder) => builder,
        Err(message) => return compile_error(&message),
    };

    rewrite(item, &builder)
}

/// Runs an `async fn` test as the root task of a fresh scheduler.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let builder = match builder(attr) {
        Ok(builder) => builder,
        Err(message) => return compile_error(&message),
    };

    let mut result: Vec<TokenTree> = match "#[test]".parse::<TokenStream>() {
        Ok(attr) => attr.into_iter().collect(),
        Err(err) => return compile_error(&err.to_string()),
    };
    result.extend(rewrite(item, &builder));

    result.into_iter().collect()
}

fn builder(attr: TokenStream) -> Result<String, String> {
    let mut builder = String::from("::weft::SchedulerBuilder::new()");

    let attr = attr.to_string();
    for part in attr.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some(value) = part.strip_prefix("max_read") else {
            return Err(format!("unknown weft attribute argument `{part}`"));
        };

        let value = value.trim().trim_start_matches('=').trim().replace('_', "");
        match value.parse::<usize>() {
            Ok(n) if n > 0 => builder.push_str(&format!(".max_read({n})")),
            _ => return Err(format!("`max_read` expects a positive integer, got `{value}`")),
        }
    }

    builder.push_str(".build()");
    Ok(builder)
}

fn rewrite(item: TokenStream, builder: &str) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    } else {
        return compile_error("the function must be declared `async`");
    }

    let Some(pos) = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
    else {
        return compile_error("expected a function body");
    };

    let TokenTree::Group(body) = &tokens[pos] else {
        return compile_error("expected a function body");
    };

    let block = format!(
        "{{
            let scheduler = {builder};
            scheduler.block_on(async move {{ {} }})
        }}",
        body.stream()
    );

    match block.parse::<TokenStream>() {
        Ok(stream) => {
            tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));
            tokens.into_iter().collect()
        }
        Err(err) => compile_error(&format!("weft macro error: {err}")),
    }
}

fn compile_error(message: &str) -> TokenStream {
    format!("::core::compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
