use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Options accepted by `#[coqueue::main(...)]` and `#[coqueue::test(...)]`.
struct QueueOptions {
    label: Option<String>,
    stack_size: Option<usize>,
}

impl QueueOptions {
    fn parse(attr: TokenStream) -> Self {
        let attr_str = attr.to_string();
        let mut options = Self {
            label: None,
            stack_size: None,
        };

        for part in attr_str.split(',') {
            let part = part.trim();
            if let Some(v) = part.strip_prefix("label") {
                let v = v.trim_start().trim_start_matches('=').trim();
                options.label = Some(v.trim_matches('"').to_string());
            } else if let Some(v) = part.strip_prefix("stack_size") {
                let v = v.trim_start().trim_start_matches('=').trim();
                options.stack_size = v.replace('_', "").parse::<usize>().ok();
            }
        }

        options
    }

    /// Source of an expression building the entry queue.
    fn builder(&self, default_label: &str) -> String {
        let label = self.label.as_deref().unwrap_or(default_label);
        let mut builder = format!("::coqueue::QueueBuilder::new().label({label:?})");

        if let Some(n) = self.stack_size {
            builder.push_str(&format!(".stack_size({n})"));
        }

        builder.push_str(".build()");
        builder
    }
}

/// Removes the `async` keyword and returns the position and source of the
/// function body.
fn split_body(tokens: &mut Vec<TokenTree>) -> Option<(usize, String)> {
    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }

    let pos = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))?;

    match &tokens[pos] {
        TokenTree::Group(g) => Some((pos, g.stream().to_string())),
        _ => None,
    }
}

fn replace_body(mut tokens: Vec<TokenTree>, pos: usize, body: String) -> TokenStream {
    match body.parse::<TokenStream>() {
        Ok(stream) => {
            tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));
            tokens.into_iter().collect()
        }
        Err(err) => format!("compile_error!({:?});", format!("coqueue macro error: {err}"))
            .parse()
            .unwrap_or_default(),
    }
}

/// Runs an `async fn main` to completion on a fresh serial queue.
///
/// Accepts `label = "..."` and `stack_size = N`.
///
/// ```rust,ignore
/// #[coqueue::main(label = "app")]
/// async fn main() {
///     let answer = coqueue::spawn_task(async { 42 }).await;
///     println!("{answer}");
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = QueueOptions::parse(attr);
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some((pos, block)) = split_body(&mut tokens) else {
        return TokenStream::new();
    };

    let new_block = format!(
        "{{
            let queue = {};
            queue
                .block_on(async move {{
                    {}
                }})
        }}",
        options.builder("main"),
        block
    );

    replace_body(tokens, pos, new_block)
}

/// Runs an `async` test to completion on a fresh serial queue.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = QueueOptions::parse(attr);
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some((pos, block)) = split_body(&mut tokens) else {
        return TokenStream::new();
    };

    let new_block = format!(
        "{{
        let queue = {};
        queue
            .block_on(async move {{ {} }});
    }}",
        options.builder("test"),
        block
    );

    let test_attr: TokenStream = "#[test]".parse().unwrap_or_default();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(replace_body(tokens, pos, new_block));

    result.into_iter().collect()
}
