//! Quote-aware tokenizer for interactive input.
//!
//! Single- and double-quoted spans group into one token and the quotes
//! strip; there is no escape character. Whitespace separates tokens
//! everywhere else.

/// Splits one input line into tokens.
///
/// # Examples
///
/// ```
/// use host_dispatch::tokenize;
///
/// assert_eq!(tokenize("call demo echo"), vec!["call", "demo", "echo"]);
/// assert_eq!(
///     tokenize(r#"call demo echo message="hello world""#),
///     vec!["call", "demo", "echo", "message=hello world"]
/// );
/// assert!(tokenize("   ").is_empty());
/// ```
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    // Distinguishes "no token yet" from an empty quoted token ("").
    let mut has_token = false;

    for c in input.chars() {
        match in_quote {
            Some(quote) if c == quote => in_quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => {
                    in_quote = Some(c);
                    has_token = true;
                }
                c if c.is_whitespace() => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            },
        }
    }

    if has_token {
        tokens.push(current);
    }
    tokens
}
