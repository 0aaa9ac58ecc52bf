use std::iter::Peekable;
use std::str::Chars;

/// Expand `{name}` placeholders using `lookup`.
///
/// Unknown names, empty braces and unterminated placeholders are kept verbatim.
pub fn expand_placeholders<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                // Found potential placeholder
                let (name, closed) = consume_placeholder(&mut chars);
                match lookup(name.trim()) {
                    Some(value) if closed && !name.trim().is_empty() => output.push_str(&value),
                    _ => {
                        output.push('{');
                        output.push_str(&name);
                        if closed {
                            output.push('}');
                        }
                    }
                }
            }
            _ => output.push(c),
        }
    }

    output
}

/// Read up to the closing brace. Returns the name and whether the brace was found.
fn consume_placeholder(chars: &mut Peekable<Chars>) -> (String, bool) {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            '}' => {
                chars.next();
                return (name, true);
            }
            // A new opening brace means the previous one was literal text
            '{' => return (name, false),
            _ => {
                name.push(c);
                chars.next();
            }
        }
    }
    (name, false)
}
