//! Escapers applied after formatting for escaped interpolations.

use crate::runtime::output::Output;

/// A text-to-text transform applied to formatted values. Stateless by
/// contract; renderers treat escapers as singletons.
pub trait Escaper {
    fn escape<O: Output + ?Sized>(text: &str, out: &mut O) -> Result<(), O::Error>;
}

/// HTML escaping over the Mustache escape set.
pub struct HtmlEscaper;

fn html_replacement(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

impl Escaper for HtmlEscaper {
    fn escape<O: Output + ?Sized>(text: &str, out: &mut O) -> Result<(), O::Error> {
        let mut plain_start = 0;
        for (i, c) in text.char_indices() {
            if let Some(replacement) = html_replacement(c) {
                if plain_start < i {
                    out.write_str(&text[plain_start..i])?;
                }
                out.write_str(replacement)?;
                plain_start = i + c.len_utf8();
            }
        }
        if plain_start < text.len() {
            out.write_str(&text[plain_start..])?;
        }
        Ok(())
    }
}

/// No-op escaper for plain-text content types.
pub struct PlainEscaper;

impl Escaper for PlainEscaper {
    fn escape<O: Output + ?Sized>(text: &str, out: &mut O) -> Result<(), O::Error> {
        out.write_str(text)
    }
}
