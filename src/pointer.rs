//! Reference strings: `[document]#/json/pointer`.
//!
//! Fragment segments are percent-decoded first and then JSON Pointer
//! unescaped (`~1` → `/`, `~0` → `~`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped when writing a pointer into a URI fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A reference string split into its document and fragment parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    /// Location of another document, or `None` for the containing one.
    pub document: Option<String>,
    /// Decoded pointer segments below the document root.
    pub segments: Vec<String>,
}

impl ParsedReference {
    pub fn is_internal(&self) -> bool {
        self.document.is_none()
    }
}

/// Split and decode a `$ref` value.
///
/// `"#/definitions/Foo"` stays in the current document; `"other.json#/a"`
/// and `"https://host/schema.json"` name external documents. A fragment that
/// is not a pointer (a named anchor such as `#foo`) is rejected.
pub fn parse_reference(reference: &str) -> Result<ParsedReference, String> {
    let (document, fragment) = match reference.find('#') {
        Some(idx) => (&reference[..idx], &reference[idx + 1..]),
        None => (reference, ""),
    };

    let document = if document.is_empty() {
        None
    } else {
        Some(document.to_string())
    };

    if fragment.is_empty() {
        return Ok(ParsedReference {
            document,
            segments: Vec::new(),
        });
    }
    if !fragment.starts_with('/') {
        return Err(format!("fragment \"#{}\" is not a JSON pointer", fragment));
    }

    let segments = fragment
        .split('/')
        .skip(1)
        .map(decode_segment)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedReference { document, segments })
}

fn decode_segment(segment: &str) -> Result<String, String> {
    let decoded = percent_decode_str(segment)
        .decode_utf8()
        .map_err(|e| format!("segment \"{}\" is not valid UTF-8: {}", segment, e))?;
    Ok(unescape_component(&decoded))
}

/// Unescapes one JSON Pointer token component.
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes one JSON Pointer token component.
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Build a same-document reference (`#/a/b`) from unescaped segments.
pub fn fragment_reference<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::from("#");
    for segment in segments {
        out.push('/');
        let escaped = escape_component(segment.as_ref());
        out.extend(utf8_percent_encode(&escaped, FRAGMENT));
    }
    out
}
