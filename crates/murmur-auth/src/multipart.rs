//! Extraction of the signed file payload from a `multipart/form-data` body.
//!
//! The client signs the raw audio bytes before they are wrapped in multipart
//! framing, so the verifier has to recover exactly those bytes from the
//! received body. Boundaries, part headers and field ordering are not
//! byte-stable between producer and relay, which is why the framing is never
//! hashed.
//!
//! This is a synchronous parser that works on the already-collected body.

/// Name of the form field that carries the signed payload.
pub const FILE_FIELD: &str = "file";

/// The `file` part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart<'a> {
    /// The `filename` parameter of the part's Content-Disposition.
    pub filename: String,
    /// The part's own Content-Type, if declared.
    pub content_type: Option<String>,
    /// The raw file bytes, without any framing.
    pub data: &'a [u8],
}

/// Extract the boundary from a `multipart/form-data; boundary=...` content type.
///
/// Returns `None` if the content type is not `multipart/form-data` or carries
/// no non-empty boundary parameter.
///
/// # Examples
///
/// ```
/// use murmur_auth::multipart::extract_boundary;
///
/// let boundary = extract_boundary("multipart/form-data; boundary=xyz").unwrap();
/// assert_eq!(boundary, "xyz");
/// assert!(extract_boundary("application/json").is_none());
/// ```
#[must_use]
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let mime: mime::Mime = content_type.parse().ok()?;
    if mime.type_() != mime::MULTIPART || mime.subtype() != mime::FORM_DATA {
        return None;
    }
    let boundary = mime.get_param(mime::BOUNDARY)?.as_str();
    (!boundary.is_empty()).then(|| boundary.to_owned())
}

/// Locate the `file` part in a multipart body.
///
/// Only a part named `file` whose Content-Disposition carries a `filename`
/// is a file part; a plain text field that happens to be called `file` is
/// ignored. When several file parts share the name, the first one wins.
#[must_use]
pub fn extract_file_part<'a>(body: &'a [u8], boundary: &str) -> Option<FilePart<'a>> {
    split_parts(body, boundary).into_iter().find_map(|part| {
        let (headers, data) = split_headers_body(part)?;
        let disposition = parse_content_disposition(headers)?;
        if disposition.name != FILE_FIELD {
            return None;
        }
        Some(FilePart {
            filename: disposition.filename?,
            content_type: parse_part_content_type(headers),
            data,
        })
    })
}

/// Split the body into the raw bytes of each part (headers plus content).
///
/// A part that is not followed by another delimiter is dropped.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let dash_boundary = format!("--{boundary}");
    let delimiter = format!("\r\n--{boundary}");
    let mut parts = Vec::new();

    // The first delimiter may open the body without a leading CRLF.
    let mut remaining = if body.starts_with(dash_boundary.as_bytes()) {
        &body[dash_boundary.len()..]
    } else if let Some(pos) = find_bytes(body, delimiter.as_bytes()) {
        &body[pos + delimiter.len()..]
    } else {
        return parts;
    };

    loop {
        // Close delimiter.
        if remaining.starts_with(b"--") {
            break;
        }

        // Only linear whitespace may sit between a delimiter and its CRLF.
        let Some(line_end) = find_bytes(remaining, b"\r\n") else {
            break;
        };
        if !remaining[..line_end]
            .iter()
            .all(|b| *b == b' ' || *b == b'\t')
        {
            break;
        }
        remaining = &remaining[line_end + 2..];

        let Some(pos) = find_bytes(remaining, delimiter.as_bytes()) else {
            break;
        };
        parts.push(&remaining[..pos]);
        remaining = &remaining[pos + delimiter.len()..];
    }

    parts
}

/// Split a part into headers section and content at the first blank line.
fn split_headers_body(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = b"\r\n\r\n";
    // A part with no headers starts directly with the blank line.
    if let Some(content) = part.strip_prefix(b"\r\n") {
        return Some((&[], content));
    }
    find_bytes(part, separator).map(|pos| (&part[..pos], &part[pos + separator.len()..]))
}

struct ContentDisposition {
    name: String,
    filename: Option<String>,
}

fn parse_content_disposition(headers: &[u8]) -> Option<ContentDisposition> {
    let value = header_value(headers, "content-disposition")?;
    let mut params = split_params(&value).into_iter();

    if !params.next()?.eq_ignore_ascii_case("form-data") {
        return None;
    }

    let mut name = None;
    let mut filename = None;
    for param in params {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        let val = unquote(val.trim());
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(val),
            "filename" => filename = Some(val),
            _ => {}
        }
    }

    Some(ContentDisposition {
        name: name?,
        filename,
    })
}

fn parse_part_content_type(headers: &[u8]) -> Option<String> {
    header_value(headers, "content-type")
}

/// Find a header in a part's headers section by case-insensitive name.
fn header_value(headers: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(headers);
    text.split("\r\n").find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_owned())
    })
}

/// Split a header value on `;`, ignoring separators inside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_owned(),
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
