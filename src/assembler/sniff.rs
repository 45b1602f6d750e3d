pub const OCTET_STREAM: &str = "application/octet-stream";

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Guess a content type from the leading bytes of an object.
pub fn sniff_content_type(bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    if looks_like_text(bytes) {
        PLAIN_TEXT.to_string()
    } else {
        OCTET_STREAM.to_string()
    }
}

/// Whether a backend-reported content type is worth keeping over a sniffed one.
pub fn is_specific(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    !essence.is_empty() && !essence.eq_ignore_ascii_case(OCTET_STREAM)
}

fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }

    // A multi-byte character may be cut off at the end of the probe
    let valid = match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };

    valid && !bytes.iter().any(|&b| is_binary_control(b))
}

fn is_binary_control(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f | 0x7f)
}
