use encoding_rs::{Encoding, SHIFT_JIS, UTF_16LE};

/// Decodes document text of unknown encoding.
///
/// Order: byte-order mark, BOM-less UTF-16LE (first code unit in the ASCII range),
/// strict UTF-8, then Shift_JIS. Malformed sequences are replaced
/// rather than rejected.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text.into_owned();
    }
    if looks_like_utf16le(bytes) {
        let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
            if had_errors {
                tracing::debug!(bytes = bytes.len(), "text is neither UTF-8 nor clean Shift_JIS");
            }
            text.into_owned()
        }
    }
}

fn looks_like_utf16le(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes.len() % 2 == 0 && bytes[0] != 0 && bytes[1] == 0
}
