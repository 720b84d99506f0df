use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use watch_logging::watch_warn;

/// Decodes a page body to UTF-8 using: BOM -> Content-Type charset -> chardetng guess.
///
/// Malformed sequences are replaced rather than rejected; a slightly broken
/// page still carries usable tables.
pub fn decode_markup(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect_encoding(bytes, content_type);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        watch_warn!(
            "Page body had invalid {} sequences; replaced them",
            encoding.name()
        );
    }
    text.into_owned()
}

fn detect_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if let Some(enc) = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return enc;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Some(value.trim().trim_matches(&['"', '\''][..]).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::{charset_label, decode_markup};

    #[test]
    fn charset_parameter_is_case_insensitive() {
        assert_eq!(
            charset_label("text/html; Charset=\"ISO-8859-1\"").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(charset_label("text/html"), None);
    }

    #[test]
    fn header_charset_is_respected() {
        assert_eq!(
            decode_markup(b"caf\xe9", Some("text/html; charset=ISO-8859-1")),
            "caf\u{e9}"
        );
    }

    #[test]
    fn bom_wins_over_header() {
        assert_eq!(
            decode_markup(b"\xEF\xBB\xBFhello", Some("text/html; charset=ISO-8859-1")),
            "hello"
        );
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let text = decode_markup(b"ok \xff\xfe done", Some("text/html; charset=utf-8"));
        assert!(text.starts_with("ok "));
        assert!(text.ends_with(" done"));
        assert!(text.contains('\u{fffd}'));
    }
}
