//! Body decoding and multipart content extraction.
//!
//! The provider delivers part bodies base64url-encoded. Decoding is
//! best-effort: anything that fails to decode yields an empty string, and
//! callers treat empty as "no content available".

use base64::{engine::general_purpose::STANDARD, Engine};

use super::envelope::MessagePart;

const MIME_TEXT_PLAIN: &str = "text/plain";
const MIME_TEXT_HTML: &str = "text/html";

/// Decode a base64url-encoded body segment to text. Returns an empty string
/// for empty input and on any decode failure.
pub fn decode_body(data: &str) -> String {
    if data.is_empty() {
        return String::new();
    }

    let mut normalized = data.replace('-', "+").replace('_', "/");
    let trailing = normalized.len() % 4;
    if trailing != 0 {
        normalized.push_str(&"=".repeat(4 - trailing));
    }

    let bytes = match STANDARD.decode(&normalized) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Error decoding message body: {}", e);
            return String::new();
        }
    };

    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Decoded message body is not valid UTF-8: {}", e);
            String::new()
        }
    }
}

/// Walk a message's part tree and pull out the best available plain-text and
/// HTML bodies.
///
/// Depth-first, left-to-right; the first matching leaf at a level wins, and
/// descendant results only fill values still unset at the current level. A
/// single-part message is one leaf judged by its top-level mime type.
pub fn extract_content(payload: &MessagePart) -> (String, String) {
    let mut plain = String::new();
    let mut html = String::new();

    if !payload.parts.is_empty() {
        for part in &payload.parts {
            match part.mime_type.as_deref() {
                Some(MIME_TEXT_PLAIN) => {
                    if plain.is_empty() {
                        plain = decode_body(part.data());
                    }
                }
                Some(MIME_TEXT_HTML) => {
                    if html.is_empty() {
                        html = decode_body(part.data());
                    }
                }
                _ if !part.parts.is_empty() => {
                    let (nested_plain, nested_html) = extract_content(part);
                    if plain.is_empty() && !nested_plain.is_empty() {
                        plain = nested_plain;
                    }
                    if html.is_empty() && !nested_html.is_empty() {
                        html = nested_html;
                    }
                }
                _ => {}
            }
        }
    } else {
        match payload.mime_type.as_deref() {
            Some(MIME_TEXT_PLAIN) => plain = decode_body(payload.data()),
            Some(MIME_TEXT_HTML) => html = decode_body(payload.data()),
            _ => {}
        }
    }

    (plain, html)
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;
    use crate::email::envelope::PartBody;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    fn leaf(mime: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            body: Some(PartBody {
                data: Some(encode(text)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn multipart(mime: &str, parts: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            parts,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_empty_input() {
        assert_eq!(decode_body(""), "");
    }

    #[test]
    fn test_decode_invalid_input() {
        assert_eq!(decode_body("!!!not base64!!!"), "");
    }

    #[test]
    fn test_decode_url_safe_without_padding() {
        // "hello?>" exercises the -/_ alphabet and missing padding
        let encoded = URL_SAFE_NO_PAD.encode("hello?>".as_bytes());
        assert_eq!(decode_body(&encoded), "hello?>");
        assert_eq!(decode_body(&encode("hello")), "hello");
    }

    #[test]
    fn test_decode_non_utf8_payload() {
        let encoded = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        assert_eq!(decode_body(&encoded), "");
    }

    #[test]
    fn test_single_part_plain() {
        let payload = leaf("text/plain", "just text");
        let (plain, html) = extract_content(&payload);
        assert_eq!(plain, "just text");
        assert_eq!(html, "");
    }

    #[test]
    fn test_single_part_html() {
        let payload = leaf("text/html", "<p>hi</p>");
        let (plain, html) = extract_content(&payload);
        assert_eq!(plain, "");
        assert_eq!(html, "<p>hi</p>");
    }

    #[test]
    fn test_alternative_parts_both_returned() {
        let payload = multipart(
            "multipart/alternative",
            vec![leaf("text/plain", "plain body"), leaf("text/html", "<b>html body</b>")],
        );
        let (plain, html) = extract_content(&payload);
        assert_eq!(plain, "plain body");
        assert_eq!(html, "<b>html body</b>");
    }

    #[test]
    fn test_first_plain_leaf_wins() {
        let payload = multipart(
            "multipart/mixed",
            vec![leaf("text/plain", "first"), leaf("text/plain", "second")],
        );
        let (plain, _) = extract_content(&payload);
        assert_eq!(plain, "first");
    }

    #[test]
    fn test_nested_plain_fills_gap() {
        // Plain text only exists two levels down; it must still surface
        let payload = multipart(
            "multipart/mixed",
            vec![multipart(
                "multipart/alternative",
                vec![
                    multipart("multipart/related", vec![leaf("text/plain", "deep text")]),
                    leaf("text/html", "<p>shallow html</p>"),
                ],
            )],
        );
        let (plain, html) = extract_content(&payload);
        assert_eq!(plain, "deep text");
        assert_eq!(html, "<p>shallow html</p>");
    }

    #[test]
    fn test_shallow_leaf_beats_descendant() {
        let payload = multipart(
            "multipart/mixed",
            vec![
                leaf("text/plain", "shallow"),
                multipart("multipart/alternative", vec![leaf("text/plain", "deep")]),
            ],
        );
        let (plain, _) = extract_content(&payload);
        assert_eq!(plain, "shallow");
    }

    #[test]
    fn test_no_text_parts_yields_empty() {
        let attachment = MessagePart {
            mime_type: Some("application/pdf".to_string()),
            filename: Some("report.pdf".to_string()),
            ..Default::default()
        };
        let payload = multipart("multipart/mixed", vec![attachment]);
        let (plain, html) = extract_content(&payload);
        assert_eq!(plain, "");
        assert_eq!(html, "");
    }

    #[test]
    fn test_undecodable_leaf_lets_later_leaf_fill() {
        let bad = MessagePart {
            mime_type: Some("text/plain".to_string()),
            body: Some(PartBody {
                data: Some("%%%".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let payload = multipart("multipart/mixed", vec![bad, leaf("text/plain", "fallback")]);
        let (plain, _) = extract_content(&payload);
        assert_eq!(plain, "fallback");
    }
}
