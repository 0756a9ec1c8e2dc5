//! Integration tests for response classification and the wire codec.

use crawlkit_core::{Headers, NormalizedResponse, codec};

fn response(status: u16, headers: &[(&str, &str)]) -> NormalizedResponse {
    let mut response = NormalizedResponse::new("https://example.org/page").with_status(status);
    response.headers = headers.iter().copied().collect::<Headers>();
    response
}

#[test]
fn test_missing_content_length_is_always_100() {
    let header_sets: [&[(&str, &str)]; 4] = [
        &[],
        &[("Content-Type", "text/html")],
        &[("Server", "nginx"), ("X-Length", "5")],
        &[("content-encoding", "gzip")],
    ];
    for headers in header_sets {
        for status in [0, 200, 404] {
            assert_eq!(response(status, headers).get_content_length(), 100);
        }
    }
}

#[test]
fn test_validity_matches_status_classes() {
    for status in 200..300 {
        assert!(response(status, &[]).is_valid());
    }
    assert!(response(403, &[]).is_valid());
    for status in [0, 404, 500] {
        assert!(!response(status, &[]).is_valid());
    }
}

#[test]
fn test_codec_roundtrip_with_headers_and_body() {
    let bodies: [&[u8]; 3] = [b"plain", b"\x00\x01\x02 binary \xfe\xff", "ünïcødé".as_bytes()];
    for body in bodies {
        let mut original = response(
            200,
            &[("Content-Type", "application/octet-stream"), ("ETag", "\"abc\"")],
        );
        original.body = Some(body.to_vec());
        let decoded = codec::decode_response(&codec::encode_response(&original));
        assert_eq!(decoded, original);
    }
}

#[test]
fn test_missing_content_type_is_unsupported() {
    assert!(!response(200, &[("Content-Length", "10")]).is_content_type_supported());
}
