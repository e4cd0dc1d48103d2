//! Tests for the wire protocol
//!
//! These tests verify:
//! - Request framing and decoding
//! - Response status mapping in both directions
//! - Malformed frames are rejected
//! - Stream helpers over in-memory buffers

use std::io::Cursor;

use keyserver::protocol::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, Request, RequestType, Response, Status,
    HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use keyserver::{
    BlockCryptKeyServerHalf, BlockId, CryptPublicKey, DirId, KeyGen, KeyServerError,
    ServerHalfId, TlfCryptKeyServerHalf, UserId,
};

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_encode_get_block_request() {
    let id = BlockId::new([3; 32]);
    let bytes = encode_request(&Request::GetBlockHalf { id }).unwrap();

    assert_eq!(bytes[0], RequestType::GetBlockHalf as u8);
    assert_eq!(&bytes[1..5], &32u32.to_be_bytes());
    assert_eq!(&bytes[HEADER_SIZE..], &[3; 32]);
}

#[test]
fn test_put_requests_decode() {
    let requests = vec![
        Request::PutBlockHalf {
            id: BlockId::new([1; 32]),
            server_half: BlockCryptKeyServerHalf::new([2; 32]),
        },
        Request::PutTlfHalf {
            id: ServerHalfId::new(
                DirId::new([3; 16]),
                KeyGen(4),
                CryptPublicKey::new([5; 32]),
            ),
            server_half: TlfCryptKeyServerHalf::new([6; 32]),
        },
        Request::DeleteTlfHalf {
            id: ServerHalfId::new(
                DirId::new([7; 16]),
                KeyGen(1),
                CryptPublicKey::new([8; 32]),
            ),
        },
        Request::GetMacPublicKey {
            user: UserId::new([9; 16]),
        },
        Request::Ping,
    ];

    for request in requests {
        let bytes = encode_request(&request).unwrap();
        assert_eq!(bytes[0], request.request_type() as u8);
        assert_eq!(decode_request(&bytes).unwrap(), request);
    }
}

#[test]
fn test_ping_request_is_header_only() {
    let bytes = encode_request(&Request::Ping).unwrap();
    assert_eq!(bytes.as_ref(), &[0x09, 0, 0, 0, 0]);
}

#[test]
fn test_decode_unknown_request_type() {
    let err = decode_request(&[0x7F, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, KeyServerError::Protocol(_)));
}

#[test]
fn test_decode_ping_with_payload() {
    let err = decode_request(&[0x09, 0, 0, 0, 1, 0xFF]).unwrap_err();
    assert!(matches!(err, KeyServerError::Protocol(_)));
}

#[test]
fn test_decode_wrong_width_payload() {
    // GET_BLOCK with a 31-byte id
    let mut bytes = vec![0x01, 0, 0, 0, 31];
    bytes.extend_from_slice(&[0; 31]);
    assert!(matches!(
        decode_request(&bytes).unwrap_err(),
        KeyServerError::Encoding(_)
    ));

    // GET_BLOCK with a 33-byte id
    let mut bytes = vec![0x01, 0, 0, 0, 33];
    bytes.extend_from_slice(&[0; 33]);
    assert!(matches!(
        decode_request(&bytes).unwrap_err(),
        KeyServerError::Encoding(_)
    ));
}

#[test]
fn test_decode_truncated_frames() {
    assert!(matches!(
        decode_request(&[0x01, 0, 0]).unwrap_err(),
        KeyServerError::Protocol(_)
    ));
    assert!(matches!(
        decode_request(&[0x01, 0, 0, 0, 32, 1, 2]).unwrap_err(),
        KeyServerError::Protocol(_)
    ));
}

#[test]
fn test_decode_oversized_payload() {
    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
    assert!(matches!(
        decode_request(&bytes).unwrap_err(),
        KeyServerError::Protocol(_)
    ));
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_status_bytes() {
    assert_eq!(encode_response(&Response::ok(None)).as_ref(), &[0, 0, 0, 0, 0]);
    assert_eq!(
        encode_response(&Response::not_found()).as_ref(),
        &[1, 0, 0, 0, 0]
    );

    let mismatch = encode_response(&Response::length_mismatch(32, 3));
    assert_eq!(mismatch[0], 2);
    assert_eq!(&mismatch[HEADER_SIZE..], &[0, 0, 0, 32, 0, 0, 0, 3]);
}

#[test]
fn test_response_decode() {
    let response = Response::ok(Some(vec![1, 2, 3]));
    let decoded = decode_response(&encode_response(&response)).unwrap();
    assert_eq!(decoded, response);

    let decoded = decode_response(&encode_response(&Response::error("boom"))).unwrap();
    assert_eq!(decoded.status, Status::Error);
    assert_eq!(decoded.payload, Some(b"boom".to_vec()));
}

#[test]
fn test_decode_unknown_status() {
    assert!(matches!(
        decode_response(&[0x44, 0, 0, 0, 0]).unwrap_err(),
        KeyServerError::Protocol(_)
    ));
}

#[test]
fn test_response_from_result() {
    assert_eq!(Response::from_result(Ok(None)).status, Status::Ok);
    assert_eq!(
        Response::from_result(Err(KeyServerError::NotFound)).status,
        Status::NotFound
    );
    assert_eq!(
        Response::from_result(Err(KeyServerError::length_mismatch(32, 3))),
        Response::length_mismatch(32, 3)
    );
    assert_eq!(
        Response::from_result(Err(KeyServerError::LogCorruption("bad".into()))).status,
        Status::Error
    );
}

#[test]
fn test_response_into_result() {
    assert_eq!(
        Response::ok(Some(vec![7])).into_result().unwrap(),
        Some(vec![7])
    );
    assert!(Response::not_found()
        .into_result()
        .unwrap_err()
        .is_not_found());
    assert!(matches!(
        Response::length_mismatch(32, 31).into_result().unwrap_err(),
        KeyServerError::LengthMismatch {
            expected: 32,
            actual: 31
        }
    ));
    match Response::error("disk on fire").into_result().unwrap_err() {
        KeyServerError::Remote(message) => assert_eq!(message, "disk on fire"),
        other => panic!("Expected Remote, got {:?}", other),
    }
}

#[test]
fn test_malformed_length_mismatch_payload() {
    let response = Response {
        status: Status::LengthMismatch,
        payload: Some(vec![0, 0, 0, 32]),
    };
    assert!(matches!(
        response.into_result().unwrap_err(),
        KeyServerError::Protocol(_)
    ));
}

// =============================================================================
// Stream Tests
// =============================================================================

#[test]
fn test_stream_requests_back_to_back() {
    let first = Request::DeleteBlockHalf {
        id: BlockId::new([1; 32]),
    };
    let second = Request::Ping;

    let mut buffer = Vec::new();
    write_request(&mut buffer, &first).unwrap();
    write_request(&mut buffer, &second).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_request(&mut cursor).unwrap(), first);
    assert_eq!(read_request(&mut cursor).unwrap(), second);

    // Clean EOF surfaces as a network error the server treats as disconnect
    match read_request(&mut cursor).unwrap_err() {
        KeyServerError::Network(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("Expected Network, got {:?}", other),
    }
}

#[test]
fn test_stream_response() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::length_mismatch(32, 0)).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(
        read_response(&mut cursor).unwrap(),
        Response::length_mismatch(32, 0)
    );
}
