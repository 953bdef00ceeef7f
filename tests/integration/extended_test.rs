use bytes::Bytes;
use ldapext::extended::{
    decode_request, DecodedExtendedRequest, GetConnectionIdRequest, StartTlsRequest, OID_GET_CONNECTION_ID,
    OID_START_TLS,
};
use ldapext::ldap::message::{InboundResponse, LDAP_EXTENDED_RESPONSE};
use ldapext::ldap::Response;
use ldapext::{Connection, DecodeErrorKind, ExtendedRequest, ResultCode};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

fn connection() -> (Connection, mpsc::UnboundedReceiver<Bytes>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(tx, Handle::current()), rx)
}

#[tokio::test]
async fn test_get_connection_id_round_trip() {
    let (conn, mut outbound) = connection();
    let future = conn.submit(GetConnectionIdRequest::new(), None);

    let pdu = outbound.recv().await.unwrap();
    let name = OID_GET_CONNECTION_ID.as_bytes();
    assert!(pdu.windows(name.len()).any(|w| w == name));

    let response = InboundResponse::new(future.message_id(), LDAP_EXTENDED_RESPONSE, ResultCode::Success)
        .with_response(Some(OID_GET_CONNECTION_ID), Some(Bytes::from_static(&[0x02, 0x02, 0x04, 0xD2])));
    conn.handle_inbound(&response.encode());

    let result = future.await.unwrap();
    assert_eq!(result.connection_id(), Some(1234));
}

#[tokio::test]
async fn test_get_connection_id_without_value_is_decoding_error() {
    let (conn, _outbound) = connection();
    let future = conn.submit(GetConnectionIdRequest::new(), None);
    let response = InboundResponse::new(future.message_id(), LDAP_EXTENDED_RESPONSE, ResultCode::Success)
        .with_response(Some(OID_GET_CONNECTION_ID), None);
    conn.handle_inbound(&response.encode());

    let err = future.await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::ClientSideDecodingError);
    assert_eq!(err.result().connection_id(), None);
}

#[tokio::test]
async fn test_get_connection_id_bare_success_is_decoding_error() {
    let (conn, _outbound) = connection();
    let future = conn.submit(GetConnectionIdRequest::new(), None);
    let response = InboundResponse::new(future.message_id(), LDAP_EXTENDED_RESPONSE, ResultCode::Success);
    conn.handle_inbound(&response.encode());

    let err = future.await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::ClientSideDecodingError);
    assert!(err.result().result.cause.is_some());
}

#[tokio::test]
async fn test_start_tls_refused() {
    let (conn, _outbound) = connection();
    let future = conn.submit(StartTlsRequest::new(), None);
    let response = InboundResponse::new(future.message_id(), LDAP_EXTENDED_RESPONSE, ResultCode::OperationsError)
        .with_diagnostic_message("TLS already established")
        .with_referral("ldap://replica.example.com/");
    conn.handle_inbound(&response.encode());

    let err = future.await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::OperationsError);
    assert_eq!(err.result().result().referrals, vec!["ldap://replica.example.com/".to_string()]);
}

#[test]
fn test_server_side_request_dispatch() {
    match decode_request(OID_START_TLS, Some(b"ignored".as_slice())).unwrap() {
        DecodedExtendedRequest::StartTls(request) => assert_eq!(request.request_value(), None),
        other => panic!("unexpected {:?}", other),
    }
    let generic = decode_request("1.3.6.1.4.1.1466.20036", None).unwrap();
    assert!(matches!(generic, DecodedExtendedRequest::Generic(_)));
}

#[test]
fn test_decode_error_kinds_are_distinct() {
    let err = ldapext::controls::request_controls()
        .decode(ldapext::controls::OID_PASSWORD_POLICY, false, Some(b"x".as_slice()))
        .unwrap_err();
    assert_eq!(err.kind(), DecodeErrorKind::UnexpectedValue);
}

#[tokio::test]
async fn test_connection_id_value_is_symmetric() -> anyhow::Result<()> {
    let (conn, _outbound) = connection();
    let future = conn.submit(GetConnectionIdRequest::new(), None);

    let mut expected = ldapext::extended::GetConnectionIdResult::new(ldapext::LdapResult::success(), None);
    expected.set_connection_id(-17);
    let response = InboundResponse::new(future.message_id(), LDAP_EXTENDED_RESPONSE, ResultCode::Success)
        .with_response(Some(expected.response_name()), expected.response_value());
    conn.handle_inbound(&response.encode());

    let result = future.await?;
    assert_eq!(result.connection_id(), Some(-17));
    assert_eq!(result.response_value(), expected.response_value());
    Ok(())
}
