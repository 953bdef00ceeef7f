use bytes::Bytes;
use ldapext::controls::{
    request_controls, response_controls, GenericControl, PasswordPolicyError, PasswordPolicyRequestControl,
    PasswordPolicyResponseControl, PasswordPolicyWarning, ProxiedAuthV2Control, ReadEntryPhase,
    ReadEntryRequestControl, ReadEntryResponseControl, OID_PASSWORD_POLICY, OID_POST_READ, OID_PROXIED_AUTH_V2,
};
use ldapext::ldap::message::{InboundResponse, LDAP_BIND_RESPONSE, LDAP_EXTENDED_RESPONSE};
use ldapext::ldap::{Attribute, BindRequest, RawControl, Response, SearchResultEntry};
use ldapext::{Connection, Control, DecodeErrorKind, ResultCode};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

fn connection() -> (Connection, mpsc::UnboundedReceiver<Bytes>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(tx, Handle::current()), rx)
}

#[test]
fn test_request_registry_decodes_known_controls() {
    let controls: Vec<Arc<dyn Control>> = vec![
        Arc::new(ProxiedAuthV2Control::from_dn("uid=alice,dc=example,dc=com")),
        Arc::new(PasswordPolicyRequestControl::new(false)),
        Arc::new(ReadEntryRequestControl::post_read(false).with_attributes(["cn", "modifyTimestamp"])),
    ];
    let raw: Vec<RawControl> = controls.iter().map(|c| RawControl::from_control(c.as_ref())).collect();

    let decoded = request_controls().decode_all(&raw).unwrap();
    assert_eq!(decoded.len(), 3);

    let proxied = decoded[0].downcast_ref::<ProxiedAuthV2Control>().unwrap();
    assert_eq!(proxied.authorization_id(), "dn:uid=alice,dc=example,dc=com");

    assert!(decoded[1].downcast_ref::<PasswordPolicyRequestControl>().is_some());

    let read = decoded[2].downcast_ref::<ReadEntryRequestControl>().unwrap();
    assert_eq!(read.phase(), ReadEntryPhase::Post);
    assert_eq!(read.attributes(), ["cn", "modifyTimestamp"]);
}

#[test]
fn test_unknown_oid_is_kept_generic() {
    let raw = RawControl::new("1.2.840.113556.1.4.319", true, Some(Bytes::from_static(&[0x30, 0x00])));
    let decoded = response_controls().decode_raw(&raw).unwrap();
    assert_eq!(decoded.oid(), "1.2.840.113556.1.4.319");
    assert!(decoded.is_critical());
    assert!(decoded.downcast_ref::<GenericControl>().is_some());
}

#[test]
fn test_non_critical_proxied_auth_is_rejected() {
    let err = request_controls()
        .decode(OID_PROXIED_AUTH_V2, false, Some(b"u:alice".as_slice()))
        .unwrap_err();
    assert_eq!(err.kind(), DecodeErrorKind::CriticalityViolation);
}

#[tokio::test]
async fn test_bind_result_carries_password_policy_control() {
    let (conn, _outbound) = connection();
    let future = conn.submit(
        BindRequest::simple("uid=alice,dc=example,dc=com", "secret").with_control(PasswordPolicyRequestControl::new(false)),
        None,
    );

    let policy = PasswordPolicyResponseControl::new(false)
        .with_warning(PasswordPolicyWarning::GraceLoginsRemaining(2))
        .with_error(PasswordPolicyError::ChangeAfterReset);
    let response = InboundResponse::new(future.message_id(), LDAP_BIND_RESPONSE, ResultCode::Success)
        .with_control(RawControl::from_control(&policy));
    conn.handle_inbound(&response.encode());

    let result = future.await.unwrap();
    let control = result.control(OID_PASSWORD_POLICY).unwrap();
    let decoded = control.downcast_ref::<PasswordPolicyResponseControl>().unwrap();
    assert_eq!(decoded.warning(), Some(PasswordPolicyWarning::GraceLoginsRemaining(2)));
    assert_eq!(decoded.error(), Some(PasswordPolicyError::ChangeAfterReset));
    assert!(conn.authorization().is_bound());
}

#[tokio::test]
async fn test_failed_bind_keeps_policy_error() {
    let (conn, _outbound) = connection();
    let future = conn.submit(BindRequest::simple("uid=alice,dc=example,dc=com", "old"), None);

    let policy = PasswordPolicyResponseControl::new(false).with_error(PasswordPolicyError::PasswordExpired);
    let response = InboundResponse::new(future.message_id(), LDAP_BIND_RESPONSE, ResultCode::InvalidCredentials)
        .with_control(RawControl::from_control(&policy));
    conn.handle_inbound(&response.encode());

    let err = future.await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::InvalidCredentials);
    let control = err.result().control(OID_PASSWORD_POLICY).unwrap();
    assert_eq!(
        control.downcast_ref::<PasswordPolicyResponseControl>().unwrap().error(),
        Some(PasswordPolicyError::PasswordExpired)
    );
    assert!(!conn.authorization().is_bound());
}

#[tokio::test]
async fn test_post_read_entry_in_response() {
    let (conn, _outbound) = connection();
    let future = conn.submit(
        ldapext::extended::GenericExtendedRequest::new("1.3.6.1.4.1.4203.1.11.1", None)
            .with_control(ReadEntryRequestControl::post_read(false).with_attributes(["cn"])),
        None,
    );

    let entry = SearchResultEntry::new("uid=alice,dc=example,dc=com")
        .with_attribute(Attribute::new("cn").with_value("Alice"));
    let post_read = ReadEntryResponseControl::new(ReadEntryPhase::Post, false, entry.clone());
    let response = InboundResponse::new(future.message_id(), LDAP_EXTENDED_RESPONSE, ResultCode::Success)
        .with_control(RawControl::from_control(&post_read));
    conn.handle_inbound(&response.encode());

    let result = future.await.unwrap();
    let control = result.control(OID_POST_READ).unwrap();
    assert_eq!(control.downcast_ref::<ReadEntryResponseControl>().unwrap().entry(), &entry);
}

#[tokio::test]
async fn test_malformed_response_control_fails_request() {
    let (conn, _outbound) = connection();
    let future = conn.submit(BindRequest::anonymous(), None);
    let response = InboundResponse::new(future.message_id(), LDAP_BIND_RESPONSE, ResultCode::Success)
        .with_control(RawControl::new(OID_PASSWORD_POLICY, false, Some(Bytes::from_static(&[0x30, 0x03, 0x81, 0x01, 0x63]))));
    conn.handle_inbound(&response.encode());

    let err = future.await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::ClientSideDecodingError);
    assert!(!conn.authorization().is_bound());
}
