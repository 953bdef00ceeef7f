// Wire compatibility with the ldap3 client crate.

use ldap3::controls::{ProxyAuth, RawControl as Ldap3Control};
use ldapext::controls::{request_controls, ProxiedAuthV2Control, OID_PROXIED_AUTH_V2};
use ldapext::Control;

#[test]
fn test_decode_ldap3_proxy_auth() {
    let raw: Ldap3Control = ProxyAuth {
        authzid: "dn:uid=alice,ou=people,dc=example,dc=com".to_string(),
    }
    .into();
    assert_eq!(raw.ctype, OID_PROXIED_AUTH_V2);

    let decoded = request_controls()
        .decode(&raw.ctype, raw.crit, raw.val.as_deref())
        .unwrap();
    let control = decoded.downcast_ref::<ProxiedAuthV2Control>().unwrap();
    assert_eq!(control.authorization_id(), "dn:uid=alice,ou=people,dc=example,dc=com");
}

#[test]
fn test_encoding_matches_ldap3() {
    let ours = ProxiedAuthV2Control::new("u:alice");
    let theirs: Ldap3Control = ProxyAuth {
        authzid: "u:alice".to_string(),
    }
    .into();
    assert_eq!(ours.is_critical(), theirs.crit);
    assert_eq!(ours.value().as_deref(), theirs.val.as_deref());
}

#[test]
fn test_anonymous_proxy_auth() {
    let raw: Ldap3Control = ProxyAuth { authzid: String::new() }.into();
    let decoded = request_controls()
        .decode(&raw.ctype, raw.crit, raw.val.as_deref())
        .unwrap();
    assert_eq!(decoded.downcast_ref::<ProxiedAuthV2Control>().unwrap().authorization_id(), "");
}
