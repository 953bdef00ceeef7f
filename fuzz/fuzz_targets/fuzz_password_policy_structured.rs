#![no_main]

use arbitrary::Arbitrary;
use bytes::{BufMut, BytesMut};
use libfuzzer_sys::fuzz_target;
use ldapext::controls::{response_controls, PasswordPolicyResponseControl, OID_PASSWORD_POLICY};

// Semi-valid password policy response values.
#[derive(Arbitrary, Debug)]
struct FuzzPolicyValue {
    sequence_tag: u8,
    warning: Option<FuzzWarning>,
    error: Option<FuzzError>,
    trailing: Vec<u8>,
}

#[derive(Arbitrary, Debug)]
struct FuzzWarning {
    outer_tag: u8,
    inner_tag: u8,
    value: i64,
}

#[derive(Arbitrary, Debug)]
struct FuzzError {
    tag: u8,
    code: u8,
}

fn put_integer(buf: &mut BytesMut, tag: u8, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    buf.put_u8(tag);
    buf.put_u8((8 - start) as u8);
    buf.put_slice(&bytes[start..]);
}

impl FuzzPolicyValue {
    fn to_bytes(&self) -> Vec<u8> {
        let mut body = BytesMut::new();
        if let Some(warning) = &self.warning {
            let mut inner = BytesMut::new();
            put_integer(&mut inner, warning.inner_tag, warning.value);
            body.put_u8(warning.outer_tag);
            body.put_u8(inner.len() as u8);
            body.put_slice(&inner);
        }
        if let Some(error) = &self.error {
            body.put_u8(error.tag);
            body.put_u8(1);
            body.put_u8(error.code);
        }
        body.put_slice(&self.trailing[..self.trailing.len().min(64)]);

        let mut out = BytesMut::new();
        out.put_u8(self.sequence_tag);
        out.put_u8(body.len().min(0x7F) as u8);
        out.put_slice(&body);
        out.to_vec()
    }
}

fuzz_target!(|input: FuzzPolicyValue| {
    let value = input.to_bytes();
    if let Ok(control) = response_controls().decode(OID_PASSWORD_POLICY, false, Some(&value[..])) {
        let decoded = control
            .downcast_ref::<PasswordPolicyResponseControl>()
            .expect("registered decoder returns its own control type");
        // A decoded control re-encodes to something that decodes the same.
        let reencoded = ldapext::Control::value(decoded).unwrap_or_default();
        let again = response_controls()
            .decode(OID_PASSWORD_POLICY, false, Some(&reencoded[..]))
            .expect("re-encoded value decodes");
        let again = again.downcast_ref::<PasswordPolicyResponseControl>().unwrap();
        assert_eq!(again.warning(), decoded.warning());
        assert_eq!(again.error(), decoded.error());
    }
});
