#![no_main]

use libfuzzer_sys::fuzz_target;
use ldapext::controls::{
    request_controls, response_controls, OID_PASSWORD_POLICY, OID_POST_READ, OID_PRE_READ, OID_PROXIED_AUTH_V2,
};

const OIDS: [&str; 4] = [OID_PROXIED_AUTH_V2, OID_PASSWORD_POLICY, OID_PRE_READ, OID_POST_READ];

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks the OID and criticality, the rest is the value.
    let oid = OIDS[(data[0] & 0x03) as usize];
    let critical = data[0] & 0x04 != 0;
    let value = &data[1..];

    // Decoders must reject bad input with an error, never panic.
    let _ = request_controls().decode(oid, critical, Some(value));
    let _ = response_controls().decode(oid, critical, Some(value));
});
