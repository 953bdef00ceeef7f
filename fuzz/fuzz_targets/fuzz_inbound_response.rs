#![no_main]

use libfuzzer_sys::fuzz_target;
use ldapext::controls::response_controls;
use ldapext::ldap::message::{peek_message_id, InboundResponse};

fuzz_target!(|data: &[u8]| {
    let _ = peek_message_id(data);
    if let Ok(response) = InboundResponse::decode(data) {
        let _ = response_controls().decode_all(&response.controls);
        let reencoded = response.encode();
        let _ = InboundResponse::decode(&reencoded);
    }
});
