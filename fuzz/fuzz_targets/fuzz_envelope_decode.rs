#![no_main]

use libfuzzer_sys::fuzz_target;

// Decoding arbitrary bytes must never panic, and anything that decodes must
// re-encode to exactly the same bytes.
fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = vouch_network::decode(data) {
        let encoded = vouch_network::encode(&envelope).expect("decoded envelope re-encodes");
        assert_eq!(encoded, data);
    }
});
