#![no_main]

use libfuzzer_sys::fuzz_target;
use vouch_types::{DidDocument, Fingerprint, ReviewRecord};

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = ReviewRecord::from_canonical_bytes(data) {
        // Signing and canonical bytes must be computable for any decodable record.
        let _ = record.signing_bytes().expect("signing bytes");
        let canonical = record.canonical_bytes().expect("canonical bytes");
        let _ = vouch_crypto::fingerprint_of(&canonical);
        let _ = record.author();
        let _ = record.subject_did();
    }

    let _ = bincode::deserialize::<DidDocument>(data);
    let _ = Fingerprint::from_multihash(data);
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = text.parse::<Fingerprint>();
    }
});
