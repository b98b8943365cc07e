//! Operation id generation

use chrono::{DateTime, Utc};
use rand::Rng;
use shiftsync_domain::constants::OPERATION_ID_SUFFIX_LEN;
use shiftsync_domain::OperationType;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `<type>_<epoch millis>_<base36 suffix>`, e.g.
/// `form_submission_1718000000000_k3j9x0a2b`.
pub fn generate_operation_id(op_type: &OperationType, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..OPERATION_ID_SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
        .collect();
    format!("{}_{}_{}", op_type.as_str(), now.timestamp_millis(), suffix)
}
