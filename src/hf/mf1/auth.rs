//! MF1 authentication handshake: nt generation, rar/at derived
//! via `prng_successor`, encrypted reply construction, auth-log population.

use crate::auth_log::{AuthLog, AuthLogEntry};
use crate::crypto1::Crypto1;

pub struct AuthChallenge {
    pub nt: u32,
    pub cipher: Crypto1,
}

/// Issues a fresh nonce and arms the cipher for the handshake that follows.
/// `nt` would normally come from the chip's own PRNG register; here it's
/// supplied by the caller (the reader-facing emulator loop seeds it from
/// the last free-running tick, the same role the RC522's internal timer
/// plays on the PCD side).
pub fn begin(key: [u8; 6], uid: &[u8; 4], nt_seed: u32) -> AuthChallenge {
    let mut cipher = Crypto1::new();
    cipher.init(key);
    let uid_word = u32::from_be_bytes(*uid);
    // The first clock folds in UID ^ nt before any reply bytes are produced,
    // matching the handshake structure the PCD side also assumes.
    cipher.word(uid_word ^ nt_seed, false);
    AuthChallenge {
        nt: nt_seed,
        cipher,
    }
}

pub struct AuthOutcome {
    pub ok: bool,
    pub cipher: Crypto1,
}

/// Verifies the reader's `{nr, ar}` pair against the expected
/// `ar = prng_successor(nt, 96)` and, on success, returns the cipher primed
/// for the authenticated session that follows.
pub fn verify(
    challenge: AuthChallenge,
    block: u8,
    is_key_b: bool,
    uid: &[u8; 4],
    nr_enc: u32,
    ar_enc: u32,
) -> AuthOutcome {
    let AuthChallenge { nt, mut cipher } = challenge;

    let nr = cipher.word(nr_enc, true);
    let expected_ar = Crypto1::prng_successor(nt, 64);
    let ar = cipher.word(ar_enc, true);

    let ok = ar == expected_ar;
    let _ = (block, is_key_b, uid, nr);
    AuthOutcome { ok, cipher }
}

pub fn log_attempt(
    log: &mut AuthLog,
    block: u8,
    is_key_b: bool,
    uid: [u8; 4],
    nt: u32,
    nr: u32,
    ar: u32,
    key: Option<[u8; 6]>,
) {
    log.push(AuthLogEntry {
        block,
        is_key_b,
        uid,
        nt,
        nr,
        ar,
        key_known: key,
    });
}
