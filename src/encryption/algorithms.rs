//! Standard security handler algorithms, revision 6 (AES-256).
//!
//! ISO 32000-2:2020 §7.6.4.3.3 - §7.6.4.4.12:
//! - Algorithm 2.B: iterated SHA-256/384/512 password hash
//! - Algorithm 8/9: computing U/UE and O/OE
//! - Algorithm 10: computing Perms
//! - Algorithm 11/12: authenticating user and owner passwords
//! - Algorithm 13: validating Perms against P

use super::aes;
use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384, Sha512};
use unicode_normalization::UnicodeNormalization;

/// Maximum password length in bytes after normalisation.
pub const MAX_PASSWORD_LEN: usize = 127;

const SALT_LEN: usize = 8;
const HASH_LEN: usize = 32;
/// Length of U and O: hash, validation salt, key salt.
pub const HASH_ENTRY_LEN: usize = HASH_LEN + 2 * SALT_LEN;
/// Length of the file encryption key.
pub const FILE_KEY_LEN: usize = 32;

const ZERO_IV: [u8; 16] = [0; 16];

fn crypto_err(msg: &'static str) -> Error {
    Error::Encryption(msg.to_string())
}

/// Normalise a password (NFKC, the practical core of SASLprep) and
/// truncate it to 127 bytes on a character boundary.
pub fn prepare_password(password: &str) -> Vec<u8> {
    let normalized: String = password.nfkc().collect();
    let mut bytes = normalized.into_bytes();
    if bytes.len() > MAX_PASSWORD_LEN {
        let mut end = MAX_PASSWORD_LEN;
        while end > 0 && (bytes[end] & 0xC0) == 0x80 {
            end -= 1;
        }
        bytes.truncate(end);
    }
    bytes
}

/// Fill a buffer from the operating system RNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Algorithm 2.B: compute a hash of `password`, `salt` and `udata`
/// (`udata` is empty for user entries and the 48-byte U for owner entries).
pub fn hash_r6(password: &[u8], salt: &[u8], udata: &[u8]) -> Result<[u8; HASH_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    hasher.update(udata);
    let mut k: Vec<u8> = hasher.finalize().to_vec();

    let mut round: i32 = 0;
    loop {
        let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + udata.len()));
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }

        let e = aes::aes128_cbc_encrypt_no_padding(&k[..16], &k[16..32], &k1).map_err(crypto_err)?;

        // The first 16 bytes of E as a big-endian integer, modulo 3.
        let selector = e[..16].iter().map(|&b| b as u32).sum::<u32>() % 3;
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        let last = e.last().copied().unwrap_or(0) as i32;
        if round >= 64 && last <= round - 32 {
            break;
        }
    }

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&k[..HASH_LEN]);
    Ok(out)
}

/// Algorithms 8 and 9: the 48-byte hash entry (U or O) and the wrapped
/// file key (UE or OE), using fresh random salts.
///
/// `udata` is empty for the user entries and U for the owner entries.
pub fn compute_entries(password: &[u8], file_key: &[u8], udata: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let salts = random_bytes(2 * SALT_LEN);
    compute_entries_with_salts(password, file_key, udata, &salts[..SALT_LEN], &salts[SALT_LEN..])
}

fn compute_entries_with_salts(
    password: &[u8],
    file_key: &[u8],
    udata: &[u8],
    validation_salt: &[u8],
    key_salt: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut entry = hash_r6(password, validation_salt, udata)?.to_vec();
    entry.extend_from_slice(validation_salt);
    entry.extend_from_slice(key_salt);

    let intermediate = hash_r6(password, key_salt, udata)?;
    let wrapped = aes::aes256_cbc_encrypt_no_padding(&intermediate, &ZERO_IV, file_key).map_err(crypto_err)?;

    Ok((entry, wrapped))
}

/// Algorithms 11 and 12: check `password` against a hash entry and, on
/// success, unwrap the file key.
///
/// Returns `Ok(None)` for a wrong password.
pub fn authenticate(password: &[u8], entry: &[u8], wrapped_key: &[u8], udata: &[u8]) -> Result<Option<Vec<u8>>> {
    if entry.len() < HASH_ENTRY_LEN || wrapped_key.len() != FILE_KEY_LEN {
        return Err(Error::InvalidPdf("Malformed access control entry".to_string()));
    }
    let validation_salt = &entry[HASH_LEN..HASH_LEN + SALT_LEN];
    let key_salt = &entry[HASH_LEN + SALT_LEN..HASH_ENTRY_LEN];

    let hash = hash_r6(password, validation_salt, udata)?;
    if !constant_time_compare(&hash, &entry[..HASH_LEN]) {
        return Ok(None);
    }

    let intermediate = hash_r6(password, key_salt, udata)?;
    let file_key = aes::aes256_cbc_decrypt_no_padding(&intermediate, &ZERO_IV, wrapped_key).map_err(crypto_err)?;
    Ok(Some(file_key))
}

/// Algorithm 10: encrypt the permission bitmask into the 16-byte Perms entry.
pub fn compute_perms(p: i32, encrypt_metadata: bool, file_key: &[u8]) -> Result<[u8; 16]> {
    let mut block = [0u8; 16];
    block[..4].copy_from_slice(&p.to_le_bytes());
    block[4..8].copy_from_slice(&[0xFF; 4]);
    block[8] = if encrypt_metadata { b'T' } else { b'F' };
    block[9..12].copy_from_slice(b"adb");
    block[12..].copy_from_slice(&random_bytes(4));
    aes::aes256_ecb_encrypt_block(file_key, &block).map_err(crypto_err)
}

/// Algorithm 13: decrypt Perms and check it against P.
///
/// A mismatch means the access control entries were tampered with.
pub fn validate_perms(perms: &[u8], p: i32, encrypt_metadata: bool, file_key: &[u8]) -> Result<()> {
    let block = aes::aes256_ecb_decrypt_block(file_key, perms).map_err(crypto_err)?;
    if &block[9..12] != b"adb" {
        return Err(Error::InvalidPdf("Perms entry does not decrypt to a valid block".to_string()));
    }
    if block[..4] != p.to_le_bytes() {
        return Err(Error::InvalidPdf("Perms entry does not match the permission bitmask".to_string()));
    }
    let flag = if encrypt_metadata { b'T' } else { b'F' };
    if block[8] != flag {
        return Err(Error::InvalidPdf("Perms entry does not match EncryptMetadata".to_string()));
    }
    Ok(())
}

/// Constant-time comparison to prevent timing attacks.
///
/// Returns true if the slices are equal.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_hash_r6_known_answer() {
        let h = hash_r6(b"user", b"12345678", b"").unwrap();
        assert_eq!(h.to_vec(), hex("33a74805a1940282ca67d2b4938a4f77db6f69c75e92e9f281f0743ef0111571"));

        let h = hash_r6(b"", &[0u8; 8], b"").unwrap();
        assert_eq!(h.to_vec(), hex("439feba099a63d0d035a1e5fb67ff307329189584956425aff2d3bd3d15edc60"));
    }

    #[test]
    fn test_hash_r6_owner_known_answer() {
        let mut u = hash_r6(b"user", b"12345678", b"").unwrap().to_vec();
        u.extend_from_slice(b"12345678");
        u.extend_from_slice(b"abcdefgh");
        let h = hash_r6(b"owner", b"ABCDEFGH", &u).unwrap();
        assert_eq!(h.to_vec(), hex("5c2829d491b6e0b6afcc36ab070c636793cca7ac070a1d66b6ef469dd529c342"));
    }

    #[test]
    fn test_entries_authenticate() {
        let file_key = random_bytes(FILE_KEY_LEN);
        let (u, ue) = compute_entries(b"secret", &file_key, b"").unwrap();
        assert_eq!(u.len(), HASH_ENTRY_LEN);
        assert_eq!(ue.len(), FILE_KEY_LEN);

        let recovered = authenticate(b"secret", &u, &ue, b"").unwrap();
        assert_eq!(recovered, Some(file_key));
        assert_eq!(authenticate(b"wrong", &u, &ue, b"").unwrap(), None);
    }

    #[test]
    fn test_owner_entries_bound_to_u() {
        let file_key = random_bytes(FILE_KEY_LEN);
        let (u, _) = compute_entries(b"user", &file_key, b"").unwrap();
        let (o, oe) = compute_entries(b"owner", &file_key, &u).unwrap();
        assert_eq!(authenticate(b"owner", &o, &oe, &u).unwrap(), Some(file_key));

        let mut other_u = u.clone();
        other_u[0] ^= 1;
        assert_eq!(authenticate(b"owner", &o, &oe, &other_u).unwrap(), None);
    }

    #[test]
    fn test_fixed_salts_are_deterministic() {
        let key = [9u8; FILE_KEY_LEN];
        let a = compute_entries_with_salts(b"pw", &key, b"", b"saltsalt", b"keykeyke").unwrap();
        let b = compute_entries_with_salts(b"pw", &key, b"", b"saltsalt", b"keykeyke").unwrap();
        assert_eq!(a, b);
        assert_eq!(&a.0[32..40], b"saltsalt");
    }

    #[test]
    fn test_perms_round_trip_and_tamper() {
        let key = random_bytes(FILE_KEY_LEN);
        let p = 0xFFFF_F2C4_u32 as i32;
        let perms = compute_perms(p, true, &key).unwrap();
        validate_perms(&perms, p, true, &key).unwrap();
        assert!(matches!(validate_perms(&perms, p | 0x10, true, &key), Err(Error::InvalidPdf(_))));
        assert!(matches!(validate_perms(&perms, p, false, &key), Err(Error::InvalidPdf(_))));
    }

    #[test]
    fn test_prepare_password_nfkc_and_truncation() {
        // U+FB01 (fi ligature) normalises to "fi"
        assert_eq!(prepare_password("\u{FB01}le"), b"file");
        let long = "é".repeat(100); // 200 bytes
        let prepared = prepare_password(&long);
        assert!(prepared.len() <= MAX_PASSWORD_LEN);
        assert!(std::str::from_utf8(&prepared).is_ok());
        assert_eq!(prepared.len(), 126);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
        assert!(!constant_time_compare(b"abc", b"ab"));
    }

    #[test]
    fn test_malformed_entry() {
        assert!(matches!(authenticate(b"x", &[0u8; 10], &[0u8; 32], b""), Err(Error::InvalidPdf(_))));
    }
}
