//! AES primitives for the AES-256 security handler.
//!
//! - AES-256-CBC with PKCS#7 padding seals document content.
//! - AES-256-CBC without padding wraps the file key (UE/OE).
//! - AES-128-CBC without padding drives the rounds of the revision 6 hash.
//! - AES-256-ECB on a single block protects the Perms entry.

use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};
use cbc::{Decryptor, Encryptor};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

fn check_lengths(key: &[u8], key_len: usize, iv: &[u8]) -> Result<(), &'static str> {
    if key.len() != key_len {
        return Err(if key_len == 16 {
            "AES-128 key must be 16 bytes"
        } else {
            "AES-256 key must be 32 bytes"
        });
    }
    if iv.len() != 16 {
        return Err("IV must be 16 bytes");
    }
    Ok(())
}

/// Encrypt block-aligned data with AES-128-CBC and no padding.
pub fn aes128_cbc_encrypt_no_padding(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    check_lengths(key, 16, iv)?;
    if data.len() % 16 != 0 {
        return Err("Data length must be multiple of 16");
    }

    let mut buffer = data.to_vec();
    let len = buffer.len();
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer, len)
        .map_err(|_| "Encryption failed")?;
    Ok(buffer)
}

/// Encrypt block-aligned data with AES-256-CBC and no padding.
pub fn aes256_cbc_encrypt_no_padding(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    check_lengths(key, 32, iv)?;
    if data.len() % 16 != 0 {
        return Err("Data length must be multiple of 16");
    }

    let mut buffer = data.to_vec();
    let len = buffer.len();
    Aes256CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer, len)
        .map_err(|_| "Encryption failed")?;
    Ok(buffer)
}

/// Decrypt block-aligned data with AES-256-CBC and no padding.
pub fn aes256_cbc_decrypt_no_padding(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    check_lengths(key, 32, iv)?;
    if data.len() % 16 != 0 {
        return Err("Encrypted data length must be multiple of 16");
    }

    let mut buffer = data.to_vec();
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buffer)
        .map_err(|_| "Decryption failed")?;
    Ok(buffer)
}

/// Encrypt data using AES-256 in CBC mode with PKCS#7 padding.
pub fn aes256_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    // Apply PKCS#7 padding manually
    let mut padded = data.to_vec();
    let padding_len = 16 - (data.len() % 16);
    padded.extend(std::iter::repeat(padding_len as u8).take(padding_len));

    aes256_cbc_encrypt_no_padding(key, iv, &padded)
}

/// Decrypt data using AES-256 in CBC mode and remove PKCS#7 padding.
pub fn aes256_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if data.is_empty() {
        return Err("Encrypted data is empty");
    }
    let decrypted = aes256_cbc_decrypt_no_padding(key, iv, data)?;

    let padding_len = decrypted[decrypted.len() - 1] as usize;
    if padding_len == 0 || padding_len > 16 {
        return Err("Invalid PKCS#7 padding");
    }

    // Verify padding
    let data_len = decrypted.len() - padding_len;
    if decrypted[data_len..].iter().any(|&b| b != padding_len as u8) {
        return Err("Invalid PKCS#7 padding");
    }

    Ok(decrypted[..data_len].to_vec())
}

/// Encrypt one 16-byte block with AES-256 in ECB mode.
pub fn aes256_ecb_encrypt_block(key: &[u8], block: &[u8; 16]) -> Result<[u8; 16], &'static str> {
    if key.len() != 32 {
        return Err("AES-256 key must be 32 bytes");
    }
    let cipher = Aes256::new(key.into());
    let mut buf = aes::Block::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    let mut out = [0u8; 16];
    out.copy_from_slice(&buf);
    Ok(out)
}

/// Decrypt one 16-byte block with AES-256 in ECB mode.
pub fn aes256_ecb_decrypt_block(key: &[u8], block: &[u8]) -> Result<[u8; 16], &'static str> {
    if key.len() != 32 {
        return Err("AES-256 key must be 32 bytes");
    }
    if block.len() != 16 {
        return Err("Block must be 16 bytes");
    }
    let cipher = Aes256::new(key.into());
    let mut buf = aes::Block::clone_from_slice(block);
    cipher.decrypt_block(&mut buf);
    let mut out = [0u8; 16];
    out.copy_from_slice(&buf);
    Ok(out)
}
