//! RADIUS integrity primitives: Response-Authenticator (RFC 2865 section 3),
//! Message-Authenticator (RFC 2869 section 5.14) and User-Password hiding
//! (RFC 2865 section 5.2).
//!
//! Everything here works on raw packet bytes and does no I/O.

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};

use crate::error::{Error, Result};
use crate::radius_attributes::MESSAGE_AUTHENTICATOR_LEN;

type HmacMd5 = Hmac<Md5>;

pub const AUTHENTICATOR_LEN: usize = 16;
pub(crate) const AUTHENTICATOR_OFFSET: usize = 4;

const PASSWORD_BLOCK_LEN: usize = 16;
const HEADER_LEN: usize = AUTHENTICATOR_OFFSET + AUTHENTICATOR_LEN;

fn check_header(packet: &[u8]) -> Result<()> {
    if packet.len() < HEADER_LEN {
        return Err(Error::truncated("RADIUS header", HEADER_LEN, packet.len()));
    }
    Ok(())
}

/// MD5(code ‖ id ‖ length ‖ request authenticator ‖ attributes ‖ secret).
/// `packet` is a complete packet; its own authenticator field is ignored.
pub fn response_authenticator(
    packet: &[u8],
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
    secret: &[u8],
) -> Result<[u8; AUTHENTICATOR_LEN]> {
    check_header(packet)?;
    let mut hasher = Md5::new();
    hasher.update(&packet[..AUTHENTICATOR_OFFSET]);
    hasher.update(request_authenticator);
    hasher.update(&packet[HEADER_LEN..]);
    hasher.update(secret);
    Ok(to_array(&hasher.finalize()))
}

/// HMAC-MD5 over `packet`, which the caller has already prepared: the
/// Message-Authenticator value zeroed and, for responses, the request
/// authenticator in the header.
pub fn message_authenticator(packet: &[u8], secret: &[u8]) -> [u8; MESSAGE_AUTHENTICATOR_LEN] {
    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(packet);
    to_array(&mac.finalize().into_bytes())
}

fn to_array(digest: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(digest);
    out
}

/// Copy of `packet` ready for Message-Authenticator hashing.
fn message_authenticator_input(
    packet: &[u8],
    value_offset: usize,
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
) -> Vec<u8> {
    let mut input = packet.to_vec();
    input[AUTHENTICATOR_OFFSET..AUTHENTICATOR_OFFSET + AUTHENTICATOR_LEN].copy_from_slice(request_authenticator);
    input[value_offset..value_offset + MESSAGE_AUTHENTICATOR_LEN].fill(0);
    input
}

pub fn validate_response_authenticator(
    packet: &[u8],
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
    secret: &[u8],
) -> Result<()> {
    let expected = response_authenticator(packet, request_authenticator, secret)?;
    if packet[AUTHENTICATOR_OFFSET..HEADER_LEN] != expected {
        return Err(Error::InvalidResponseAuthenticator(packet[1]));
    }
    Ok(())
}

/// `value_offset` is the byte offset of the 16-byte attribute value inside
/// `packet`.
pub fn validate_message_authenticator(
    packet: &[u8],
    value_offset: usize,
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
    secret: &[u8],
) -> Result<()> {
    check_header(packet)?;
    if value_offset < HEADER_LEN || value_offset + MESSAGE_AUTHENTICATOR_LEN > packet.len() {
        return Err(Error::InvalidMessageAuthenticator(packet[1]));
    }
    let received = &packet[value_offset..value_offset + MESSAGE_AUTHENTICATOR_LEN];
    let input = message_authenticator_input(packet, value_offset, request_authenticator);

    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&input);
    mac.verify_slice(received)
        .map_err(|_| Error::InvalidMessageAuthenticator(packet[1]))
}

/// Writes the Message-Authenticator into `packet` in place.
pub(crate) fn sign_message_authenticator(
    packet: &mut [u8],
    value_offset: usize,
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
    secret: &[u8],
) {
    let input = message_authenticator_input(packet, value_offset, request_authenticator);
    let signature = message_authenticator(&input, secret);
    packet[value_offset..value_offset + MESSAGE_AUTHENTICATOR_LEN].copy_from_slice(&signature);
}

/// Hides a User-Password. The cleartext is NUL-padded to a multiple of 16
/// and each block is XORed with MD5(secret ‖ previous ciphertext block),
/// the first block chaining from the request authenticator.
pub fn encrypt_user_password(
    secret: &[u8],
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
    password: &[u8],
) -> Vec<u8> {
    let blocks = password.len().div_ceil(PASSWORD_BLOCK_LEN).max(1);
    let mut padded = password.to_vec();
    padded.resize(blocks * PASSWORD_BLOCK_LEN, 0);

    let mut ciphertext = Vec::with_capacity(padded.len());
    let mut previous: Vec<u8> = request_authenticator.to_vec();
    for block in padded.chunks(PASSWORD_BLOCK_LEN) {
        let key = Md5::new().chain_update(secret).chain_update(&previous).finalize();
        let cipher_block: Vec<u8> = block.iter().zip(key.iter()).map(|(p, k)| p ^ k).collect();
        ciphertext.extend_from_slice(&cipher_block);
        previous = cipher_block;
    }
    ciphertext
}

/// Inverse of [`encrypt_user_password`]; trailing NUL padding is removed.
pub fn decrypt_user_password(
    secret: &[u8],
    request_authenticator: &[u8; AUTHENTICATOR_LEN],
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut cleartext = Vec::with_capacity(ciphertext.len());
    let mut previous: &[u8] = request_authenticator;
    for block in ciphertext.chunks(PASSWORD_BLOCK_LEN) {
        let key = Md5::new().chain_update(secret).chain_update(previous).finalize();
        cleartext.extend(block.iter().zip(key.iter()).map(|(c, k)| c ^ k));
        previous = block;
    }
    while cleartext.last() == Some(&0) {
        cleartext.pop();
    }
    cleartext
}
