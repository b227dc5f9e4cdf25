/*++

Licensed under the Apache-2.0 license.

--*/

//! Signature Verifier (§4.2, §6): integrity and authentication checks over the unsigned
//! portion of a firmware package, covering the trailing 1024-byte signature block appended
//! after the component payload.
//!
//! Integrity compares a freshly streamed SHA-384 digest of `[0, signed_length)` against a
//! digest the caller already trusts (e.g. one published on the activation surface alongside
//! `PackageVersion`, §6) rather than one carried inside the block itself — the wire format
//! carries a public key and a signature, not a bare digest. Authentication recomputes the same
//! streaming digest and checks the embedded (or configured) P-384 public key's signature over
//! it.

use ecdsa::signature::DigestVerifier;
use p384::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use p384::PublicKey;
use sha2::{Digest, Sha384};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

/// Magic 4 bytes that open a signature block.
pub const SIGNATURE_MAGIC: [u8; 4] = [0x5F, 0x32, 0xCB, 0x08];
/// Only this major version is understood; anything else is `UnsupportedSignatureVersion`.
pub const SUPPORTED_MAJOR_VERSION: u8 = 3;
/// Total on-wire size of the trailing signature block.
pub const SIGNATURE_BLOCK_SIZE: u64 = 1024;
/// Size of the fixed-layout prefix of a `SignatureHeader`, used in the `signed_length`
/// computation (magic..offset_to_public_key, before the length-prefixed key/signature fields).
pub const SIGNATURE_HEADER_FIXED_SIZE: usize = 16;
/// Valid `signature` field length range for a SHA-384/P-384 DER-encoded ECDSA signature.
pub const SHA384_SIGNATURE_SIZE: std::ops::RangeInclusive<usize> = 0x66..=0x68;

const STREAMING_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum SignatureError {
    Io(String),
    BadMagic,
    UnsupportedSignatureVersion(u8),
    UnsupportedSignatureType(u8),
    InvalidSignatureSize(usize),
    TruncatedBlock,
    InvalidPublicKey,
    InvalidSignatureEncoding,
    DigestMismatch,
    VerificationFailed,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::Io(e) => write!(f, "I/O error reading signature block: {e}"),
            SignatureError::BadMagic => write!(f, "signature block magic mismatch"),
            SignatureError::UnsupportedSignatureVersion(v) => {
                write!(f, "unsupported signature block version {v}")
            }
            SignatureError::UnsupportedSignatureType(t) => {
                write!(f, "unsupported signature type {t}, only 0 is defined")
            }
            SignatureError::InvalidSignatureSize(n) => {
                write!(f, "signature size {n} outside [0x66, 0x68]")
            }
            SignatureError::TruncatedBlock => write!(f, "signature block required but absent"),
            SignatureError::InvalidPublicKey => write!(f, "embedded public key could not be parsed"),
            SignatureError::InvalidSignatureEncoding => write!(f, "signature could not be parsed"),
            SignatureError::DigestMismatch => write!(f, "integrity digest mismatch"),
            SignatureError::VerificationFailed => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for SignatureError {}

impl From<io::Error> for SignatureError {
    fn from(e: io::Error) -> Self {
        SignatureError::Io(e.to_string())
    }
}

/// Parsed signature block (§6, version 3).
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    pub major: u8,
    pub minor: u8,
    pub security_version: u8,
    pub offset_to_signature: u16,
    pub payload_size: u32,
    pub signature_type: u8,
    pub offset_to_public_key: u16,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, SignatureError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != SIGNATURE_MAGIC {
            return Err(SignatureError::BadMagic);
        }

        let mut b1 = [0u8; 1];
        reader.read_exact(&mut b1)?;
        let major = b1[0];
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(SignatureError::UnsupportedSignatureVersion(major));
        }

        reader.read_exact(&mut b1)?;
        let minor = b1[0];
        reader.read_exact(&mut b1)?;
        let security_version = b1[0];

        let mut b2 = [0u8; 2];
        reader.read_exact(&mut b2)?;
        let offset_to_signature = u16::from_be_bytes(b2);

        let mut b4 = [0u8; 4];
        reader.read_exact(&mut b4)?;
        let payload_size = u32::from_be_bytes(b4);

        reader.read_exact(&mut b1)?;
        let signature_type = b1[0];
        if signature_type != 0 {
            return Err(SignatureError::UnsupportedSignatureType(signature_type));
        }

        reader.read_exact(&mut b2)?;
        let offset_to_public_key = u16::from_be_bytes(b2);

        reader.read_exact(&mut b2)?;
        let public_key_len = u16::from_be_bytes(b2) as usize;
        let mut public_key = vec![0u8; public_key_len];
        reader.read_exact(&mut public_key)?;

        reader.read_exact(&mut b2)?;
        let signature_len = u16::from_be_bytes(b2) as usize;
        if !SHA384_SIGNATURE_SIZE.contains(&signature_len) {
            return Err(SignatureError::InvalidSignatureSize(signature_len));
        }
        let mut signature = vec![0u8; signature_len];
        reader.read_exact(&mut signature)?;

        Ok(Self {
            major,
            minor,
            security_version,
            offset_to_signature,
            payload_size,
            signature_type,
            offset_to_public_key,
            public_key,
            signature,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&SIGNATURE_MAGIC);
        out.push(self.major);
        out.push(self.minor);
        out.push(self.security_version);
        out.extend_from_slice(&self.offset_to_signature.to_be_bytes());
        out.extend_from_slice(&self.payload_size.to_be_bytes());
        out.push(self.signature_type);
        out.extend_from_slice(&self.offset_to_public_key.to_be_bytes());
        out.extend_from_slice(&(self.public_key.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.signature);
    }

    /// `signed_length = payload_size + sizeof(SignatureHeader) + embedded_public_key_size`.
    pub fn signed_length(&self) -> u64 {
        self.payload_size as u64 + SIGNATURE_HEADER_FIXED_SIZE as u64 + self.public_key.len() as u64
    }
}

/// Streams a SHA-384 digest over the first `length` bytes of `reader` in fixed-size chunks,
/// seeking to the start first.
pub fn stream_sha384<R: Read + Seek>(reader: &mut R, length: u64) -> Result<[u8; 48], SignatureError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut hasher = Sha384::new();
    let mut remaining = length;
    let mut buf = [0u8; STREAMING_CHUNK_SIZE];
    while remaining > 0 {
        let to_read = remaining.min(STREAMING_CHUNK_SIZE as u64) as usize;
        reader.read_exact(&mut buf[..to_read])?;
        hasher.update(&buf[..to_read]);
        remaining -= to_read as u64;
    }
    let mut digest = [0u8; 48];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

/// Configuration knobs from §6's "integrity-check required / authentication-check required /
/// verification public key" environment knobs.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    pub integrity_required: bool,
    pub authentication_required: bool,
    /// Digest trusted out-of-band (e.g. published alongside `PackageVersion` on the activation
    /// surface). Required when `integrity_required` is set.
    pub expected_digest: Option<[u8; 48]>,
    /// Overrides the public key embedded in the signature block, when configured.
    pub configured_public_key: Option<Vec<u8>>,
}

impl SignatureVerifier {
    /// Verifies `reader` (positioned anywhere; this seeks internally) against `payload_size`
    /// (from the parsed package header, §4.1) and `total_size` (the full file length). Returns
    /// `Ok(())` when every check that is configured `required` passes.
    pub fn verify<R: Read + Seek>(
        &self,
        reader: &mut R,
        payload_size: u64,
        total_size: u64,
    ) -> Result<(), SignatureError> {
        let block_present = total_size > payload_size;
        if !block_present {
            return if self.integrity_required || self.authentication_required {
                Err(SignatureError::TruncatedBlock)
            } else {
                Ok(())
            };
        }

        reader.seek(SeekFrom::Start(payload_size))?;
        let header = SignatureHeader::decode(reader)?;
        let signed_length = header.signed_length();

        if self.integrity_required {
            let digest = stream_sha384(reader, signed_length)?;
            match self.expected_digest {
                Some(expected) if expected == digest => {}
                _ => return Err(SignatureError::DigestMismatch),
            }
        }

        if self.authentication_required {
            let hasher = {
                reader.seek(SeekFrom::Start(0))?;
                let mut hasher = Sha384::new();
                let mut remaining = signed_length;
                let mut buf = [0u8; STREAMING_CHUNK_SIZE];
                while remaining > 0 {
                    let to_read = remaining.min(STREAMING_CHUNK_SIZE as u64) as usize;
                    reader.read_exact(&mut buf[..to_read])?;
                    hasher.update(&buf[..to_read]);
                    remaining -= to_read as u64;
                }
                hasher
            };

            let key_bytes = self
                .configured_public_key
                .as_deref()
                .unwrap_or(&header.public_key);
            let public_key =
                PublicKey::from_sec1_bytes(key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
            let verifying_key = VerifyingKey::from(public_key);
            let signature = EcdsaSignature::from_der(&header.signature)
                .map_err(|_| SignatureError::InvalidSignatureEncoding)?;
            verifying_key
                .verify_digest(hasher, &signature)
                .map_err(|_| SignatureError::VerificationFailed)?;
        }

        Ok(())
    }
}
