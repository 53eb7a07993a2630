//! Multi-mode AES engine over whole byte buffers.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroize;

use cachet_core::{CachetError, CachetResult, CipherMode, BLOCK_SIZE};

use crate::padding::{pad, unpad};

/// The symmetric session key. Zeroized on drop.
///
/// May hold any byte length; AES validity (16/24/32) is checked when the
/// block primitive is first built, not at construction.
#[derive(Clone)]
pub struct SessionKey {
    bytes: Vec<u8>,
}

impl SessionKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// AES block primitive at one of the three key widths.
enum AesBlock {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesBlock {
    fn new(key: &[u8]) -> CachetResult<Self> {
        match key.len() {
            16 => Ok(AesBlock::Aes128(Aes128::new(GenericArray::from_slice(key)))),
            24 => Ok(AesBlock::Aes192(Aes192::new(GenericArray::from_slice(key)))),
            32 => Ok(AesBlock::Aes256(Aes256::new(GenericArray::from_slice(key)))),
            n => Err(CachetError::InvalidKeyLength(n)),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(block),
            AesBlock::Aes192(c) => c.encrypt_block(block),
            AesBlock::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.decrypt_block(block),
            AesBlock::Aes192(c) => c.decrypt_block(block),
            AesBlock::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// Whole-buffer encryptor: owns a key, an optional IV, and a fixed mode.
///
/// Construct once per run; set the IV exactly once before the first cipher
/// call. ECB ignores the IV; the other modes refuse to operate without one.
pub struct Encryptor {
    key: SessionKey,
    iv: Option<[u8; BLOCK_SIZE]>,
    mode: CipherMode,
}

impl Encryptor {
    pub fn new(key: SessionKey, mode: CipherMode) -> Self {
        Self {
            key,
            iv: None,
            mode,
        }
    }

    /// Store the first block-length bytes of `iv`. Shorter input is rejected.
    pub fn set_iv(&mut self, iv: &[u8]) -> CachetResult<()> {
        if iv.len() < BLOCK_SIZE {
            return Err(CachetError::InvalidIvLength(iv.len()));
        }
        let mut stored = [0u8; BLOCK_SIZE];
        stored.copy_from_slice(&iv[..BLOCK_SIZE]);
        self.iv = Some(stored);
        Ok(())
    }

    /// The stored IV, verbatim; the file pipeline prepends this to output.
    pub fn iv(&self) -> Option<&[u8; BLOCK_SIZE]> {
        self.iv.as_ref()
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Pad and encrypt a whole buffer. Ciphertext length equals the padded
    /// plaintext length in every mode.
    pub fn encrypt(&self, plaintext: &[u8]) -> CachetResult<Vec<u8>> {
        let block = AesBlock::new(self.key.as_bytes())?;
        let mut buf = pad(plaintext, BLOCK_SIZE);
        match self.mode {
            CipherMode::Ecb => ecb_encrypt(&block, &mut buf),
            CipherMode::Cbc => cbc_encrypt(&block, &self.require_iv()?, &mut buf),
            CipherMode::Ctr => ctr_xor(&block, &self.require_iv()?, &mut buf),
            CipherMode::Cfb => cfb_encrypt(&block, &self.require_iv()?, &mut buf),
            CipherMode::Ofb => ofb_xor(&block, &self.require_iv()?, &mut buf),
        }
        Ok(buf)
    }

    /// Decrypt a whole buffer and strip padding. Mirror of [`encrypt`].
    ///
    /// ECB and CBC input must be a block multiple; anything else is reported
    /// as malformed rather than indexed past the end.
    pub fn decrypt(&self, ciphertext: &[u8]) -> CachetResult<Vec<u8>> {
        let block = AesBlock::new(self.key.as_bytes())?;
        let mut buf = ciphertext.to_vec();
        match self.mode {
            CipherMode::Ecb | CipherMode::Cbc if buf.len() % BLOCK_SIZE != 0 => {
                return Err(CachetError::MalformedCiphertext(buf.len()));
            }
            CipherMode::Ecb => ecb_decrypt(&block, &mut buf),
            CipherMode::Cbc => cbc_decrypt(&block, &self.require_iv()?, &mut buf),
            CipherMode::Ctr => ctr_xor(&block, &self.require_iv()?, &mut buf),
            CipherMode::Cfb => cfb_decrypt(&block, &self.require_iv()?, &mut buf),
            CipherMode::Ofb => ofb_xor(&block, &self.require_iv()?, &mut buf),
        }
        unpad(&buf, BLOCK_SIZE)
    }

    fn require_iv(&self) -> CachetResult<[u8; BLOCK_SIZE]> {
        self.iv.ok_or(CachetError::IvNotSet)
    }
}

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

fn ecb_encrypt(block: &AesBlock, buf: &mut [u8]) {
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        block.encrypt_block(chunk);
    }
}

fn ecb_decrypt(block: &AesBlock, buf: &mut [u8]) {
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        block.decrypt_block(chunk);
    }
}

fn cbc_encrypt(block: &AesBlock, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let mut prev = *iv;
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        xor_in_place(chunk, &prev);
        block.encrypt_block(chunk);
        prev.copy_from_slice(chunk);
    }
}

fn cbc_decrypt(block: &AesBlock, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let mut prev = *iv;
    for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
        let mut saved = [0u8; BLOCK_SIZE];
        saved.copy_from_slice(chunk);
        block.decrypt_block(chunk);
        xor_in_place(chunk, &prev);
        prev = saved;
    }
}

/// CTR keystream: the IV is the initial counter, incremented big-endian per
/// block. Encryption and decryption are the same XOR.
fn ctr_xor(block: &AesBlock, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let mut counter = *iv;
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let mut keystream = counter;
        block.encrypt_block(&mut keystream);
        xor_in_place(chunk, &keystream[..chunk.len()]);
        increment_be(&mut counter);
    }
}

fn increment_be(counter: &mut [u8; BLOCK_SIZE]) {
    for byte in counter.iter_mut().rev() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            break;
        }
    }
}

/// Full-block CFB: keystream is the encryption of the previous ciphertext
/// block (the IV for the first).
fn cfb_encrypt(block: &AesBlock, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let mut prev = *iv;
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let mut keystream = prev;
        block.encrypt_block(&mut keystream);
        xor_in_place(chunk, &keystream[..chunk.len()]);
        if chunk.len() == BLOCK_SIZE {
            prev.copy_from_slice(chunk);
        }
    }
}

fn cfb_decrypt(block: &AesBlock, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let mut prev = *iv;
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        let mut keystream = prev;
        block.encrypt_block(&mut keystream);
        if chunk.len() == BLOCK_SIZE {
            prev.copy_from_slice(chunk);
        }
        xor_in_place(chunk, &keystream[..chunk.len()]);
    }
}

/// OFB keystream: repeatedly re-encrypt the previous keystream block,
/// starting from the IV. Same XOR both directions.
fn ofb_xor(block: &AesBlock, iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) {
    let mut state = *iv;
    for chunk in buf.chunks_mut(BLOCK_SIZE) {
        block.encrypt_block(&mut state);
        xor_in_place(chunk, &state[..chunk.len()]);
    }
}
