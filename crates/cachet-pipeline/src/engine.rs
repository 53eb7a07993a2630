//! Chunked encrypt/decrypt drivers.
//!
//! Single-threaded, blocking I/O: read a chunk, run the cipher, write the
//! framed record, strictly in sequence. Any error aborts the run; the
//! partial `.tmp` file is left behind for diagnostics and never promoted to
//! the final path.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};

use cachet_core::{CachetError, CachetResult, CipherMode, BLOCK_SIZE};
use cachet_crypto::{Encryptor, SessionKey};
use cachet_envelope::{plaintext_digest, unwrap_key, wrap_key, EnvelopeHeader, PlaintextDigest};

use crate::frame::{RecordReader, RecordWriter};

/// Progress callback type (bytes_done, bytes_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Where the decrypt session key comes from: supplied by the caller
/// (symmetric run) or unwrapped from the envelope header (hybrid run).
pub enum KeySource<'a> {
    Provided(&'a SessionKey),
    Wrapped { private_key_pem: &'a str },
}

/// Result of one encrypt or decrypt run.
#[derive(Debug)]
pub struct RunSummary {
    /// Ciphertext records written or consumed (the IV record not counted)
    pub records: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub output: PathBuf,
}

/// Encrypt `input` into a framed file at `output`.
///
/// The whole file is one record when it fits in `chunk_size` bytes;
/// otherwise it is split into sequential chunks, each encrypted
/// independently with the same key and IV. When `public_key_pem` is given,
/// an envelope header (wrapped session key + plaintext digest) precedes the
/// framed body.
pub fn encrypt_file(
    input: &Path,
    output: &Path,
    key: &SessionKey,
    mode: CipherMode,
    public_key_pem: Option<&str>,
    chunk_size: u64,
    progress: Option<&ProgressFn>,
) -> CachetResult<RunSummary> {
    if chunk_size == 0 {
        return Err(CachetError::Config("chunk size must be non-zero".into()));
    }

    let mut in_file = File::open(input)?;
    let total = in_file.metadata()?.len();
    let tmp = tmp_path(output);
    let mut out = BufWriter::new(File::create(&tmp)?);

    if let Some(pem) = public_key_pem {
        // Digest pass over the plaintext, then rewind for the cipher pass.
        let digest = plaintext_digest(&mut in_file)?;
        in_file.seek(SeekFrom::Start(0))?;
        let header = EnvelopeHeader {
            wrapped_key: wrap_key(pem, key.as_bytes())?,
            digest,
        };
        header.write_to(&mut out)?;
        debug!(wrapped_len = header.wrapped_key.len(), "wrote envelope header");
    }

    let mut encryptor = Encryptor::new(key.clone(), mode);
    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut iv);
    encryptor.set_iv(&iv)?;

    let mut writer = RecordWriter::new(out);
    writer.write_record(&iv)?;

    let mut reader = BufReader::new(in_file);
    let mut records = 0usize;
    let mut done = 0u64;
    loop {
        let mut chunk = Vec::new();
        let n = (&mut reader).take(chunk_size).read_to_end(&mut chunk)? as u64;
        if n == 0 && records > 0 {
            break;
        }
        // An empty source still produces one (all-padding) record.
        let ciphertext = encryptor.encrypt(&chunk)?;
        writer.write_record(&ciphertext)?;
        records += 1;
        done += n;
        debug!(chunk = records, bytes = n, "encrypted chunk");
        if let Some(p) = progress {
            p(done, total, &format!("chunk {records}"));
        }
        if n < chunk_size {
            break;
        }
    }
    writer.flush()?;
    drop(writer);

    let bytes_out = fs::metadata(&tmp)?.len();
    fs::rename(&tmp, output)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        records,
        bytes_in = done,
        bytes_out,
        "encrypt complete"
    );
    Ok(RunSummary {
        records,
        bytes_in: done,
        bytes_out,
        output: output.to_path_buf(),
    })
}

/// Decrypt a framed file at `input` into `output`.
///
/// The first record is the IV; every later record is decrypted and appended
/// in order. A hybrid file is detected by its `KeySource`: the envelope
/// header is read first, the session key unwrapped, and the plaintext MD5
/// checked against the header before the output is promoted.
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    mode: CipherMode,
    key_source: KeySource<'_>,
    progress: Option<&ProgressFn>,
) -> CachetResult<RunSummary> {
    let in_file = File::open(input)?;
    let total = in_file.metadata()?.len();
    let mut in_reader = BufReader::new(in_file);

    let (key, expected_digest) = match key_source {
        KeySource::Provided(key) => (key.clone(), None),
        KeySource::Wrapped { private_key_pem } => {
            let header = EnvelopeHeader::read_from(&mut in_reader)?;
            let key = unwrap_key(private_key_pem, &header.wrapped_key)?;
            debug!(wrapped_len = header.wrapped_key.len(), "read envelope header");
            (key, Some(header.digest))
        }
    };

    let mut encryptor = Encryptor::new(key, mode);
    let mut reader = RecordReader::new(in_reader);

    let iv = reader
        .next_record()?
        .ok_or_else(|| CachetError::MalformedFrame("missing IV record".into()))?;
    encryptor.set_iv(&iv)?;

    let tmp = tmp_path(output);
    let mut out = BufWriter::new(File::create(&tmp)?);
    let mut digest = PlaintextDigest::new();
    let mut records = 0usize;
    let mut done = iv.len() as u64;
    let mut bytes_out = 0u64;

    while let Some(record) = reader.next_record()? {
        let plaintext = encryptor.decrypt(&record)?;
        out.write_all(&plaintext)?;
        if expected_digest.is_some() {
            digest.update(&plaintext);
        }
        records += 1;
        done += record.len() as u64;
        bytes_out += plaintext.len() as u64;
        debug!(record = records, bytes = plaintext.len(), "decrypted record");
        if let Some(p) = progress {
            p(done.min(total), total, &format!("record {records}"));
        }
    }
    if records == 0 {
        return Err(CachetError::MalformedFrame(
            "no ciphertext records after the IV".into(),
        ));
    }
    out.flush()?;
    drop(out);

    if let Some(expected) = expected_digest {
        if digest.finalize() != expected {
            return Err(CachetError::DigestMismatch);
        }
    }

    fs::rename(&tmp, output)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        records,
        bytes_out,
        "decrypt complete"
    );
    Ok(RunSummary {
        records,
        bytes_in: total,
        bytes_out,
        output: output.to_path_buf(),
    })
}

fn tmp_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cachet-out".into());
    output.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_crypto::derive_key;
    use cachet_core::KeyBits;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
    use rsa::{RsaPrivateKey, RsaPublicKey};

    fn session_key() -> SessionKey {
        derive_key(b"pipeline test key", KeyBits::Aes256).unwrap()
    }

    fn write_input(dir: &Path, data: &[u8]) -> PathBuf {
        let path = dir.join("input.bin");
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    fn count_records(path: &Path) -> Vec<Vec<u8>> {
        let mut reader = RecordReader::new(BufReader::new(File::open(path).unwrap()));
        let mut records = Vec::new();
        while let Some(r) = reader.next_record().unwrap() {
            records.push(r);
        }
        records
    }

    #[test]
    fn test_symmetric_roundtrip_single_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let input = write_input(dir.path(), &data);
        let encrypted = dir.path().join("out.enc");
        let decrypted = dir.path().join("out.dec");
        let key = session_key();

        let summary = encrypt_file(
            &input,
            &encrypted,
            &key,
            CipherMode::Cbc,
            None,
            100 * 1024 * 1024,
            None,
        )
        .unwrap();
        assert_eq!(summary.records, 1);

        decrypt_file(
            &encrypted,
            &decrypted,
            CipherMode::Cbc,
            KeySource::Provided(&key),
            None,
        )
        .unwrap();
        assert_eq!(fs::read(&decrypted).unwrap(), data);
    }

    #[test]
    fn test_multi_chunk_framing_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        // 10 000 bytes at a 4096-byte chunk size: 3 ciphertext records
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let input = write_input(dir.path(), &data);
        let encrypted = dir.path().join("out.enc");
        let decrypted = dir.path().join("out.dec");
        let key = session_key();

        let summary =
            encrypt_file(&input, &encrypted, &key, CipherMode::Ctr, None, 4096, None).unwrap();
        assert_eq!(summary.records, 3);

        let records = count_records(&encrypted);
        assert_eq!(records.len(), 4, "IV record plus 3 ciphertext records");
        assert_eq!(records[0].len(), BLOCK_SIZE, "first record is the IV");

        let summary = decrypt_file(
            &encrypted,
            &decrypted,
            CipherMode::Ctr,
            KeySource::Provided(&key),
            None,
        )
        .unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(fs::read(&decrypted).unwrap(), data);
    }

    #[test]
    fn test_empty_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), b"");
        let encrypted = dir.path().join("out.enc");
        let decrypted = dir.path().join("out.dec");
        let key = session_key();

        let summary = encrypt_file(
            &input,
            &encrypted,
            &key,
            CipherMode::Ofb,
            None,
            1024,
            None,
        )
        .unwrap();
        // Empty source still yields one all-padding record
        assert_eq!(summary.records, 1);
        assert_eq!(count_records(&encrypted).len(), 2);

        decrypt_file(
            &encrypted,
            &decrypted,
            CipherMode::Ofb,
            KeySource::Provided(&key),
            None,
        )
        .unwrap();
        assert_eq!(fs::read(&decrypted).unwrap(), b"");
    }

    #[test]
    fn test_identical_chunks_yield_identical_records() {
        // The IV is reused across chunks (format compatibility), so two
        // chunks with the same content encrypt to the same record.
        let dir = tempfile::tempdir().unwrap();
        let data = vec![0xEEu8; 128];
        let input = write_input(dir.path(), &data);
        let encrypted = dir.path().join("out.enc");
        let key = session_key();

        encrypt_file(&input, &encrypted, &key, CipherMode::Cbc, None, 64, None).unwrap();
        let records = count_records(&encrypted);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], records[2]);
    }

    #[test]
    fn test_hybrid_roundtrip_with_digest() {
        let dir = tempfile::tempdir().unwrap();
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_pem = RsaPublicKey::from(&private)
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();
        let private_pem = private.to_pkcs1_pem(LineEnding::LF).unwrap().to_string();

        let data = b"hybrid payload: wrapped session key + digest".to_vec();
        let input = write_input(dir.path(), &data);
        let encrypted = dir.path().join("out.enc");
        let decrypted = dir.path().join("out.dec");
        let key = session_key();

        encrypt_file(
            &input,
            &encrypted,
            &key,
            CipherMode::Cbc,
            Some(&public_pem),
            1024,
            None,
        )
        .unwrap();

        decrypt_file(
            &encrypted,
            &decrypted,
            CipherMode::Cbc,
            KeySource::Wrapped {
                private_key_pem: &private_pem,
            },
            None,
        )
        .unwrap();
        assert_eq!(fs::read(&decrypted).unwrap(), data);
    }

    #[test]
    fn test_tampered_digest_is_detected_and_output_not_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_pem = RsaPublicKey::from(&private)
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();
        let private_pem = private.to_pkcs1_pem(LineEnding::LF).unwrap().to_string();

        let input = write_input(dir.path(), b"checked payload");
        let encrypted = dir.path().join("out.enc");
        let decrypted = dir.path().join("out.dec");
        let key = session_key();

        encrypt_file(
            &input,
            &encrypted,
            &key,
            CipherMode::Cfb,
            Some(&public_pem),
            1024,
            None,
        )
        .unwrap();

        // Flip a digest byte inside the envelope header
        let mut bytes = fs::read(&encrypted).unwrap();
        let magic_len = cachet_envelope::ENVELOPE_MAGIC.len();
        let wrapped_len = u32::from_be_bytes(
            bytes[magic_len..magic_len + 4].try_into().unwrap(),
        ) as usize;
        bytes[magic_len + 4 + wrapped_len] ^= 0xFF;
        fs::write(&encrypted, bytes).unwrap();

        let err = decrypt_file(
            &encrypted,
            &decrypted,
            CipherMode::Cfb,
            KeySource::Wrapped {
                private_key_pem: &private_pem,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CachetError::DigestMismatch));
        assert!(!decrypted.exists(), "failed run must not promote output");
        assert!(
            tmp_path(&decrypted).exists(),
            "temp file stays behind for diagnostics"
        );
    }

    #[test]
    fn test_garbage_input_fails_without_promoting() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &[0x13u8; 500]);
        let decrypted = dir.path().join("out.dec");
        let key = session_key();

        let err = decrypt_file(
            &input,
            &decrypted,
            CipherMode::Cbc,
            KeySource::Provided(&key),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CachetError::MalformedFrame(_)));
        assert!(!decrypted.exists());
    }

    #[test]
    fn test_wrong_symmetric_key_fails_or_corrupts_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![0x61u8; 300];
        let input = write_input(dir.path(), &data);
        let encrypted = dir.path().join("out.enc");
        let decrypted = dir.path().join("out.dec");

        let key = session_key();
        encrypt_file(&input, &encrypted, &key, CipherMode::Cbc, None, 1024, None).unwrap();

        let wrong = derive_key(b"not the same key", KeyBits::Aes256).unwrap();
        let result = decrypt_file(
            &encrypted,
            &decrypted,
            CipherMode::Cbc,
            KeySource::Provided(&wrong),
            None,
        );
        // Without an envelope digest there is no integrity check: the run
        // either trips over padding or yields different bytes.
        match result {
            Err(_) => {}
            Ok(_) => assert_ne!(fs::read(&decrypted).unwrap(), data),
        }
    }

    #[test]
    fn test_progress_callback_reports_chunks() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &vec![1u8; 3000]);
        let encrypted = dir.path().join("out.enc");
        let key = session_key();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let progress: ProgressFn = Box::new(move |done, total, _| {
            assert!(done <= total);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        encrypt_file(
            &input,
            &encrypted,
            &key,
            CipherMode::Ecb,
            None,
            1024,
            Some(&progress),
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
