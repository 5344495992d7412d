//! Chunked encryption for large files.
//!
//! The payload is read and transformed one fixed-size chunk at a time so
//! peak memory stays at one chunk regardless of file size. Each chunk is an
//! independent AES-256-GCM message:
//!
//! ```text
//! nonce_i = base_iv XOR (0^64 || i as u32 big-endian)
//! aad_i   = i as u64 big-endian || final flag (1 byte)
//! chunk_i = ciphertext || 16-byte tag
//! ```
//!
//! The base IV is random per file and travels out of band. Binding the
//! index and final flag into the AAD makes reordered, dropped, or appended
//! chunks fail authentication. An empty payload still produces one (empty)
//! chunk so that every ciphertext carries at least one tag.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zeroize::Zeroizing;

use crate::aead::{self, Nonce, NONCE_SIZE, TAG_SIZE};
use crate::encoding;
use crate::keys::ContentKey;
use zerokey_common::{Error, Result};

/// Default plaintext chunk size (64 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = u32::MAX as usize;

/// Receives completion percentages while a payload is transformed.
pub trait ProgressObserver: Send + Sync {
    /// Called once per chunk with a value in `0..=100`.
    fn on_progress(&self, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Per-operation hooks: progress reporting and cancellation.
#[derive(Default, Clone, Copy)]
pub struct ChunkOptions<'a> {
    progress: Option<&'a dyn ProgressObserver>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> ChunkOptions<'a> {
    /// No progress reporting, no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report progress to `observer`.
    pub fn with_progress(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    /// Abort between chunks once `token` is cancelled.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn report(&self, done: u64, total: u64) {
        if let Some(observer) = self.progress {
            let percent = if total == 0 {
                100
            } else {
                ((done.min(total) * 100) / total) as u8
            };
            observer.on_progress(percent);
        }
    }
}

/// Ciphertext plus the out-of-band base IV it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Concatenated encrypted chunks.
    pub data: Vec<u8>,
    /// Per-file base IV.
    pub iv: Nonce,
}

impl EncryptedBlob {
    /// Reassemble a blob from downloaded bytes and a base64 IV.
    ///
    /// # Errors
    /// - `InvalidInput` if the IV is malformed or not 12 bytes
    pub fn from_parts(data: Vec<u8>, iv_base64: &str) -> Result<Self> {
        Ok(Self {
            data,
            iv: encoding::decode_array(iv_base64)?,
        })
    }

    /// The IV as base64 for upload metadata.
    pub fn iv_base64(&self) -> String {
        encoding::encode(&self.iv)
    }
}

/// Chunked AES-256-GCM file cipher.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedFileCipher {
    chunk_size: usize,
}

impl Default for ChunkedFileCipher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkedFileCipher {
    /// Create a cipher with the default 64 MiB chunk size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom chunk size.
    ///
    /// # Errors
    /// - `InvalidInput` if `size` is zero or above [`MAX_CHUNK_SIZE`]
    pub fn with_chunk_size(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidInput("Chunk size must be non-zero".to_string()));
        }
        if size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidInput(format!(
                "Chunk size must be at most {} bytes",
                MAX_CHUNK_SIZE
            )));
        }
        Ok(Self { chunk_size: size })
    }

    /// Plaintext bytes per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a plaintext of `plaintext_len` bytes occupies.
    pub fn chunk_count(&self, plaintext_len: u64) -> u64 {
        plaintext_len.div_ceil(self.chunk_size as u64).max(1)
    }

    /// Ciphertext length for a plaintext of `plaintext_len` bytes: one tag
    /// per chunk on top of the plaintext.
    pub fn encrypted_size(&self, plaintext_len: u64) -> u64 {
        plaintext_len + self.chunk_count(plaintext_len) * TAG_SIZE as u64
    }

    /// Encrypt `total_len` bytes from `reader` into `writer`.
    ///
    /// # Postconditions
    /// - Exactly `encrypted_size(total_len)` bytes are written
    /// - Returns the random base IV the caller must store with the blob
    ///
    /// # Errors
    /// - `Encryption` if the reader ends early or either side fails I/O
    /// - `Cancelled` if the cancellation token fires between chunks
    pub async fn encrypt_stream<K, R, W>(
        &self,
        key: &K,
        mut reader: R,
        total_len: u64,
        mut writer: W,
        options: &ChunkOptions<'_>,
    ) -> Result<Nonce>
    where
        K: ContentKey,
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let chunk_count = self.chunk_count(total_len);
        ensure_counter_fits(chunk_count)?;

        let base_iv = aead::generate_nonce()?;
        let buffer_len = (self.chunk_size as u64).min(total_len) as usize;
        let mut buffer = Zeroizing::new(vec![0u8; buffer_len]);
        let mut processed = 0u64;

        debug!(total_len, chunks = chunk_count, "Encrypting payload");

        for index in 0..chunk_count {
            options.check_cancelled()?;

            let len = (total_len - processed).min(self.chunk_size as u64) as usize;
            let chunk = &mut buffer[..len];
            reader.read_exact(chunk).await.map_err(io_failure)?;

            let nonce = chunk_nonce(&base_iv, index);
            let aad = chunk_aad(index, index + 1 == chunk_count);
            let sealed = aead::seal(key.as_bytes(), &nonce, chunk, &aad)?;
            writer.write_all(&sealed).await.map_err(io_failure)?;

            processed += len as u64;
            options.report(processed, total_len);
        }

        writer.flush().await.map_err(io_failure)?;
        Ok(base_iv)
    }

    /// Decrypt `encrypted_len` bytes from `reader` into `writer`.
    ///
    /// The encrypted-side cursor advances by `chunk_size + TAG_SIZE` per
    /// chunk; only the final chunk may be shorter.
    ///
    /// # Returns
    /// Number of plaintext bytes written.
    ///
    /// # Errors
    /// - `Decryption` for a wrong key or IV, tampering, truncation, or a
    ///   length that cannot be a valid chunk sequence
    /// - `Encryption` if the reader ends early or either side fails I/O
    /// - `Cancelled` if the cancellation token fires between chunks
    pub async fn decrypt_stream<K, R, W>(
        &self,
        key: &K,
        iv: &Nonce,
        mut reader: R,
        encrypted_len: u64,
        mut writer: W,
        options: &ChunkOptions<'_>,
    ) -> Result<u64>
    where
        K: ContentKey,
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let encrypted_chunk = self.chunk_size as u64 + TAG_SIZE as u64;
        if encrypted_len < TAG_SIZE as u64 {
            return Err(Error::Decryption);
        }
        let chunk_count = encrypted_len.div_ceil(encrypted_chunk);
        let last_len = encrypted_len - (chunk_count - 1) * encrypted_chunk;
        if last_len < TAG_SIZE as u64 {
            return Err(Error::Decryption);
        }
        ensure_counter_fits(chunk_count)?;

        let buffer_len = encrypted_chunk.min(encrypted_len) as usize;
        let mut buffer = vec![0u8; buffer_len];
        let mut processed = 0u64;
        let mut written = 0u64;

        debug!(encrypted_len, chunks = chunk_count, "Decrypting payload");

        for index in 0..chunk_count {
            options.check_cancelled()?;

            let len = (encrypted_len - processed).min(encrypted_chunk) as usize;
            let chunk = &mut buffer[..len];
            reader.read_exact(chunk).await.map_err(io_failure)?;

            let nonce = chunk_nonce(iv, index);
            let aad = chunk_aad(index, index + 1 == chunk_count);
            let plaintext = Zeroizing::new(aead::open(key.as_bytes(), &nonce, chunk, &aad)?);
            writer.write_all(&plaintext).await.map_err(io_failure)?;

            processed += len as u64;
            written += plaintext.len() as u64;
            options.report(processed, encrypted_len);
        }

        writer.flush().await.map_err(io_failure)?;
        Ok(written)
    }

    /// Encrypt an in-memory payload.
    pub async fn encrypt_bytes<K: ContentKey>(
        &self,
        key: &K,
        data: &[u8],
        options: &ChunkOptions<'_>,
    ) -> Result<EncryptedBlob> {
        let mut output = Vec::with_capacity(self.encrypted_size(data.len() as u64) as usize);
        let iv = self
            .encrypt_stream(key, data, data.len() as u64, &mut output, options)
            .await?;
        Ok(EncryptedBlob { data: output, iv })
    }

    /// Decrypt an in-memory blob produced by [`encrypt_bytes`](Self::encrypt_bytes).
    pub async fn decrypt_bytes<K: ContentKey>(
        &self,
        key: &K,
        blob: &EncryptedBlob,
        options: &ChunkOptions<'_>,
    ) -> Result<Vec<u8>> {
        let capacity = blob.data.len().saturating_sub(TAG_SIZE);
        let mut output = Vec::with_capacity(capacity);
        self.decrypt_stream(
            key,
            &blob.iv,
            blob.data.as_slice(),
            blob.data.len() as u64,
            &mut output,
            options,
        )
        .await?;
        Ok(output)
    }
}

/// Nonce for chunk `index`: the low 32 bits of the base IV XOR the index.
fn chunk_nonce(base_iv: &Nonce, index: u64) -> Nonce {
    let mut nonce = *base_iv;
    let counter = (index as u32).to_be_bytes();
    for (byte, c) in nonce[NONCE_SIZE - 4..].iter_mut().zip(counter) {
        *byte ^= c;
    }
    nonce
}

fn chunk_aad(index: u64, is_final: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(is_final);
    aad
}

fn ensure_counter_fits(chunk_count: u64) -> Result<()> {
    if chunk_count > u64::from(u32::MAX) + 1 {
        return Err(Error::InvalidInput(
            "Payload needs more chunks than the nonce counter allows".to_string(),
        ));
    }
    Ok(())
}

fn io_failure(err: std::io::Error) -> Error {
    Error::Encryption(format!("I/O failure: {}", err.kind()))
}
