use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use gatehouse_core::{CipherError, SecretCipher};
use rand::RngCore;

const NONCE_LENGTH: usize = 12;

/// Seals two-factor material with the process-wide key before it is
/// persisted. Sealed form is `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct ChaChaSecretCipher {
    cipher: ChaCha20Poly1305,
}

impl ChaChaSecretCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }
}

impl SecretCipher for ChaChaSecretCipher {
    fn seal(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn open(&self, sealed: &str) -> Result<Vec<u8>, CipherError> {
        let raw = STANDARD.decode(sealed).map_err(|_| CipherError::Open)?;
        if raw.len() < NONCE_LENGTH {
            return Err(CipherError::Open);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LENGTH);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cipher = ChaChaSecretCipher::new(&[42u8; 32]);
        let sealed = cipher.seal(b"my-totp-secret-bytes").unwrap();

        assert_ne!(sealed.as_bytes(), b"my-totp-secret-bytes".as_slice());
        assert_eq!(cipher.open(&sealed).unwrap(), b"my-totp-secret-bytes");
    }

    #[test]
    fn sealing_twice_yields_distinct_blobs() {
        let cipher = ChaChaSecretCipher::new(&[42u8; 32]);
        assert_ne!(cipher.seal(b"secret").unwrap(), cipher.seal(b"secret").unwrap());
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = ChaChaSecretCipher::new(&[42u8; 32]);
        let sealed = cipher.seal(b"secret").unwrap();

        let mut raw = STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let tampered = STANDARD.encode(raw);

        assert_eq!(cipher.open(&tampered), Err(CipherError::Open));
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let sealed = ChaChaSecretCipher::new(&[1u8; 32]).seal(b"secret").unwrap();
        let other = ChaChaSecretCipher::new(&[2u8; 32]);
        assert_eq!(other.open(&sealed), Err(CipherError::Open));
    }

    #[test]
    fn garbage_input_fails_to_open() {
        let cipher = ChaChaSecretCipher::new(&[1u8; 32]);
        assert_eq!(cipher.open("not base64!!"), Err(CipherError::Open));
        assert_eq!(cipher.open(&STANDARD.encode([0u8; 4])), Err(CipherError::Open));
    }
}
