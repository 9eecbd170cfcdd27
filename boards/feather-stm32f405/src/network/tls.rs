#![deny(unsafe_code)]
#![deny(warnings)]
//! TLS 1.3 support for `embedded-tls`
//!
//! # Limitations
//!
//! - Certificate verification is disabled (`NoVerify`)
//! - Single connection at a time (one pair of static record buffers)
//! - AES-128-GCM-SHA256 only

use embedded_tls::{Aes128GcmSha256, CryptoProvider, NoVerify, TlsVerifier};

/// Crypto provider that wraps an RNG for the TLS handshake
pub struct SimpleCryptoProvider<RNG> {
    rng: RNG,
    verifier: NoVerify,
}

impl<RNG> SimpleCryptoProvider<RNG> {
    pub fn new(rng: RNG) -> Self {
        Self {
            rng,
            verifier: NoVerify,
        }
    }
}

impl<RNG> CryptoProvider for SimpleCryptoProvider<RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    type CipherSuite = Aes128GcmSha256;
    type Signature = &'static [u8];

    fn rng(&mut self) -> impl rand_core::CryptoRngCore {
        &mut self.rng
    }

    fn verifier(
        &mut self,
    ) -> Result<&mut impl TlsVerifier<Self::CipherSuite>, embedded_tls::TlsError> {
        Ok(&mut self.verifier)
    }
}
