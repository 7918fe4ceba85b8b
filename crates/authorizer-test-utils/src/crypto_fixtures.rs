//! Deterministic signing keys for testing
//!
//! Two fixed RSA-2048 keys (checked in under `fixtures/`) and seeded Ed25519
//! keys. Each key knows its public JWK, so a test can publish it from a mock
//! JWKS endpoint and sign tokens with the matching private half.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};

use crate::test_vectors::PROVIDER_KID;

const RSA_PRIMARY_PEM: &[u8] = include_bytes!("../fixtures/rsa_primary.pem");
const RSA_SECONDARY_PEM: &[u8] = include_bytes!("../fixtures/rsa_secondary.pem");

const RSA_PRIMARY_N: &str = "6uBQhdVhKlpJ4x9qSLfRpo-gdDgh4BkDi8eUkycWc_SbnPxvb8augHPBkzosuLSxN8ha-S1Xuc8opXzQBvz2cV1H5vSKloFvzCCyQRCkiGXsH9mmb6aen1oEiWgcmfpOyEKzWi_qPp1tln1hG96KfgWQFvvp0TY2TrQn_8U8qaogwnJMJr3RBwKpA8GFpuZFkMwm4DA5nim_3y2fYLSD7H0MiGHOwIMLF0u2oVu6WYMd42Qavc7iqEaguPGuwdn-x3etHna4e2H4_GgiKmc8FF0KGdrHMd2fPVFsMXymvOvdk7qVkcxlUsxz2dQZT25S6uUEOJ2gMtl6ypsAGDtx2Q";
const RSA_SECONDARY_N: &str = "pJjinShYIlkikagDW1qxFhzGuTUP2DORYEfIOu6-r8I2b9rcrjOp6t3iCp5aoOHcCBqGl874MwdsmqrvQs5kL7NYHv9cfOWnoUXCCygrpFgnPp2dz9x3Wm-DfjkPew-KHaLGMfmTsYXWtKGKZflnZvurykPDOstQ5zlq_sJlnuwcYv6F49E1j4Lcr5Jr13ARNWExNDm5JKyKEbjBFMHTQmPVL6O0N3jQ4Cw36Ap7__oXm2bx-EtjfULbzhW_U17JsNvWEcm7hQwOpV0UeflqtoskdqZELDnLdAoGWPin4tuuOmotsAGXWqKY555979vKivykDw5-wah0VOCmOxWA1w";
const RSA_EXPONENT: &str = "AQAB";

/// Key ID of the secondary RSA fixture.
pub const SECONDARY_KID: &str = "test-rsa-secondary";

/// A private signing key together with its published JWK.
#[derive(Clone)]
pub struct TestSigningKey {
    /// Key ID placed in both the JWK and the token header.
    pub kid: String,
    /// Algorithm the key signs with.
    pub alg: Algorithm,
    alg_name: &'static str,
    encoding_key: EncodingKey,
    /// Public JWK members other than `kid`, `alg` and `use`.
    public_jwk: Value,
    include_kid: bool,
}

impl TestSigningKey {
    /// RSA key published under the provider's real key ID.
    pub fn rsa_primary() -> Self {
        Self::rsa(RSA_PRIMARY_PEM, RSA_PRIMARY_N, PROVIDER_KID)
    }

    /// A second, unrelated RSA key.
    pub fn rsa_secondary() -> Self {
        Self::rsa(RSA_SECONDARY_PEM, RSA_SECONDARY_N, SECONDARY_KID)
    }

    fn rsa(pem: &[u8], n: &str, kid: &str) -> Self {
        let encoding_key =
            EncodingKey::from_rsa_pem(pem).expect("RSA fixture PEM should be a valid private key");

        Self {
            kid: kid.to_string(),
            alg: Algorithm::RS256,
            alg_name: "RS256",
            encoding_key,
            public_jwk: json!({ "kty": "RSA", "n": n, "e": RSA_EXPONENT }),
            include_kid: true,
        }
    }

    /// Deterministic Ed25519 key. The same seed always produces the same key.
    pub fn ed25519(seed: u8) -> Self {
        let seed_bytes = seed_bytes(seed);

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("seeded Ed25519 key generation should succeed");
        let x = URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref());

        Self {
            kid: format!("test-ed25519-{seed}"),
            alg: Algorithm::EdDSA,
            alg_name: "EdDSA",
            encoding_key: EncodingKey::from_ed_der(&build_pkcs8_from_seed(&seed_bytes)),
            public_jwk: json!({ "kty": "OKP", "crv": "Ed25519", "x": x }),
            include_kid: true,
        }
    }

    /// Same key under a different key ID.
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = kid.to_string();
        self
    }

    /// Sign tokens without a `kid` header.
    pub fn without_kid(mut self) -> Self {
        self.include_kid = false;
        self
    }

    /// The header this key signs with by default.
    pub fn header(&self) -> Header {
        let mut header = Header::new(self.alg);
        if self.include_kid {
            header.kid = Some(self.kid.clone());
        }
        header
    }

    /// Sign a claim set.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_header(&self.header(), claims)
    }

    /// Sign a claim set under an explicit header.
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        encode(header, claims, &self.encoding_key).expect("signing a test token should succeed")
    }

    /// Public JWK as published in a key set.
    pub fn jwk_json(&self) -> Value {
        let mut jwk = self.public_jwk.clone();
        jwk["kid"] = json!(self.kid);
        jwk["alg"] = json!(self.alg_name);
        jwk["use"] = json!("sig");
        jwk
    }

    /// A JWKS document listing `keys` in order.
    pub fn jwks_json(keys: &[&TestSigningKey]) -> Value {
        json!({ "keys": keys.iter().map(|key| key.jwk_json()).collect::<Vec<_>>() })
    }
}

/// Expand a one-byte seed into a 32-byte Ed25519 seed.
fn seed_bytes(seed: u8) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[0] = seed;
    for (i, byte) in bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }
    bytes
}

/// Build a PKCS#8 v1 document around an Ed25519 seed.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE { INTEGER 0, SEQUENCE { OID 1.3.101.112 }, OCTET STRING { OCTET STRING seed } }
    let mut pkcs8 = vec![
        0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04,
        0x20,
    ];
    pkcs8.extend_from_slice(seed);
    pkcs8
}
