//! SRP-6a arithmetic for the Cognito `USER_SRP_AUTH` flow.
//!
//! Cognito uses the 3072-bit group from RFC 5054 with `g = 2` and SHA-256.
//! Hex values are padded the way the Cognito SDKs pad them before hashing:
//! an odd-length string gains a leading `0`, and a string whose first digit
//! has the high bit set gains `00` so it is never read as negative.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::{EvnexError, EvnexResult};
use crate::observability::Redacted;

type HmacSha256 = Hmac<Sha256>;

const N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AAAC42DAD33170D04507A33A85521ABDF1CBA64",
    "ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
    "ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6B",
    "F12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB31",
    "43DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);

const DERIVED_KEY_INFO: &[u8] = b"Caldera Derived Key";

/// Number of random bytes in the ephemeral private value `a`.
const EPHEMERAL_BYTES: usize = 128;

static N: Lazy<BigUint> =
    Lazy::new(|| BigUint::parse_bytes(N_HEX.as_bytes(), 16).unwrap_or_default());
static G: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32));
static K: Lazy<BigUint> = Lazy::new(|| hash_hex_to_int(&format!("{}{}", pad_hex(&N), pad_hex(&G))));

/// Lowercase hex with Cognito's sign-safe padding.
pub fn pad_hex(value: &BigUint) -> String {
    let hex = format!("{:x}", value);
    if hex.len() % 2 == 1 {
        format!("0{}", hex)
    } else if hex.starts_with(&['8', '9', 'a', 'b', 'c', 'd', 'e', 'f'][..]) {
        format!("00{}", hex)
    } else {
        hex
    }
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    hex::decode(hex).unwrap_or_default()
}

/// SHA-256 of the bytes a (padded, even-length) hex string encodes, as an integer.
fn hash_hex_to_int(hex: &str) -> BigUint {
    BigUint::from_bytes_be(&Sha256::digest(hex_bytes(hex)))
}

fn parse_hex(name: &str, hex: &str) -> EvnexResult<BigUint> {
    BigUint::parse_bytes(hex.as_bytes(), 16)
        .ok_or_else(|| EvnexError::authentication(format!("{} is not a hex value", name)))
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> EvnexResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| EvnexError::authentication(format!("HMAC key rejected: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Formats a timestamp the way the password verifier expects it,
/// e.g. `Tue Mar 5 09:04:07 UTC 2024`.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %-d %H:%M:%S UTC %Y").to_string()
}

/// The `PASSWORD_VERIFIER` challenge parameters the claim is computed from.
#[derive(Debug, Clone)]
pub struct VerifierChallenge {
    /// `USER_ID_FOR_SRP`.
    pub user_id: String,
    /// `SALT` (hex).
    pub salt: String,
    /// `SRP_B` (hex).
    pub srp_b: String,
    /// `SECRET_BLOCK` (base64).
    pub secret_block: String,
}

/// The `RespondToAuthChallenge` fields proving knowledge of the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordClaim {
    /// Echo of the challenge's secret block.
    pub secret_block: String,
    /// Timestamp the signature covers.
    pub timestamp: String,
    /// Base64 HMAC-SHA256 signature.
    pub signature: String,
}

/// One client side of an SRP exchange.
pub struct SrpClient {
    a: BigUint,
    big_a: BigUint,
}

impl SrpClient {
    /// Creates a client with a fresh random ephemeral key.
    pub fn new() -> EvnexResult<Self> {
        let mut bytes = [0u8; EPHEMERAL_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::with_private_key(BigUint::from_bytes_be(&bytes))
    }

    /// Creates a client with a fixed ephemeral key.
    pub fn with_private_key(a: BigUint) -> EvnexResult<Self> {
        let big_a = G.modpow(&a, &N);
        if big_a == BigUint::default() {
            return Err(EvnexError::authentication("SRP public value A is zero mod N"));
        }
        Ok(Self { a, big_a })
    }

    /// `SRP_A` to send with `InitiateAuth`.
    pub fn public_key_hex(&self) -> String {
        format!("{:x}", self.big_a)
    }

    /// Derives the 16-byte password authentication key.
    pub fn authentication_key(
        &self,
        pool_name: &str,
        user_id: &str,
        password: &str,
        salt_hex: &str,
        srp_b_hex: &str,
    ) -> EvnexResult<Vec<u8>> {
        let big_b = parse_hex("SRP_B", srp_b_hex)?;
        if &big_b % &*N == BigUint::default() {
            return Err(EvnexError::authentication("SRP_B is zero mod N"));
        }

        let u = hash_hex_to_int(&format!("{}{}", pad_hex(&self.big_a), pad_hex(&big_b)));
        if u == BigUint::default() {
            return Err(EvnexError::authentication("SRP scrambling parameter is zero"));
        }

        let salt = parse_hex("SALT", salt_hex)?;
        let x = password_exponent(pool_name, user_id, password, &salt);

        let k_gx = (&*K * G.modpow(&x, &N)) % &*N;
        let base = ((&big_b % &*N) + &*N - k_gx) % &*N;
        let exponent = &self.a + &u * &x;
        let s = base.modpow(&exponent, &N);

        let prk = hmac_sha256(&hex_bytes(&pad_hex(&u)), &[hex_bytes(&pad_hex(&s)).as_slice()])?;
        let mut key = hmac_sha256(&prk, &[DERIVED_KEY_INFO, &[1u8][..]])?;
        key.truncate(16);
        Ok(key)
    }

    /// Computes the password claim answering a verifier challenge.
    pub fn password_claim(
        &self,
        pool_name: &str,
        password: &str,
        challenge: &VerifierChallenge,
        now: DateTime<Utc>,
    ) -> EvnexResult<PasswordClaim> {
        let key = self.authentication_key(
            pool_name,
            &challenge.user_id,
            password,
            &challenge.salt,
            &challenge.srp_b,
        )?;

        let secret_block = STANDARD
            .decode(&challenge.secret_block)
            .map_err(|e| EvnexError::authentication(format!("Invalid SECRET_BLOCK: {}", e)))?;
        let timestamp = format_timestamp(now);

        let signature = hmac_sha256(
            &key,
            &[
                pool_name.as_bytes(),
                challenge.user_id.as_bytes(),
                secret_block.as_slice(),
                timestamp.as_bytes(),
            ],
        )?;

        Ok(PasswordClaim {
            secret_block: challenge.secret_block.clone(),
            timestamp,
            signature: STANDARD.encode(signature),
        })
    }
}

impl std::fmt::Debug for SrpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpClient")
            .field("a", &Redacted::new(&self.a))
            .field("public_key_bits", &self.big_a.bits())
            .finish()
    }
}

/// Private exponent `x = H(salt | H(pool | user | ":" | password))`.
fn password_exponent(pool_name: &str, user_id: &str, password: &str, salt: &BigUint) -> BigUint {
    let identity = hex::encode(Sha256::digest(
        format!("{}{}:{}", pool_name, user_id, password).as_bytes(),
    ));
    hash_hex_to_int(&format!("{}{}", pad_hex(salt), identity))
}
