//! SRP6 password exchange math used by the login tier.
//!
//! The client proves knowledge of a password-derived secret without ever
//! sending the password or an equivalent; the server stores only a verifier.
//! All digests are SHA-1 over minimal big-endian integer encodings. On the
//! wire the big integers travel little-endian, so both directions reverse the
//! bytes before arithmetic; see [`ephemeral_from_wire`] and [`ephemeral_to_wire`].
//!
//! A client-side implementation lives here too; the login tier never uses it,
//! but the integration tests (and any bot tooling) drive the full exchange
//! with it.

use crate::{normalize_username, SessionKey, EPHEMERAL_LENGTH, PROOF_LENGTH, SALT_LENGTH, SESSION_KEY_LENGTH};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Generator of the multiplicative group.
pub const GENERATOR: u8 = 7;

/// Multiplier parameter k from SRP6.
const MULTIPLIER: u32 = 3;

/// Byte width of the random private ephemeral.
const PRIVATE_EPHEMERAL_BYTES: usize = 19;

// 256-bit safe prime, big-endian hex.
const PRIME_HEX: &[u8] = b"B79B3E2A87823CAB8F5EBFBF8EB10108535006298B5BADBD5B53E1895E644B89";

/// The group safe prime N.
pub fn group_prime() -> BigUint {
    BigUint::parse_bytes(PRIME_HEX, 16).expect("group prime constant")
}

/// Generates a fresh random salt for account registration.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derives the private exponent x from the credentials and salt.
fn credentials_hash(username: &str, password: &str, salt: &[u8; SALT_LENGTH]) -> BigUint {
    let identity = format!(
        "{}:{}",
        normalize_username(username),
        password.to_uppercase()
    );
    let inner = Sha1::digest(identity.as_bytes());

    let mut outer = Sha1::new();
    outer.update(salt);
    outer.update(inner);
    BigUint::from_bytes_be(&outer.finalize())
}

/// Derives the stored password verifier v = g^x mod N.
///
/// Run at registration time; the password itself is never stored.
pub fn generate_verifier(username: &str, password: &str, salt: &[u8; SALT_LENGTH]) -> BigUint {
    let n = group_prime();
    let g = BigUint::from(GENERATOR);
    g.modpow(&credentials_hash(username, password, salt), &n)
}

/// Converts an internal big-endian integer to its little-endian wire form.
pub fn ephemeral_to_wire(value: &BigUint) -> [u8; EPHEMERAL_LENGTH] {
    let big_endian = value.to_bytes_be();
    let mut wire = [0u8; EPHEMERAL_LENGTH];
    // reverse into the buffer; the unwritten tail is the zero padding
    for (slot, byte) in wire.iter_mut().zip(big_endian.iter().rev()) {
        *slot = *byte;
    }
    wire
}

/// Reverses a little-endian wire buffer back into an integer.
pub fn ephemeral_from_wire(wire: &[u8; EPHEMERAL_LENGTH]) -> BigUint {
    let mut big_endian = *wire;
    big_endian.reverse();
    BigUint::from_bytes_be(&big_endian)
}

fn sha1_concat(parts: &[&[u8]]) -> [u8; PROOF_LENGTH] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// The scrambling parameter u = SHA1(A | B).
fn scrambler(a_pub: &BigUint, b_pub: &BigUint) -> BigUint {
    BigUint::from_bytes_be(&sha1_concat(&[&a_pub.to_bytes_be(), &b_pub.to_bytes_be()]))
}

/// Derives the 40-byte session key from the premaster secret by hashing the
/// even and odd byte halves separately and interleaving the digests.
fn interleaved_key(premaster: &BigUint) -> SessionKey {
    let mut bytes = premaster.to_bytes_be();
    if bytes.len() % 2 == 1 {
        bytes.insert(0, 0);
    }
    while bytes.len() >= 2 && bytes[0] == 0 && bytes[1] == 0 {
        bytes.drain(0..2);
    }

    let even: Vec<u8> = bytes.iter().step_by(2).copied().collect();
    let odd: Vec<u8> = bytes.iter().skip(1).step_by(2).copied().collect();
    let even_digest = Sha1::digest(&even);
    let odd_digest = Sha1::digest(&odd);

    let mut key = [0u8; SESSION_KEY_LENGTH];
    for i in 0..PROOF_LENGTH {
        key[2 * i] = even_digest[i];
        key[2 * i + 1] = odd_digest[i];
    }
    SessionKey(key)
}

/// Recomputes the client proof M1 from public exchange material and the
/// derived session key.
pub fn client_proof(
    username: &str,
    session_key: &SessionKey,
    a_pub: &BigUint,
    b_pub: &BigUint,
    salt: &[u8; SALT_LENGTH],
) -> [u8; PROOF_LENGTH] {
    let n_digest = Sha1::digest(group_prime().to_bytes_be());
    let g_digest = Sha1::digest([GENERATOR]);
    let mut group_digest = [0u8; PROOF_LENGTH];
    for i in 0..PROOF_LENGTH {
        group_digest[i] = n_digest[i] ^ g_digest[i];
    }

    let username_digest = Sha1::digest(normalize_username(username).as_bytes());

    sha1_concat(&[
        &group_digest,
        &username_digest,
        salt,
        &a_pub.to_bytes_be(),
        &b_pub.to_bytes_be(),
        session_key.as_bytes(),
    ])
}

/// Computes the server proof M2 = SHA1(A | M1 | K).
pub fn server_proof(
    a_pub: &BigUint,
    client_proof: &[u8; PROOF_LENGTH],
    session_key: &SessionKey,
) -> [u8; PROOF_LENGTH] {
    sha1_concat(&[&a_pub.to_bytes_be(), client_proof, session_key.as_bytes()])
}

/// Outcome of a consumed exchange: whether the submitted proof matched, the
/// derived key, and the server proof that goes back to the client either way.
pub struct ExchangeProof {
    pub matched: bool,
    pub session_key: SessionKey,
    pub server_proof: [u8; PROOF_LENGTH],
}

/// Server side of one password exchange.
///
/// Holds the private ephemeral for exactly one attempt; [`SrpServer::verify`]
/// consumes the value so the ephemeral cannot be reused.
pub struct SrpServer {
    verifier: BigUint,
    salt: [u8; SALT_LENGTH],
    private_ephemeral: BigUint,
    public_ephemeral: BigUint,
}

impl SrpServer {
    pub fn new(verifier: BigUint, salt: [u8; SALT_LENGTH]) -> Self {
        let mut raw = [0u8; PRIVATE_EPHEMERAL_BYTES];
        OsRng.fill_bytes(&mut raw);
        Self::with_private_ephemeral(verifier, salt, BigUint::from_bytes_be(&raw))
    }

    /// Deterministic constructor for tests with a caller-supplied ephemeral.
    pub fn with_private_ephemeral(
        verifier: BigUint,
        salt: [u8; SALT_LENGTH],
        private_ephemeral: BigUint,
    ) -> Self {
        let n = group_prime();
        let g = BigUint::from(GENERATOR);
        let k = BigUint::from(MULTIPLIER);

        // B = (k*v + g^b) mod N
        let public_ephemeral = (&k * &verifier + g.modpow(&private_ephemeral, &n)) % &n;

        Self {
            verifier,
            salt,
            private_ephemeral,
            public_ephemeral,
        }
    }

    pub fn public_ephemeral(&self) -> &BigUint {
        &self.public_ephemeral
    }

    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    /// Verifies the client's proof and derives the session key, consuming the
    /// exchange. The returned server proof is computed over the proof the
    /// client actually submitted, so it is valid to send even on mismatch.
    pub fn verify(
        self,
        username: &str,
        client_public: &BigUint,
        submitted_proof: &[u8; PROOF_LENGTH],
    ) -> ExchangeProof {
        let n = group_prime();

        // A mod N == 0 would force a zero premaster; treat as a bad proof
        let reduced = client_public % &n;
        let u = scrambler(client_public, &self.public_ephemeral);

        // S = (A * v^u)^b mod N
        let premaster = if reduced.is_zero() {
            BigUint::zero()
        } else {
            (client_public * self.verifier.modpow(&u, &n))
                .modpow(&self.private_ephemeral, &n)
        };

        let session_key = interleaved_key(&premaster);
        let expected = client_proof(
            username,
            &session_key,
            client_public,
            &self.public_ephemeral,
            &self.salt,
        );

        let matched = !reduced.is_zero() && bool::from(expected[..].ct_eq(&submitted_proof[..]));
        let server_proof = server_proof(client_public, submitted_proof, &session_key);

        ExchangeProof {
            matched,
            session_key,
            server_proof,
        }
    }
}

/// Client side of the exchange. Production code never runs this; it exists
/// for integration tests and load tooling.
pub struct SrpClient {
    username: String,
    password: String,
    private_ephemeral: BigUint,
    public_ephemeral: BigUint,
}

impl SrpClient {
    pub fn new(username: &str, password: &str) -> Self {
        let mut raw = [0u8; PRIVATE_EPHEMERAL_BYTES];
        OsRng.fill_bytes(&mut raw);
        Self::with_private_ephemeral(username, password, BigUint::from_bytes_be(&raw))
    }

    pub fn with_private_ephemeral(username: &str, password: &str, private_ephemeral: BigUint) -> Self {
        let n = group_prime();
        let g = BigUint::from(GENERATOR);
        let public_ephemeral = g.modpow(&private_ephemeral, &n);

        Self {
            username: username.to_string(),
            password: password.to_string(),
            private_ephemeral,
            public_ephemeral,
        }
    }

    pub fn public_ephemeral(&self) -> &BigUint {
        &self.public_ephemeral
    }

    /// Processes the server challenge, producing the session key and the
    /// proof M1 to submit.
    pub fn process_challenge(
        &self,
        salt: &[u8; SALT_LENGTH],
        server_public: &BigUint,
    ) -> (SessionKey, [u8; PROOF_LENGTH]) {
        let n = group_prime();
        let g = BigUint::from(GENERATOR);
        let k = BigUint::from(MULTIPLIER);

        let x = credentials_hash(&self.username, &self.password, salt);
        let u = scrambler(&self.public_ephemeral, server_public);

        // S = (B - k*g^x) ^ (a + u*x) mod N
        let kgx = (&k * g.modpow(&x, &n)) % &n;
        let base = (server_public + &n - kgx) % &n;
        let exponent = &self.private_ephemeral + &u * &x;
        let premaster = base.modpow(&exponent, &n);

        let session_key = interleaved_key(&premaster);
        let proof = client_proof(
            &self.username,
            &session_key,
            &self.public_ephemeral,
            server_public,
            salt,
        );
        (session_key, proof)
    }
}
