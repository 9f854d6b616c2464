//! Key Store (C2): generates, hashes, verifies, and revokes opaque bearer
//! tokens. Verifier hashing and prefix-indexed lookup are grounded on the
//! same shape used for personal-access-token auth elsewhere in this
//! codebase: argon2id with explicit parameters, a non-secret lookup prefix,
//! and a single generic "invalid key" error so the verifier never leaks
//! which failure case occurred.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use gateway_core::{GatewayError, GatewayResult};
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::db::Db;

pub const TOKEN_BASE_PREFIX: &str = "gwky";
const RANDOM_BODY_LEN: usize = 32;
pub const LOOKUP_PREFIX_LEN: usize = 12;

const ARGON2_M_COST: u32 = 19 * 1024; // 19 MiB, OWASP minimum for argon2id
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

fn argon2_instance() -> Argon2<'static> {
	let params =
		Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, None).expect("valid argon2 params");
	Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// A freshly minted plaintext token. Exposed exactly once, at creation; the
/// gateway never logs or persists it in cleartext.
pub struct PlaintextToken(SecretString);

impl PlaintextToken {
	pub fn expose(&self) -> &str {
		self.0.expose_secret()
	}
}

impl std::fmt::Debug for PlaintextToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "<redacted>")
	}
}

pub struct CreatedKey {
	pub key_id: Uuid,
	pub plaintext: PlaintextToken,
	pub prefix: String,
}

#[derive(Clone)]
pub struct KeyStore {
	db: Db,
}

impl KeyStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	/// Generate a new token, hash it, and persist it. The plaintext is
	/// returned to the caller exactly once; nothing else in the gateway ever
	/// sees it again.
	pub async fn create_key(
		&self,
		user_id: Uuid,
		label: Option<&str>,
	) -> GatewayResult<CreatedKey> {
		let random: String = {
			let mut rng = rand::thread_rng();
			(0..RANDOM_BODY_LEN)
				.map(|_| rng.sample(Alphanumeric) as char)
				.collect()
		};
		let plaintext = format!("{TOKEN_BASE_PREFIX}_{random}");
		let prefix: String = plaintext.chars().take(LOOKUP_PREFIX_LEN).collect();

		let salt = SaltString::generate(&mut OsRng);
		let hash = argon2_instance()
			.hash_password(plaintext.as_bytes(), &salt)
			.map_err(GatewayError::internal)?
			.to_string();

		let row = self.db.insert_key(user_id, &hash, &prefix, label).await?;

		Ok(CreatedKey {
			key_id: row.id,
			plaintext: PlaintextToken(SecretString::new(plaintext.into_boxed_str())),
			prefix: row.prefix,
		})
	}

	/// Verify a raw `Authorization: Bearer` value. Rejects malformed tokens
	/// (wrong fixed prefix, too short) without touching persistence. A
	/// persistence failure propagates as `GatewayError::Internal`; every
	/// other failure mode collapses to `GatewayError::Unauthorized` so the
	/// caller can't distinguish "wrong token" from "revoked" from "never
	/// existed".
	pub async fn verify(&self, token: &str) -> GatewayResult<(Uuid, Uuid)> {
		if !token.starts_with(&format!("{TOKEN_BASE_PREFIX}_")) {
			return Err(GatewayError::Unauthorized);
		}
		if token.len() < LOOKUP_PREFIX_LEN {
			return Err(GatewayError::Unauthorized);
		}
		let prefix: String = token.chars().take(LOOKUP_PREFIX_LEN).collect();

		let candidates = self.db.find_active_keys_by_prefix(&prefix).await?;
		for row in candidates {
			let parsed = match PasswordHash::new(&row.key_hash) {
				Ok(p) => p,
				// A corrupt hash on one candidate row must not abort the search.
				Err(_) => continue,
			};
			if argon2_instance()
				.verify_password(token.as_bytes(), &parsed)
				.is_ok()
			{
				self.db.touch_key_last_used(row.id).await?;
				return Ok((row.user_id, row.id));
			}
		}
		Err(GatewayError::Unauthorized)
	}

	pub async fn revoke(&self, key_id: Uuid) -> GatewayResult<bool> {
		self.db.revoke_key(key_id).await
	}

	pub async fn revoke_all_for_user(&self, user_id: Uuid) -> GatewayResult<()> {
		self.db.revoke_all_keys_for_user(user_id).await
	}
}

#[cfg(test)]
mod tests {
	use gateway_core::PersistenceTarget;

	use super::*;

	#[test]
	fn token_shape() {
		assert!(TOKEN_BASE_PREFIX.len() == 4);
		assert!(LOOKUP_PREFIX_LEN > TOKEN_BASE_PREFIX.len());
	}

	async fn test_db() -> (Db, tempfile::TempPath) {
		let file = tempfile::NamedTempFile::new().expect("temp file");
		let path = file.path().to_str().unwrap().to_string();
		let db = Db::connect(&PersistenceTarget::Sqlite(path))
			.await
			.expect("db connects and migrates");
		(db, file.into_temp_path())
	}

	#[tokio::test]
	async fn created_key_verifies_and_resolves_to_its_user() {
		let (db, _tmp) = test_db().await;
		let user = db.create_user(None, None).await.unwrap();
		let store = KeyStore::new(db);

		let created = store.create_key(user.id, Some("test key")).await.unwrap();
		let (verified_user, verified_key) = store.verify(created.plaintext.expose()).await.unwrap();
		assert_eq!(verified_user, user.id);
		assert_eq!(verified_key, created.key_id);
	}

	#[tokio::test]
	async fn wrong_token_is_rejected() {
		let (db, _tmp) = test_db().await;
		let user = db.create_user(None, None).await.unwrap();
		let store = KeyStore::new(db);
		let created = store.create_key(user.id, None).await.unwrap();

		let mut tampered = created.plaintext.expose().to_string();
		tampered.push('x');
		assert!(store.verify(&tampered).await.is_err());
	}

	#[tokio::test]
	async fn malformed_tokens_are_rejected_without_touching_the_database() {
		let (db, _tmp) = test_db().await;
		let store = KeyStore::new(db);
		assert!(store.verify("not-a-gateway-key").await.is_err());
		assert!(store.verify("gwky_").await.is_err());
	}

	#[tokio::test]
	async fn revoked_key_no_longer_verifies() {
		let (db, _tmp) = test_db().await;
		let user = db.create_user(None, None).await.unwrap();
		let store = KeyStore::new(db);
		let created = store.create_key(user.id, None).await.unwrap();

		assert!(store.revoke(created.key_id).await.unwrap());
		assert!(store.verify(created.plaintext.expose()).await.is_err());
	}

	#[tokio::test]
	async fn revoke_all_for_user_blocks_every_key() {
		let (db, _tmp) = test_db().await;
		let user = db.create_user(None, None).await.unwrap();
		let store = KeyStore::new(db);
		let first = store.create_key(user.id, None).await.unwrap();
		let second = store.create_key(user.id, None).await.unwrap();

		store.revoke_all_for_user(user.id).await.unwrap();
		assert!(store.verify(first.plaintext.expose()).await.is_err());
		assert!(store.verify(second.plaintext.expose()).await.is_err());
	}
}
