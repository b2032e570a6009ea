//! [`PasswordHasher`] implementations.

use std::fmt;

use argon2::password_hash::{
    self, rand_core::OsRng, PasswordHasher as _, PasswordVerifier as _,
    SaltString,
};
use derive_more::{Display, Error, From};
use tracing as log;

use crate::domain::user::{Password, PasswordHash};

/// Hasher and verifier of [`Password`]s.
pub trait PasswordHasher: fmt::Debug + Send + Sync {
    /// Hashes the provided [`Password`] with a fresh salt.
    ///
    /// # Errors
    ///
    /// If hashing fails.
    fn hash(&self, password: &Password) -> Result<PasswordHash, HashError>;

    /// Checks whether the provided [`Password`] matches the [`PasswordHash`].
    ///
    /// Malformed hashes never match.
    fn verify(&self, password: &Password, hash: &PasswordHash) -> bool;

    /// Spends as much time as [`PasswordHasher::verify()`] does, for a login
    /// having no [`PasswordHash`] to check against.
    fn verify_absent(&self, password: &Password);
}

/// Well-formed [Argon2id] hash with default parameters matching no password.
///
/// [Argon2id]: https://datatracker.ietf.org/doc/html/rfc9106
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1\
                          $qLN9wn048IrPThDuGEYI9Q\
                          $299EChthCkqTJSD1S2TsmX6zhESVsDWtBh3+gnTgqTc";

/// [Argon2id] [`PasswordHasher`] with default parameters.
///
/// [Argon2id]: https://datatracker.ietf.org/doc/html/rfc9106
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2;

impl PasswordHasher for Argon2 {
    fn hash(&self, password: &Password) -> Result<PasswordHash, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(argon2::Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string()
            .into())
    }

    fn verify(&self, password: &Password, hash: &PasswordHash) -> bool {
        let hash = match password_hash::PasswordHash::new(hash.as_ref()) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("stored password hash is malformed: {e}");
                return false;
            }
        };
        argon2::Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    }

    fn verify_absent(&self, password: &Password) {
        _ = self.verify(password, &PasswordHash::from(DUMMY_HASH.to_owned()));
    }
}

/// Error of hashing a [`Password`].
#[derive(Debug, Display, Error, From)]
#[display("failed to hash password: {_0}")]
pub struct HashError(#[error(not(source))] password_hash::Error);

#[cfg(test)]
mod spec {
    use argon2::password_hash;

    use crate::domain::user::{Password, PasswordHash};

    use super::{Argon2, PasswordHasher as _, DUMMY_HASH};

    #[test]
    fn verifies_only_the_hashed_password() {
        let hash = Argon2.hash(&Password::from("correct horse")).unwrap();

        assert!(hash.as_ref().starts_with("$argon2id$"));
        assert!(Argon2.verify(&Password::from("correct horse"), &hash));
        assert!(!Argon2.verify(&Password::from("battery staple"), &hash));
    }

    #[test]
    fn salts_every_hash() {
        let password = Password::from("secret");

        assert_ne!(
            Argon2.hash(&password).unwrap(),
            Argon2.hash(&password).unwrap(),
        );
    }

    #[test]
    fn malformed_hash_never_matches() {
        let hash = PasswordHash::from("not-a-phc-string".to_owned());

        assert!(!Argon2.verify(&Password::from("not-a-phc-string"), &hash));
    }

    #[test]
    fn dummy_hash_costs_as_much_as_real_one() {
        let real = Argon2.hash(&Password::from("secret")).unwrap();
        let real = password_hash::PasswordHash::new(real.as_ref()).unwrap();
        let dummy = password_hash::PasswordHash::new(DUMMY_HASH).unwrap();

        assert_eq!(dummy.algorithm.to_string(), real.algorithm.to_string());
        assert_eq!(dummy.version, real.version);
        assert_eq!(dummy.params.to_string(), real.params.to_string());
        assert!(!Argon2.verify(
            &Password::from("secret"),
            &PasswordHash::from(DUMMY_HASH.to_owned()),
        ));
    }
}
