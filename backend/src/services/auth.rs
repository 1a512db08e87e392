//! Login and token verification.
//!
//! Passwords are stored as hex SHA-256. Tokens are not signed: a token is
//! `base64("{usuario_id}:{epoch_millis}")` and is accepted while younger than
//! the configured TTL and while the user stays active.

use super::ServiceError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use evento_core::environment::Clock;
use evento_core::repository::UsuarioRepository;
use evento_core::types::{Usuario, UsuarioId};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::sync::Arc;

/// Issues and verifies login tokens.
pub struct AuthService {
    usuarios: Arc<dyn UsuarioRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

/// Hex SHA-256 of a password, the stored form.
#[must_use]
pub fn hash_password(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

fn emitir(usuario: UsuarioId, now: DateTime<Utc>) -> String {
    STANDARD.encode(format!("{usuario}:{}", now.timestamp_millis()))
}

fn decodificar(token: &str) -> Option<(UsuarioId, DateTime<Utc>)> {
    let bytes = STANDARD.decode(token.trim()).ok()?;
    let texto = String::from_utf8(bytes).ok()?;
    let (id, millis) = texto.split_once(':')?;
    let emitido = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
    Some((UsuarioId(id.parse().ok()?), emitido))
}

impl AuthService {
    /// Creates the service; tokens live for `ttl`.
    #[must_use]
    pub fn new(usuarios: Arc<dyn UsuarioRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { usuarios, clock, ttl }
    }

    /// Checks credentials and issues a token.
    ///
    /// # Errors
    ///
    /// [`ServiceError::CredencialesInvalidas`] for an unknown or inactive
    /// user or a wrong password.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<String, ServiceError> {
        let usuario = self
            .usuarios
            .find_by_login(login)
            .await?
            .filter(|u| u.activo)
            .ok_or(ServiceError::CredencialesInvalidas)?;

        if !usuario.password_hash.eq_ignore_ascii_case(&hash_password(password)) {
            tracing::info!(usuario = %usuario.id, "Rejected login");
            return Err(ServiceError::CredencialesInvalidas);
        }

        tracing::info!(usuario = %usuario.id, "User logged in");
        Ok(emitir(usuario.id, self.clock.now()))
    }

    /// Resolves the user behind a token.
    ///
    /// # Errors
    ///
    /// [`ServiceError::TokenInvalido`] for a malformed, expired or future
    /// token, or one whose user is gone or inactive.
    pub async fn autenticar(&self, token: &str) -> Result<Usuario, ServiceError> {
        let (id, emitido) = decodificar(token).ok_or(ServiceError::TokenInvalido)?;
        let edad = self.clock.now() - emitido;
        if edad < Duration::zero() || edad > self.ttl {
            tracing::debug!(usuario = %id, "Expired token");
            return Err(ServiceError::TokenInvalido);
        }

        self.usuarios
            .find(id)
            .await?
            .filter(|u| u.activo)
            .ok_or(ServiceError::TokenInvalido)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use evento_testing::fixtures::usuario;
    use evento_testing::{InMemoryUsuarios, ManualClock, test_time};

    fn service(clock: &ManualClock) -> AuthService {
        let usuarios = Arc::new(InMemoryUsuarios::new());
        usuarios.insert(usuario(2, "user", false));
        let mut inactivo = usuario(5, "baja", false);
        inactivo.activo = false;
        usuarios.insert(inactivo);
        AuthService::new(usuarios, Arc::new(clock.clone()), Duration::hours(24))
    }

    #[test]
    fn password_hash_matches_seed_users() {
        assert_eq!(
            hash_password("admin"),
            "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918"
        );
        assert_eq!(
            hash_password("user"),
            "04f8996da763b7a969b1028ee3007569eaf3a635486ddab211d512c85b9df8fb"
        );
    }

    #[tokio::test]
    async fn token_resolves_to_its_user() {
        let clock = ManualClock::new(test_time());
        let auth = service(&clock);

        let token = auth.login("user", "user").await.unwrap();
        assert_eq!(token, STANDARD.encode(format!("2:{}", test_time().timestamp_millis())));

        clock.advance(Duration::hours(23));
        assert_eq!(auth.autenticar(&token).await.unwrap().id, UsuarioId(2));
    }

    #[tokio::test]
    async fn wrong_password_and_inactive_users_are_rejected() {
        let clock = ManualClock::new(test_time());
        let auth = service(&clock);

        assert!(matches!(
            auth.login("user", "otra").await,
            Err(ServiceError::CredencialesInvalidas)
        ));
        assert!(matches!(
            auth.login("baja", "user").await,
            Err(ServiceError::CredencialesInvalidas)
        ));
        assert!(matches!(
            auth.login("nadie", "user").await,
            Err(ServiceError::CredencialesInvalidas)
        ));
    }

    #[tokio::test]
    async fn stale_forged_and_garbage_tokens_are_rejected() {
        let clock = ManualClock::new(test_time());
        let auth = service(&clock);
        let token = auth.login("user", "user").await.unwrap();

        clock.advance(Duration::hours(25));
        assert!(matches!(auth.autenticar(&token).await, Err(ServiceError::TokenInvalido)));

        let futuro = emitir(UsuarioId(2), clock.now() + Duration::hours(1));
        assert!(matches!(auth.autenticar(&futuro).await, Err(ServiceError::TokenInvalido)));

        let inactivo = emitir(UsuarioId(5), clock.now());
        assert!(matches!(auth.autenticar(&inactivo).await, Err(ServiceError::TokenInvalido)));

        let basura = [
            String::new(),
            "no-base64!".to_string(),
            STANDARD.encode("2"),
            STANDARD.encode("x:1"),
        ];
        for token in &basura {
            assert!(matches!(auth.autenticar(token).await, Err(ServiceError::TokenInvalido)));
        }
    }
}
