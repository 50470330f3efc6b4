use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::infra::db::{Db, PgTx};

const TOKEN_ISSUER: &str = "vitrina";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// Key material and lifetimes for PASETO v4.local session tokens.
#[derive(Clone, Copy)]
pub struct SessionKeys {
    pub access_key: [u8; 32],
    pub refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
}

impl SessionKeys {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            access_key: config.access_key,
            refresh_key: config.refresh_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
        }
    }

    fn key(&self, kind: TokenKind) -> [u8; 32] {
        match kind {
            TokenKind::Access => self.access_key,
            TokenKind::Refresh => self.refresh_key,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => Duration::minutes(self.access_ttl_minutes as i64),
            TokenKind::Refresh => Duration::days(self.refresh_ttl_days as i64),
        }
    }
}

/// Each kind is sealed with its own key and carries its name in `typ`, so
/// one can never be presented as the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

struct SealedToken {
    token: String,
    expires_at: OffsetDateTime,
}

struct IssuedTokens {
    refresh_id: Uuid,
    pair: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    keys: SessionKeys,
}

impl AuthService {
    pub fn new(db: Db, keys: SessionKeys) -> Self {
        Self { db, keys }
    }

    /// `identifier` matches either the email or the handle.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Option<TokenPair>> {
        let row = sqlx::query(
            "SELECT id, password_hash FROM users \
             WHERE (email = $1 OR handle = $1) AND deleted_at IS NULL",
        )
        .bind(identifier)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() || !verify_password(password, &password_hash)? {
            tracing::debug!(user_id = %user_id, "login rejected");
            return Ok(None);
        }

        self.issue_token_pair(user_id).await.map(Some)
    }

    /// Rotates a refresh token: the presented one is revoked and linked to
    /// its replacement in the same transaction.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Option<TokenPair>> {
        let Some((user_id, refresh_id)) = self.refresh_subject(refresh_token)? else {
            return Ok(None);
        };

        let mut tx = self.db.begin().await?;
        let live = sqlx::query(
            "SELECT id FROM refresh_tokens \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 \
               AND revoked_at IS NULL AND expires_at > now() \
             FOR UPDATE",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .fetch_optional(&mut *tx)
        .await?;

        if live.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let issued = self.issue_with_tx(user_id, &mut tx).await?;
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now(), replaced_by = $1 \
             WHERE id = $2 AND revoked_at IS NULL",
        )
        .bind(issued.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(issued.pair))
    }

    /// Returns false when the token is unknown, forged or already revoked.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<bool> {
        let Some((user_id, refresh_id)) = self.refresh_subject(refresh_token)? else {
            return Ok(false);
        };

        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pure token check; no database access, so anonymous and forged requests
    /// are rejected before any query runs.
    pub fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        match self.open(TokenKind::Access, token)? {
            Some(claims) => Ok(Some(AuthSession {
                user_id: claim_uuid(&claims, "sub")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let mut tx = self.db.begin().await?;
        let issued = self.issue_with_tx(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(issued.pair)
    }

    async fn issue_with_tx(&self, user_id: Uuid, tx: &mut PgTx<'_>) -> Result<IssuedTokens> {
        let refresh_id = Uuid::new_v4();
        let access = self.seal(TokenKind::Access, user_id, None)?;
        let refresh = self.seal(TokenKind::Refresh, user_id, Some(refresh_id))?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(&refresh.token))
        .bind(refresh.expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(IssuedTokens {
            refresh_id,
            pair: TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                access_expires_at: access.expires_at,
                refresh_expires_at: refresh.expires_at,
            },
        })
    }

    fn seal(&self, kind: TokenKind, user_id: Uuid, token_id: Option<Uuid>) -> Result<SealedToken> {
        let ttl = self.keys.ttl(kind);
        let mut claims = Claims::new_expires_in(&std::time::Duration::try_from(ttl)?)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        if let Some(token_id) = token_id {
            claims.token_identifier(&token_id.to_string())?;
        }
        claims.add_additional("typ", kind.as_str())?;

        let key = SymmetricKey::<V4>::from(&self.keys.key(kind))?;
        Ok(SealedToken {
            token: local::encrypt(&key, &claims, None, None)?,
            expires_at: OffsetDateTime::now_utc() + ttl,
        })
    }

    /// `Ok(None)` for anything that does not decrypt under the kind's key,
    /// fails issuer, audience or expiry checks, or carries another `typ`.
    fn open(&self, kind: TokenKind, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.keys.key(kind))?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let Ok(untrusted) = UntrustedToken::<Local, V4>::try_from(token) else {
            return Ok(None);
        };
        let Ok(trusted) = local::decrypt(&key, &untrusted, &rules, None, None) else {
            return Ok(None);
        };

        Ok(trusted
            .payload_claims()
            .filter(|claims| has_token_type(claims, kind))
            .cloned())
    }

    fn refresh_subject(&self, token: &str) -> Result<Option<(Uuid, Uuid)>> {
        match self.open(TokenKind::Refresh, token)? {
            Some(claims) => Ok(Some((claim_uuid(&claims, "sub")?, claim_uuid(&claims, "jti")?))),
            None => Ok(None),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {}", err))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Refresh tokens are stored as their SHA-256 digest only.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, kind: TokenKind) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .is_some_and(|value| value == kind.as_str())
}
