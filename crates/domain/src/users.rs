//! Account registration, login and lookup.

use common::{PageRequest, UserId};
use pwhash::bcrypt::{self, BcryptSetup};
use serde::Deserialize;
use storage::{NewUser, StorageError, User, UserDirectory, UserRole};

use crate::error::UserError;
use crate::token::{AccessToken, Claims, TokenIssuer};

/// bcrypt work factor used when none is configured.
pub const DEFAULT_HASH_COST: u32 = 10;

const MIN_PASSWORD_LEN: usize = 8;
/// bcrypt ignores everything past this many bytes.
const MAX_PASSWORD_LEN: usize = 72;
const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 100;

fn default_role() -> UserRole {
    UserRole::Staff
}

/// Body of a registration request. The role defaults to `staff`.
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
    if valid {
        Ok(email)
    } else {
        Err(UserError::InvalidRequest(format!("invalid email address: {email}")))
    }
}

fn check_password(password: &str) -> Result<(), UserError> {
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.len()) {
        return Err(UserError::InvalidRequest(format!(
            "password must be {MIN_PASSWORD_LEN} to {MAX_PASSWORD_LEN} bytes long"
        )));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), UserError> {
    if name.trim().is_empty() {
        return Err(UserError::InvalidRequest("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(UserError::InvalidRequest(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Service for admin and staff accounts.
///
/// Passwords are stored as bcrypt hashes. Hashing and verification run on
/// the blocking pool so they never stall the async workers.
pub struct UserService<S: UserDirectory> {
    store: S,
    tokens: TokenIssuer,
    hash_cost: u32,
}

impl<S: UserDirectory> UserService<S> {
    pub fn new(store: S, tokens: TokenIssuer) -> Self {
        Self {
            store,
            tokens,
            hash_cost: DEFAULT_HASH_COST,
        }
    }

    /// Overrides the bcrypt work factor (4 to 31).
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Creates an account.
    ///
    /// Anyone may register as staff. Registering an admin requires an admin
    /// caller, except for the very first admin of an empty directory.
    #[tracing::instrument(skip(self, request, caller), fields(email = %request.email, role = %request.role))]
    pub async fn register(
        &self,
        request: RegisterRequest,
        caller: Option<&Claims>,
    ) -> Result<User, UserError> {
        let email = normalize_email(&request.email)?;
        check_name(&request.name)?;
        check_password(&request.password)?;

        if request.role == UserRole::Admin && !self.may_create_admin(caller).await? {
            return Err(UserError::Forbidden(
                "only an admin can register another admin".to_string(),
            ));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(UserError::EmailTaken(email));
        }

        let password_hash = self.hash(request.password).await?;
        let created = match self
            .store
            .insert_user(NewUser {
                email: email.clone(),
                password_hash,
                name: request.name.trim().to_string(),
                role: request.role,
            })
            .await
        {
            Ok(created) => created,
            Err(StorageError::UniqueViolation { .. }) => return Err(UserError::EmailTaken(email)),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %created.id, role = %created.role, "user registered");
        Ok(created)
    }

    /// Exchanges an email and password for an access token.
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AccessToken, UserError> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            return Err(UserError::InvalidCredentials);
        };

        let hash = user.password_hash.clone();
        let password = request.password;
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| UserError::Credentials(e.to_string()))?;
        if !matches {
            tracing::warn!(user_id = %user.id, "login rejected");
            return Err(UserError::InvalidCredentials);
        }

        let token = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// Verifies a bearer token.
    pub fn authenticate(&self, token: &str) -> Result<Claims, UserError> {
        self.tokens.verify(token)
    }

    /// Loads the account behind a verified token.
    pub async fn get_me(&self, claims: &Claims) -> Result<User, UserError> {
        self.get_user(claims.sub).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, UserError> {
        self.store
            .find_user(id)
            .await?
            .ok_or(UserError::UserNotFound(id))
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Vec<User>, UserError> {
        page.validate().map_err(|field| {
            UserError::InvalidRequest(format!("invalid pagination parameter: {field}"))
        })?;
        Ok(self.store.list_users(page).await?)
    }

    async fn may_create_admin(&self, caller: Option<&Claims>) -> Result<bool, UserError> {
        if caller.is_some_and(|claims| claims.role == UserRole::Admin) {
            return Ok(true);
        }
        let first = !self.store.has_admin().await?;
        if first {
            tracing::warn!("no admin exists yet, accepting self-registered admin");
        }
        Ok(first)
    }

    async fn hash(&self, password: String) -> Result<String, UserError> {
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || {
            bcrypt::hash_with(
                BcryptSetup {
                    cost: Some(cost),
                    ..Default::default()
                },
                password,
            )
        })
        .await
        .map_err(|e| UserError::Credentials(e.to_string()))?
        .map_err(|e| UserError::Credentials(e.to_string()))
    }
}
