//! Authentication against the directory.
//!
//! The [`Authenticator`] resolves an `Authorization` header to a user:
//!
//! * `Basic` credentials are checked against the built-in administrator
//!   (whose password lives in the settings store) or against an employee
//!   that is a member of the admin group
//! * `Bearer` tokens issued by an earlier login are verified and renewed
//!
//! Members of the inactive group are always refused. A failed bind while
//! checking is returned as `Err`, never as a failed login.
//!
//! # Default administrator
//!
//! The first login attempt with the configured administrator name, while no
//! administrator password is stored, generates a random password, stores it
//! as plain text under [`DEFAULT_ADMIN_PASSWORD_KEY`] and enables the
//! account. An operator reads the password from the settings store and
//! should replace it with [`Authenticator::set_default_admin_password`],
//! which stores it hashed.
//!
//! # Example Usage
//!
//! ```rust
//! use directory_store::auth::{AuthOutcome, Authenticator, HmacTokenIssuer, basic_header};
//! use directory_store::config::StoreConfig;
//! use directory_store::directory::InMemoryDirectory;
//! use directory_store::store::ValueStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::default().with_root_dn("dc=school,dc=example");
//! let directory = InMemoryDirectory::new("dc=school,dc=example");
//! let issuer = HmacTokenIssuer::with_random_key(config.auth.token_issuer.clone());
//! let authenticator = Authenticator::new(directory.clone(), &config, issuer);
//!
//! // First attempt bootstraps the administrator password.
//! let header = basic_header("admin", "guess");
//! authenticator.authenticate(Some(&header)).await?;
//!
//! let values = ValueStore::new(directory, &config);
//! let password = values.get("default_admin_password").await?.unwrap();
//! let header = basic_header("admin", &password);
//! assert!(matches!(
//!     authenticator.authenticate(Some(&header)).await?,
//!     AuthOutcome::Success { .. }
//! ));
//! # Ok(())
//! # }
//! ```

pub mod credential;
pub mod token;

pub use credential::{Credential, CredentialError};
pub use token::{HmacTokenIssuer, TokenClaims, TokenError, TokenIssuer};

use crate::config::{AuthConfig, StoreConfig};
use crate::directory::DirectoryGateway;
use crate::entity::Employee;
use crate::error::StoreResult;
use crate::result::OperationResult;
use crate::store::{EntityStore, GroupStore, ValueStore};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, error, info, warn};
use rand::Rng;
use rand::distributions::Alphanumeric;
use subtle::ConstantTimeEq;

/// Settings key holding the administrator password, plain or encoded.
pub const DEFAULT_ADMIN_PASSWORD_KEY: &str = "default_admin_password";

/// Settings key holding `"true"` while the administrator may log in.
pub const DEFAULT_ADMIN_ENABLED_KEY: &str = "default_admin_enabled";

/// Length of a generated administrator password.
pub const GENERATED_PASSWORD_LEN: usize = 20;

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No `Authorization` header was sent.
    MissingHeader,
    /// The header is not `Basic base64(user:password)` or `Bearer <token>`.
    InvalidHeader,
    /// The bearer token is forged, foreign or expired.
    InvalidToken,
    /// The user is known but not allowed in.
    Forbidden,
    WrongCredentials,
    /// A stored credential is corrupt, or no token could be issued.
    InternalError,
    /// Authenticated; `token` is a fresh session token for `username`.
    Success { username: String, token: String },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Result form: the username as value and the token attached.
    pub fn into_result(self) -> OperationResult<String> {
        match self {
            Self::Success { username, token } => {
                OperationResult::ok(vec![username]).with_new_token(token)
            }
            Self::MissingHeader => OperationResult::unauthorized("Missing Authorization header"),
            Self::InvalidHeader => OperationResult::unauthorized("Invalid Authorization header"),
            Self::InvalidToken => OperationResult::unauthorized("Invalid or expired token"),
            Self::WrongCredentials => OperationResult::unauthorized("Wrong username or password"),
            Self::Forbidden => OperationResult::forbidden("Access denied"),
            Self::InternalError => OperationResult::internal_error("Authentication failed"),
        }
    }
}

enum Presented {
    Basic { username: String, password: String },
    Bearer(String),
}

fn parse_header(header: &str) -> Option<Presented> {
    let (scheme, value) = header.trim().split_once(' ')?;
    let value = value.trim();
    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(value).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Presented::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    } else if scheme.eq_ignore_ascii_case("bearer") && !value.is_empty() {
        Some(Presented::Bearer(value.to_string()))
    } else {
        None
    }
}

/// Plain or encoded stored password against a presented one.
fn matches_stored(stored: &str, password: &str) -> Result<bool, CredentialError> {
    if Credential::is_encoded(stored) {
        let credential: Credential = stored.parse()?;
        Ok(credential.check_password(password))
    } else {
        Ok(stored.as_bytes().ct_eq(password.as_bytes()).into())
    }
}

/// `Basic` header value for the given credentials.
pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Checks credentials and issues session tokens.
pub struct Authenticator<G, I> {
    employees: EntityStore<G, Employee>,
    groups: GroupStore<G>,
    values: ValueStore<G>,
    issuer: I,
    config: AuthConfig,
}

impl<G: DirectoryGateway + Clone, I: TokenIssuer> Authenticator<G, I> {
    pub fn new(gateway: G, config: &StoreConfig, issuer: I) -> Self {
        Self {
            employees: EntityStore::new(gateway.clone(), config),
            groups: GroupStore::new(gateway.clone(), config),
            values: ValueStore::new(gateway, config),
            issuer,
            config: config.auth.clone(),
        }
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    /// Authenticate one request from its `Authorization` header.
    pub async fn authenticate(&self, header: Option<&str>) -> StoreResult<AuthOutcome> {
        let Some(header) = header else {
            debug!("Authentication without Authorization header");
            return Ok(AuthOutcome::MissingHeader);
        };
        match parse_header(header) {
            None => {
                debug!("Malformed Authorization header");
                Ok(AuthOutcome::InvalidHeader)
            }
            Some(Presented::Basic { username, password }) => {
                self.authenticate_basic(&username, &password).await
            }
            Some(Presented::Bearer(token)) => self.authenticate_bearer(&token).await,
        }
    }

    fn is_default_admin(&self, username: &str) -> bool {
        username == self.config.default_admin_name
    }

    async fn authenticate_basic(&self, username: &str, password: &str) -> StoreResult<AuthOutcome> {
        debug!("Basic authentication for '{}'", username);

        if self.is_default_admin(username) {
            return self.authenticate_default_admin(username, password).await;
        }

        if self.groups.is_member(&self.config.inactive_group, username).await? {
            info!("Refusing inactive user '{}'", username);
            return Ok(AuthOutcome::Forbidden);
        }

        if self.groups.is_member(&self.config.admin_group, username).await? {
            let result = self.employees.get(&username.to_string(), true).await?;
            if let Some(employee) = result.value() {
                let Some(stored) = employee.password.as_deref() else {
                    debug!("Employee '{}' has no stored credential", username);
                    return Ok(AuthOutcome::WrongCredentials);
                };
                return Ok(match stored.parse::<Credential>() {
                    Ok(credential) if credential.check_password(password) => {
                        self.success(username)
                    }
                    Ok(_) => {
                        debug!("Wrong password for '{}'", username);
                        AuthOutcome::WrongCredentials
                    }
                    Err(e) => {
                        error!("Stored credential of '{}' is unusable: {}", username, e);
                        AuthOutcome::InternalError
                    }
                });
            }
            debug!("Admin group member '{}' has no employee record", username);
        }

        Ok(AuthOutcome::WrongCredentials)
    }

    async fn authenticate_default_admin(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<AuthOutcome> {
        let stored = match self.values.get(DEFAULT_ADMIN_PASSWORD_KEY).await? {
            Some(stored) => stored,
            None => match self.bootstrap_default_admin().await? {
                Some(generated) => generated,
                None => return Ok(AuthOutcome::InternalError),
            },
        };

        if !self.default_admin_enabled().await? {
            info!("Refusing disabled default administrator");
            return Ok(AuthOutcome::Forbidden);
        }

        Ok(match matches_stored(&stored, password) {
            Ok(true) => self.success(username),
            Ok(false) => {
                debug!("Wrong password for default administrator");
                AuthOutcome::WrongCredentials
            }
            Err(e) => {
                error!("Stored default administrator password is unusable: {}", e);
                AuthOutcome::InternalError
            }
        })
    }

    /// Generate, store and enable the administrator password.
    async fn bootstrap_default_admin(&self) -> StoreResult<Option<String>> {
        let generated = generate_password();
        if !self.values.set(DEFAULT_ADMIN_PASSWORD_KEY, &generated).await? {
            error!("Failed to store generated default administrator password");
            return Ok(None);
        }
        if !self.values.set(DEFAULT_ADMIN_ENABLED_KEY, "true").await? {
            error!("Failed to enable default administrator");
            return Ok(None);
        }
        warn!(
            "Default administrator '{}' bootstrapped; password stored under '{}'",
            self.config.default_admin_name, DEFAULT_ADMIN_PASSWORD_KEY
        );
        Ok(Some(generated))
    }

    async fn default_admin_enabled(&self) -> StoreResult<bool> {
        Ok(self
            .values
            .get(DEFAULT_ADMIN_ENABLED_KEY)
            .await?
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")))
    }

    async fn authenticate_bearer(&self, token: &str) -> StoreResult<AuthOutcome> {
        let claims = match self.issuer.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Rejecting bearer token: {}", e);
                return Ok(AuthOutcome::InvalidToken);
            }
        };
        let username = claims.subject.as_str();
        debug!("Bearer authentication for '{}'", username);

        let allowed = if self.is_default_admin(username) {
            self.default_admin_enabled().await?
        } else {
            !self.groups.is_member(&self.config.inactive_group, username).await?
        };
        if !allowed {
            info!("Refusing token of disabled user '{}'", username);
            return Ok(AuthOutcome::Forbidden);
        }

        Ok(self.success(username))
    }

    fn success(&self, username: &str) -> AuthOutcome {
        let claims = TokenClaims::new(
            username,
            self.config.token_issuer.clone(),
            self.config.token_lifetime(),
        );
        match self.issuer.issue(&claims) {
            Ok(token) => {
                debug!("Issued token for '{}' until {}", username, claims.expires_at);
                AuthOutcome::Success {
                    username: username.to_string(),
                    token,
                }
            }
            Err(e) => {
                error!("Failed to issue token for '{}': {}", username, e);
                AuthOutcome::InternalError
            }
        }
    }

    /// Store a new hashed password for an employee, or for the default
    /// administrator when `username` names it.
    pub async fn set_password(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<OperationResult<()>> {
        if password.is_empty() {
            return Ok(OperationResult::bad_request("Password must not be empty"));
        }
        if self.is_default_admin(username) {
            return Ok(if self.set_default_admin_password(password).await? {
                OperationResult::empty()
            } else {
                OperationResult::bad_request("Failed to store password")
            });
        }

        info!("Setting password of '{}'", username);
        let id = username.to_string();
        let current = self.employees.get(&id, true).await?;
        let Some(employee) = current.value() else {
            return Ok(current.discard_values());
        };
        let mut employee = employee.clone();
        employee.password = Some(Credential::encode(password).to_string());
        Ok(self
            .employees
            .modify(&employee, &id, true)
            .await?
            .discard_values())
    }

    pub async fn set_default_admin_enabled(&self, enabled: bool) -> StoreResult<bool> {
        info!("Setting default administrator enabled: {}", enabled);
        self.values
            .set(DEFAULT_ADMIN_ENABLED_KEY, if enabled { "true" } else { "false" })
            .await
    }

    /// Replace the administrator password, stored hashed.
    pub async fn set_default_admin_password(&self, password: &str) -> StoreResult<bool> {
        if password.is_empty() {
            return Ok(false);
        }
        info!("Replacing default administrator password");
        self.values
            .set(
                DEFAULT_ADMIN_PASSWORD_KEY,
                &Credential::encode(password).to_string(),
            )
            .await
    }
}
