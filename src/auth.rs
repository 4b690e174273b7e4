//! Signed-in identity.
//!
//! Credentials are checked by an external identity platform; this module
//! only remembers who is signed in, so the task screens can read the owner
//! id and sign the user out.

use std::fs;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::error::TodoError;
use crate::models::UserProfile;

/// Read side of the identity platform, as consumed by the task screens.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserProfile>;

    fn sign_out(&self) -> Result<(), TodoError>;

    fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Identity remembered between runs in a small JSON session file.
pub struct SessionIdentity {
    path: Option<PathBuf>,
    current: RwLock<Option<UserProfile>>,
}

impl SessionIdentity {
    /// A session that lives only as long as this value.
    pub fn in_memory() -> Self {
        SessionIdentity { path: None, current: RwLock::new(None) }
    }

    /// Restores the session saved at `path`. A missing or unreadable file
    /// means nobody is signed in.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<UserProfile>(&s) {
                Ok(user) if !user.uid.trim().is_empty() => Some(user),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                    None
                }
            },
            Err(_) => None,
        };
        SessionIdentity { path: Some(path), current: RwLock::new(current) }
    }

    /// Records `user` as signed in after the identity platform accepted them.
    pub fn sign_in(&self, user: UserProfile) -> Result<(), TodoError> {
        if user.uid.trim().is_empty() {
            return Err(TodoError::Validation { field: "uid", message: "User id is required".to_string() });
        }
        if let Some(path) = &self.path {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, serde_json::to_string_pretty(&user)?)?;
        }
        tracing::info!(uid = %user.uid, "signed in");
        *self.current.write() = Some(user);
        Ok(())
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<UserProfile> {
        self.current.read().clone()
    }

    fn sign_out(&self) -> Result<(), TodoError> {
        if let Some(path) = &self.path {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        if let Some(user) = self.current.write().take() {
            tracing::info!(uid = %user.uid, "signed out");
        }
        Ok(())
    }
}

/// Turns an identity platform error code into a sentence for the user.
pub fn friendly_auth_message(code: Option<&str>) -> String {
    let Some(code) = code.filter(|c| !c.is_empty()) else {
        return "Authentication failed".to_string();
    };
    let known = [
        ("ERROR_WEAK_PASSWORD", "Password is too weak. Please choose a stronger password."),
        ("ERROR_INVALID_EMAIL", "Invalid email address format."),
        (
            "ERROR_EMAIL_ALREADY_IN_USE",
            "This email is already registered. Please use a different email or sign in.",
        ),
        (
            "ERROR_USER_NOT_FOUND",
            "No account found with this email. Please check your email or create a new account.",
        ),
        ("ERROR_WRONG_PASSWORD", "Incorrect password. Please try again."),
        ("ERROR_USER_DISABLED", "This account has been disabled. Please contact support."),
        ("ERROR_TOO_MANY_REQUESTS", "Too many failed attempts. Please try again later."),
        ("ERROR_NETWORK_REQUEST_FAILED", "Network error. Please check your internet connection."),
    ];
    known
        .iter()
        .find(|(k, _)| code.contains(k))
        .map(|(_, msg)| msg.to_string())
        .unwrap_or_else(|| format!("Authentication failed: {}", code))
}
