//! Who is signed in, and the on-disk copy of their session.

use std::fs;
use std::path::{Path, PathBuf};

use allwork_core::session::{AuthUser, Session};
use allwork_service::{BlockingService, ServiceError};
use tracing::{debug, info, warn};

use crate::notice::Notice;

pub struct SessionManager {
    path: Option<PathBuf>,
    user: Option<AuthUser>,
}

impl SessionManager {
    /// `path` is where the session is persisted. `None` keeps it in memory.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, user: None }
    }

    pub fn default_path() -> PathBuf {
        dirs_default_data_dir().join("allwork").join("session.json")
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Restore a persisted session. A file the backend rejects is removed;
    /// any other failure keeps it for the next start and is returned.
    pub fn init(&mut self, svc: &BlockingService) -> Result<Option<&AuthUser>, ServiceError> {
        let Some(stored) = self.load() else {
            return Ok(None);
        };
        match svc.restore_session(&stored) {
            Ok(session) => {
                info!("restored session for {}", session.user.email);
                self.save(&session);
                self.user = Some(session.user);
            }
            Err(ServiceError::Unauthorized(msg)) => {
                warn!("stored session rejected: {msg}");
                self.forget();
            }
            Err(e) => {
                warn!("could not restore session: {e}");
                self.user = None;
                return Err(e);
            }
        }
        Ok(self.user.as_ref())
    }

    pub fn sign_in(
        &mut self,
        svc: &BlockingService,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ServiceError> {
        let session = svc.sign_in(email.trim(), password)?;
        self.establish(svc, session)
    }

    /// Register an account. When the backend hands back a session straight
    /// away the user is signed in; otherwise they still have to sign in.
    pub fn sign_up(
        &mut self,
        svc: &BlockingService,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthUser>, ServiceError> {
        let signup = svc.sign_up(email.trim(), password)?;
        info!("signed up {}", signup.user.email);
        match signup.session {
            Some(session) => self.establish(svc, session).map(Some),
            None => Ok(None),
        }
    }

    fn establish(&mut self, svc: &BlockingService, session: Session) -> Result<AuthUser, ServiceError> {
        let user = session.user.clone();
        self.save(&session);
        if let Err(e) = svc.ensure_profile(&user) {
            warn!("could not create profile for {}: {e}", user.email);
        }
        self.user = Some(user.clone());
        Ok(user)
    }

    /// Sign out remotely and locally. Local state is cleared even when the
    /// backend call fails.
    pub fn sign_out(&mut self, svc: &BlockingService) -> Notice {
        let result = svc.sign_out();
        self.forget();
        match result {
            Ok(()) => Notice::info("Signed out"),
            Err(e) => Notice::warning(format!("Signed out locally: {}", e.message())),
        }
    }

    fn load(&self) -> Option<Session> {
        let path = self.path.as_ref()?;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("no stored session at {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("ignoring unreadable session file {}: {e}", path.display());
                None
            }
        }
    }

    fn save(&self, session: &Session) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("cannot create {}: {e}", dir.display());
                return;
            }
        }
        match serde_json::to_string_pretty(session) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("cannot write session to {}: {e}", path.display());
                }
            }
            Err(e) => warn!("cannot serialize session: {e}"),
        }
    }

    fn forget(&mut self) {
        self.user = None;
        if let Some(path) = self.path.as_ref() {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("cannot remove {}: {e}", path.display());
                }
            }
        }
    }
}

fn dirs_default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    }
}
