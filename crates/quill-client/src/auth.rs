use std::sync::Arc;

use tracing::{info, warn};

use quill_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use quill_types::models::UserProfile;

use crate::api::AuthApi;
use crate::error::Result;
use crate::notice::Notifier;
use crate::session::Session;

pub struct AuthController<A> {
    api: A,
    session: Arc<Session>,
    notices: Notifier,
}

impl<A: AuthApi> AuthController<A> {
    /// Installs any token restored from `session` on `api`.
    pub fn new(api: A, session: Arc<Session>, notices: Notifier) -> Self {
        api.set_token(session.token());
        Self { api, session, notices }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.session.user()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.api.login(&req).await {
            Ok(resp) => self.sign_in(resp),
            Err(e) => {
                warn!("Login failed: {}", e);
                self.notices.error("Login failed");
                Err(e)
            }
        }
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<UserProfile> {
        let req = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        match self.api.register(&req).await {
            Ok(resp) => self.sign_in(resp),
            Err(e) => {
                warn!("Register failed: {}", e);
                self.notices.error("Register failed");
                Err(e)
            }
        }
    }

    /// Drops the identity from memory and storage. Never waits on the server.
    pub fn logout(&self) -> Result<()> {
        self.api.set_token(None);
        self.session.clear()
    }

    fn sign_in(&self, resp: AuthResponse) -> Result<UserProfile> {
        self.session.persist(resp.user.clone(), resp.token.clone())?;
        self.api.set_token(Some(resp.token));
        info!("Signed in as {}", resp.user.username);
        Ok(resp.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::ClientError;
    use crate::notice::{Notice, NoticeLevel};

    #[derive(Default)]
    struct FakeAuth {
        accept: bool,
        token: Mutex<Option<String>>,
    }

    impl FakeAuth {
        fn reply(&self, username: &str, email: &str) -> Result<AuthResponse> {
            if self.accept {
                Ok(AuthResponse {
                    token: format!("token-for-{}", username),
                    user: UserProfile {
                        username: username.into(),
                        email: email.into(),
                    },
                })
            } else {
                Err(ClientError::Api {
                    status: 401,
                    message: "Invalid credentials".into(),
                })
            }
        }

        fn installed(&self) -> Option<String> {
            self.token.lock().unwrap().clone()
        }
    }

    impl AuthApi for FakeAuth {
        async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse> {
            self.reply(&req.username, &req.email)
        }

        async fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
            self.reply("ana", &req.email)
        }

        fn set_token(&self, token: Option<String>) {
            *self.token.lock().unwrap() = token;
        }
    }

    fn controller(accept: bool) -> (AuthController<FakeAuth>, crate::notice::NoticeReceiver, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(Session::load(dir.path().join("session.json")).unwrap());
        let (notices, rx) = Notifier::channel();
        let api = FakeAuth {
            accept,
            ..Default::default()
        };
        (AuthController::new(api, session, notices), rx, dir)
    }

    #[tokio::test]
    async fn login_persists_and_installs_token() {
        let (auth, mut rx, dir) = controller(true);

        let user = auth.login("ana@example.com", "pw").await.unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(auth.current_user(), Some(user));
        assert_eq!(auth.api.installed().as_deref(), Some("token-for-ana"));
        assert!(dir.path().join("session.json").exists());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_login_changes_nothing_and_notifies() {
        let (auth, mut rx, dir) = controller(false);

        assert!(auth.login("ana@example.com", "bad").await.is_err());
        assert_eq!(auth.current_user(), None);
        assert_eq!(auth.api.installed(), None);
        assert!(!dir.path().join("session.json").exists());
        assert_eq!(
            rx.try_recv().unwrap(),
            Notice {
                level: NoticeLevel::Error,
                message: "Login failed".into()
            }
        );

        assert!(auth.register("ana", "ana@example.com", "pw").await.is_err());
        assert_eq!(rx.try_recv().unwrap().message, "Register failed");
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let (auth, _rx, dir) = controller(true);
        auth.register("bob", "bob@example.com", "pw").await.unwrap();

        auth.logout().unwrap();
        assert_eq!(auth.current_user(), None);
        assert_eq!(auth.api.installed(), None);
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn restored_session_token_is_installed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        Session::load(&path)
            .unwrap()
            .persist(
                UserProfile {
                    username: "ana".into(),
                    email: "ana@example.com".into(),
                },
                "saved".into(),
            )
            .unwrap();

        let (notices, _rx) = Notifier::channel();
        let auth = AuthController::new(
            FakeAuth::default(),
            Arc::new(Session::load(&path).unwrap()),
            notices,
        );
        assert_eq!(auth.api.installed().as_deref(), Some("saved"));
    }
}
