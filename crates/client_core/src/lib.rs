use std::{fmt::Display, sync::Arc};

use shared::{
    domain::{CommentId, PostId},
    protocol::{LikeStatus, PostPage, RegisterRequest},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod view;

pub use api::ApiClient;
pub use error::{ActionError, ApiError, AuthError, ValidationError};
pub use session::{Session, TokenClaims, ViewState};
pub use store::{MemorySessionStore, SessionStore};
pub use view::{
    render, Action, Affordance, AuthForm, CommentCard, Notice, NoticeLevel, Pagination,
    PostCard, RenderInput, View, ViewModel,
};

use error::POSTS_FALLBACK;

pub const REGISTERED_NOTICE: &str = "Registration successful! Please log in.";
pub const EMPTY_POST_TEXT: &str = "Enter post text";
pub const EMPTY_COMMENT_TEXT: &str = "Enter a comment";
const MISSING_REFRESH_TOKEN: &str = "No refresh token stored; please log in again";

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub auto_login_after_register: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validation {
    Valid,
    /// The backend refused the token itself.
    Rejected,
    /// No verdict on the token: transport failure or an unrelated status.
    Unverified,
}

struct LoadedPage {
    page: PostPage,
    fetched_as: ViewState,
}

struct ControllerState {
    session: Session,
    view_state: ViewState,
    auth_form: AuthForm,
    page: u32,
    posts: Option<LoadedPage>,
}

/// Owns the authentication session and gates every post fetch on it.
///
/// Session-store writes only happen while `inner` is held, and the
/// session-mutating operations (`login`, `register`, `logout`,
/// `renew_access_token`) are serialized by `mutation`: a second sign-in
/// attempt while one is in flight fails with `Busy` instead of racing on
/// the stored token fields.
pub struct SessionController {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
    view: Arc<dyn View>,
    options: ControllerOptions,
    inner: Mutex<ControllerState>,
    mutation: Mutex<()>,
}

impl SessionController {
    pub fn new(
        api: ApiClient,
        store: Arc<dyn SessionStore>,
        view: Arc<dyn View>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            api,
            store,
            view,
            options,
            inner: Mutex::new(ControllerState {
                session: Session::default(),
                view_state: ViewState::Anonymous,
                auth_form: AuthForm::Collapsed,
                page: 1,
                posts: None,
            }),
            mutation: Mutex::new(()),
        }
    }

    /// Restores the persisted session and performs the first refresh.
    pub async fn bootstrap(&self) -> Result<ViewModel, ApiError> {
        self.restore_session().await;
        self.refresh().await
    }

    /// Loads the persisted session without any request or redraw. The view
    /// state stays as it is until the next `refresh()`.
    pub async fn restore_session(&self) {
        match self.store.load().await {
            Ok(session) => {
                debug!(
                    has_access_token = session.has_access_token(),
                    "session: restored persisted session"
                );
                self.inner.lock().await.session = session;
            }
            Err(err) => warn!(%err, "session: failed to load persisted session; starting anonymous"),
        }
    }

    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    pub async fn view_state(&self) -> ViewState {
        self.inner.lock().await.view_state
    }

    pub async fn has_access_token(&self) -> bool {
        self.inner.lock().await.session.has_access_token()
    }

    pub async fn page(&self) -> u32 {
        self.inner.lock().await.page
    }

    /// The frame `render` would produce right now, without pushing it.
    pub async fn current_view(&self) -> ViewModel {
        let state = self.inner.lock().await;
        snapshot(&state)
    }

    /// Obtains and persists a token pair, then refreshes.
    ///
    /// `Ok` means the credentials were accepted and stored. The follow-up
    /// refresh decides the view state on its own: if the feed fails with
    /// anything but 401 the token stays stored, the failure is notified, and
    /// the view shows as `Anonymous` until a later refresh validates it.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let Ok(_guard) = self.mutation.try_lock() else {
            return Err(self.surface(AuthError::Busy));
        };
        let session = self
            .login_locked(username, password)
            .await
            .map_err(|err| self.surface(err))?;
        let _ = self.refresh().await;
        Ok(session)
    }

    async fn login_locked(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let tokens = self
            .api
            .obtain_tokens(username, password)
            .await
            .map_err(|err| {
                warn!(username, %err, "session: login rejected");
                AuthError::from_api(&err)
            })?;

        let session = Session::new(tokens.access, tokens.refresh, username);
        let mut state = self.inner.lock().await;
        self.store
            .save(&session)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        state.session = session.clone();
        state.view_state = ViewState::Authenticated;
        state.auth_form = AuthForm::Collapsed;
        info!(username, "session: login succeeded");
        Ok(session)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ValidationError> {
        let Ok(_guard) = self.mutation.try_lock() else {
            return Err(self.surface(ValidationError::Busy));
        };

        let payload = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.api.register(&payload).await.map_err(|err| {
            warn!(username, %err, "session: registration rejected");
            self.surface(ValidationError::from_api(&err))
        })?;
        info!(username, "session: registration accepted");

        if self.options.auto_login_after_register {
            self.login_locked(username, password)
                .await
                .map_err(|err| self.surface(ValidationError::AutoLogin(err)))?;
            let _ = self.refresh().await;
            return Ok(());
        }

        self.view.notify(Notice::info(REGISTERED_NOTICE));
        self.inner.lock().await.auth_form = AuthForm::Login;
        self.redraw().await;
        Ok(())
    }

    /// Clears every session field, then refreshes as an anonymous viewer.
    /// Waits for an in-flight sign-in instead of failing.
    pub async fn logout(&self) {
        let _guard = self.mutation.lock().await;
        {
            let mut state = self.inner.lock().await;
            if let Err(err) = self.store.clear().await {
                warn!(%err, "session: failed to clear persisted session");
                self.view
                    .notify(Notice::error(format!("Failed to clear stored session: {err}")));
            }
            state.session = Session::default();
            state.view_state = ViewState::Anonymous;
            state.auth_form = AuthForm::Collapsed;
            state.posts = None;
        }
        info!("session: logged out");
        let _ = self.refresh().await;
    }

    /// Checks the stored access token against a protected resource.
    ///
    /// Returns `false` without a request when no token is stored. Never
    /// fails: transport errors count as `false`. A token the backend refuses
    /// is dropped from the store.
    pub async fn validate(&self) -> bool {
        let token = {
            let mut state = self.inner.lock().await;
            let token = state.session.bearer().map(str::to_string);
            if token.is_none() {
                state.view_state = ViewState::Anonymous;
            }
            token
        };
        let Some(token) = token else {
            debug!("session: no access token; skipping validation");
            return false;
        };

        let outcome = match self.api.list_posts(1, Some(&token)).await {
            // A success status with an unexpected body still accepted the token.
            Ok(_) | Err(ApiError::Decode(_)) => Validation::Valid,
            Err(ApiError::Unauthorized { .. }) => Validation::Rejected,
            Err(err) => {
                debug!(%err, "session: token validation inconclusive");
                Validation::Unverified
            }
        };

        let mut state = self.inner.lock().await;
        if state.session.bearer() != Some(token.as_str()) {
            debug!("session: session changed during validation; discarding verdict");
            return false;
        }

        match outcome {
            Validation::Valid => {
                state.view_state = ViewState::Authenticated;
                true
            }
            Validation::Rejected => {
                info!("session: stored token rejected; clearing session");
                if let Err(err) = self.store.clear().await {
                    warn!(%err, "session: failed to clear rejected session");
                }
                state.session = Session::default();
                state.view_state = ViewState::Anonymous;
                false
            }
            Validation::Unverified => {
                state.view_state = ViewState::Anonymous;
                false
            }
        }
    }

    /// Revalidates the session, reloads the current post page, and pushes
    /// exactly one frame to the view.
    ///
    /// An unauthorized posts response is an expected outcome for anonymous
    /// viewing and is swallowed; every other failure is surfaced and
    /// returned.
    pub async fn refresh(&self) -> Result<ViewModel, ApiError> {
        let authenticated = self.validate().await;
        let (page_number, bearer) = {
            let state = self.inner.lock().await;
            let bearer = if authenticated {
                state.session.bearer().map(str::to_string)
            } else {
                None
            };
            (state.page, bearer)
        };
        let fetched_as = if bearer.is_some() {
            ViewState::Authenticated
        } else {
            ViewState::Anonymous
        };

        let result = self.api.list_posts(page_number, bearer.as_deref()).await;
        let surfaced = {
            let mut state = self.inner.lock().await;
            match result {
                Ok(page) => {
                    debug!(
                        page = page_number,
                        posts = page.results.len(),
                        "session: posts loaded"
                    );
                    state.posts = Some(LoadedPage { page, fetched_as });
                    None
                }
                Err(err) if err.is_unauthorized() => {
                    debug!(page = page_number, "session: posts require login; rendering empty feed");
                    state.posts = None;
                    None
                }
                Err(err) => {
                    let view_state = state.view_state;
                    if state
                        .posts
                        .as_ref()
                        .is_some_and(|loaded| loaded.fetched_as != view_state)
                    {
                        state.posts = None;
                    }
                    Some(err)
                }
            }
        };

        if let Some(err) = &surfaced {
            warn!(page = page_number, %err, "session: failed to load posts");
            self.view
                .notify(Notice::error(err.user_message(POSTS_FALLBACK)));
        }
        let model = self.redraw().await;
        match surfaced {
            Some(err) => Err(err),
            None => Ok(model),
        }
    }

    /// Exchanges the refresh token for a new access token. Nothing calls
    /// this automatically; an expired access token still forces a login.
    pub async fn renew_access_token(&self) -> Result<(), AuthError> {
        let Ok(_guard) = self.mutation.try_lock() else {
            return Err(self.surface(AuthError::Busy));
        };

        let refresh_token = self.inner.lock().await.session.refresh_token.clone();
        let Some(refresh_token) = refresh_token else {
            return Err(self.surface(AuthError::Rejected(MISSING_REFRESH_TOKEN.to_string())));
        };

        let renewed = self.api.renew_access(&refresh_token).await.map_err(|err| {
            warn!(%err, "session: token renewal rejected");
            self.surface(AuthError::from_api(&err))
        })?;

        {
            let mut state = self.inner.lock().await;
            let mut session = state.session.clone();
            session.access_token = Some(renewed.access);
            if let Some(rotated) = renewed.refresh {
                session.refresh_token = Some(rotated);
            }
            self.store
                .save(&session)
                .await
                .map_err(|err| self.surface(AuthError::Storage(err.to_string())))?;
            state.session = session;
        }
        info!("session: access token renewed");
        let _ = self.refresh().await;
        Ok(())
    }

    pub async fn show_login_form(&self) -> ViewModel {
        self.inner.lock().await.auth_form = AuthForm::Login;
        self.redraw().await
    }

    pub async fn show_register_form(&self) -> ViewModel {
        self.inner.lock().await.auth_form = AuthForm::Register;
        self.redraw().await
    }

    pub async fn set_page(&self, page: u32) -> Result<ViewModel, ApiError> {
        self.inner.lock().await.page = page.max(1);
        self.refresh().await
    }

    /// Follows the `next` link of the last loaded page. `Ok(None)` when the
    /// backend advertised no further page.
    pub async fn next_page(&self) -> Result<Option<ViewModel>, ApiError> {
        {
            let mut state = self.inner.lock().await;
            let has_next = state
                .posts
                .as_ref()
                .is_some_and(|loaded| loaded.page.next.is_some());
            if !has_next {
                return Ok(None);
            }
            state.page += 1;
        }
        self.refresh().await.map(Some)
    }

    pub async fn previous_page(&self) -> Result<Option<ViewModel>, ApiError> {
        {
            let mut state = self.inner.lock().await;
            let has_previous = state
                .posts
                .as_ref()
                .is_some_and(|loaded| loaded.page.previous.is_some());
            if !has_previous || state.page <= 1 {
                return Ok(None);
            }
            state.page -= 1;
        }
        self.refresh().await.map(Some)
    }

    pub async fn create_post(&self, text: &str) -> Result<(), ActionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.surface(ActionError::EmptyText(EMPTY_POST_TEXT)));
        }
        let bearer = self.require_bearer().await?;
        self.api
            .create_post(&bearer, text)
            .await
            .map_err(|err| self.surface(ActionError::from_api(&err, "Failed to create post")))?;
        info!("posts: post created");
        let _ = self.refresh().await;
        Ok(())
    }

    pub async fn comment(&self, post_id: PostId, text: &str) -> Result<(), ActionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.surface(ActionError::EmptyText(EMPTY_COMMENT_TEXT)));
        }
        let bearer = self.require_bearer().await?;
        self.api
            .add_comment(&bearer, post_id, text)
            .await
            .map_err(|err| self.surface(ActionError::from_api(&err, "Failed to add comment")))?;
        info!(post_id = post_id.0, "posts: comment added");
        let _ = self.refresh().await;
        Ok(())
    }

    pub async fn toggle_like(&self, post_id: PostId) -> Result<LikeStatus, ActionError> {
        let bearer = self.require_bearer().await?;
        let toggled = self
            .api
            .toggle_like(&bearer, post_id)
            .await
            .map_err(|err| self.surface(ActionError::from_api(&err, "Failed to update like")))?;
        info!(post_id = post_id.0, status = ?toggled.status, "posts: like toggled");
        let _ = self.refresh().await;
        Ok(toggled.status)
    }

    pub async fn delete_post(&self, post_id: PostId) -> Result<(), ActionError> {
        let bearer = self.require_bearer().await?;
        self.api
            .delete_post(&bearer, post_id)
            .await
            .map_err(|err| self.surface(ActionError::from_api(&err, "Failed to delete post")))?;
        info!(post_id = post_id.0, "posts: post deleted");
        let _ = self.refresh().await;
        Ok(())
    }

    pub async fn delete_comment(&self, comment_id: CommentId) -> Result<(), ActionError> {
        let bearer = self.require_bearer().await?;
        self.api
            .delete_comment(&bearer, comment_id)
            .await
            .map_err(|err| self.surface(ActionError::from_api(&err, "Failed to delete comment")))?;
        info!(comment_id = comment_id.0, "posts: comment deleted");
        let _ = self.refresh().await;
        Ok(())
    }

    async fn require_bearer(&self) -> Result<String, ActionError> {
        let bearer = {
            let state = self.inner.lock().await;
            if state.view_state == ViewState::Authenticated {
                state.session.bearer().map(str::to_string)
            } else {
                None
            }
        };
        bearer.ok_or_else(|| self.surface(ActionError::LoginRequired))
    }

    async fn redraw(&self) -> ViewModel {
        let model = {
            let state = self.inner.lock().await;
            snapshot(&state)
        };
        self.view.render(&model);
        model
    }

    fn surface<E: Display>(&self, err: E) -> E {
        self.view.notify(Notice::error(err.to_string()));
        err
    }
}

fn snapshot(state: &ControllerState) -> ViewModel {
    let username = state.session.display_name();
    render(RenderInput {
        view_state: state.view_state,
        username: username.as_deref(),
        auth_form: state.auth_form,
        page_number: state.page,
        page: state.posts.as_ref().map(|loaded| &loaded.page),
    })
}

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
mod mock_backend;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
