//! Declarative render step: session and post state in, view model out.
//!
//! The view model carries every visibility flag and interactive affordance
//! for one frame. Hosts draw it wholesale after each refresh instead of
//! patching individual controls.

use shared::{
    domain::{Comment, CommentId, Post, PostId},
    protocol::PostPage,
};

use crate::session::ViewState;

/// Receives rendered frames and user-facing notices from the controller.
pub trait View: Send + Sync {
    fn render(&self, model: &ViewModel);
    fn notify(&self, notice: Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Which authentication form is expanded while anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthForm {
    #[default]
    Collapsed,
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ShowLogin,
    ShowRegister,
    Logout,
    CreatePost,
    ToggleLike(PostId),
    Comment(PostId),
    DeletePost(PostId),
    DeleteComment(CommentId),
    NextPage,
    PreviousPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub action: Action,
    pub enabled: bool,
}

impl Affordance {
    fn enabled(action: Action) -> Self {
        Self {
            action,
            enabled: true,
        }
    }

    fn when(action: Action, enabled: bool) -> Self {
        Self { action, enabled }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCard {
    pub comment: Comment,
    pub affordances: Vec<Affordance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCard {
    pub post: Post,
    pub comments: Vec<CommentCard>,
    pub affordances: Vec<Affordance>,
}

impl PostCard {
    pub fn affordance(&self, action: Action) -> Option<Affordance> {
        self.affordances
            .iter()
            .copied()
            .find(|affordance| affordance.action == action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub page: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub view_state: ViewState,
    pub auth_forms_visible: bool,
    pub active_auth_form: AuthForm,
    pub new_post_form_visible: bool,
    pub user_info_visible: bool,
    pub username_display: Option<String>,
    pub posts: Vec<PostCard>,
    pub pagination: Pagination,
    pub controls: Vec<Affordance>,
}

impl ViewModel {
    pub fn control(&self, action: Action) -> Option<Affordance> {
        self.controls
            .iter()
            .copied()
            .find(|affordance| affordance.action == action)
    }
}

pub struct RenderInput<'a> {
    pub view_state: ViewState,
    pub username: Option<&'a str>,
    pub auth_form: AuthForm,
    pub page_number: u32,
    pub page: Option<&'a PostPage>,
}

pub fn render(input: RenderInput<'_>) -> ViewModel {
    let authenticated = input.view_state == ViewState::Authenticated;
    let viewer = input.username.filter(|_| authenticated);

    let posts = input
        .page
        .map(|page| {
            page.results
                .iter()
                .map(|post| post_card(post, authenticated, viewer))
                .collect()
        })
        .unwrap_or_default();

    let pagination = Pagination {
        page: input.page_number,
        has_next: input.page.is_some_and(|page| page.next.is_some()),
        has_previous: input.page.is_some_and(|page| page.previous.is_some()),
        total: input.page.and_then(|page| page.count),
    };

    let mut controls = Vec::new();
    if authenticated {
        controls.push(Affordance::enabled(Action::CreatePost));
        controls.push(Affordance::enabled(Action::Logout));
    } else {
        controls.push(Affordance::enabled(Action::ShowLogin));
        controls.push(Affordance::enabled(Action::ShowRegister));
    }
    controls.push(Affordance::when(Action::PreviousPage, pagination.has_previous));
    controls.push(Affordance::when(Action::NextPage, pagination.has_next));

    ViewModel {
        view_state: input.view_state,
        auth_forms_visible: !authenticated,
        active_auth_form: if authenticated {
            AuthForm::Collapsed
        } else {
            input.auth_form
        },
        new_post_form_visible: authenticated,
        user_info_visible: authenticated,
        username_display: viewer.map(str::to_string),
        posts,
        pagination,
        controls,
    }
}

fn post_card(post: &Post, authenticated: bool, viewer: Option<&str>) -> PostCard {
    let mut affordances = vec![
        Affordance::when(Action::ToggleLike(post.id), authenticated),
        Affordance::when(Action::Comment(post.id), authenticated),
    ];
    if viewer == Some(post.author.as_str()) {
        affordances.push(Affordance::enabled(Action::DeletePost(post.id)));
    }

    let comments = post
        .comments
        .iter()
        .map(|comment| CommentCard {
            comment: comment.clone(),
            affordances: if viewer == Some(comment.author.as_str()) {
                vec![Affordance::enabled(Action::DeleteComment(comment.id))]
            } else {
                Vec::new()
            },
        })
        .collect();

    PostCard {
        post: post.clone(),
        comments,
        affordances,
    }
}
