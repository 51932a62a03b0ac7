use std::{fmt::Write as _, sync::Mutex};

use chrono::NaiveDateTime;
use client_core::{AuthForm, Notice, NoticeLevel, View, ViewModel, ViewState};

/// Keeps the latest frame for printing once the command finishes and
/// writes notices to stderr as they arrive.
#[derive(Default)]
pub struct TerminalView {
    last: Mutex<Option<ViewModel>>,
}

impl TerminalView {
    pub fn take_frame(&self) -> Option<ViewModel> {
        self.last.lock().ok().and_then(|mut last| last.take())
    }
}

impl View for TerminalView {
    fn render(&self, model: &ViewModel) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(model.clone());
        }
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

pub fn format_frame(model: &ViewModel) -> String {
    let mut out = String::new();
    match (model.view_state, model.username_display.as_deref()) {
        (ViewState::Authenticated, Some(username)) => {
            let _ = writeln!(out, "Signed in as {username}");
        }
        (ViewState::Authenticated, None) => {
            let _ = writeln!(out, "Signed in");
        }
        (ViewState::Anonymous, _) => {
            let hint = match model.active_auth_form {
                AuthForm::Register => "register to continue",
                AuthForm::Login | AuthForm::Collapsed => "use `login` or `register`",
            };
            let _ = writeln!(out, "Not signed in ({hint})");
        }
    }

    if model.posts.is_empty() {
        let _ = writeln!(out, "\nNo posts to show.");
    }
    for card in &model.posts {
        let post = &card.post;
        let _ = writeln!(
            out,
            "\n#{} {} at {} | {} likes",
            post.id,
            post.author,
            timestamp(post.created_at_parsed(), &post.created_at),
            post.likes_count
        );
        let _ = writeln!(out, "  {}", post.text);
        for url in post.image_urls() {
            let _ = writeln!(out, "  [image] {url}");
        }
        for comment in &card.comments {
            let comment = &comment.comment;
            let _ = writeln!(
                out,
                "    #{} {} ({}): {}",
                comment.id,
                comment.author,
                timestamp(comment.created_at_parsed(), &comment.created_at),
                comment.text
            );
        }
    }

    let pagination = &model.pagination;
    let _ = write!(out, "\npage {}", pagination.page);
    if let Some(total) = pagination.total {
        let _ = write!(out, " of {total} posts");
    }
    if pagination.has_previous {
        let _ = write!(out, " | previous available");
    }
    if pagination.has_next {
        let _ = write!(out, " | next available");
    }
    out.push('\n');
    out
}

/// Minute precision; unparseable timestamps are shown as sent.
fn timestamp(parsed: Option<NaiveDateTime>, raw: &str) -> String {
    match parsed {
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}
