//! Server-rendered pages.
//!
//! Every interpolated value goes through `html_escape`; nothing user supplied
//! reaches the markup unescaped.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::db::User;
use crate::models::comment::{CommentPage, CommentView};
use crate::models::user::CurrentUser;

const STYLES: &str = r"
body { font-family: system-ui, sans-serif; max-width: 760px; margin: 0 auto; padding: 1rem; color: #1f2937; }
nav { display: flex; gap: 1rem; align-items: center; border-bottom: 1px solid #e5e7eb; padding-bottom: .75rem; margin-bottom: 1rem; }
nav .spacer { flex: 1; }
nav form { display: inline; }
.notice { padding: .5rem .75rem; border-radius: 4px; margin-bottom: 1rem; }
.notice.error { background: #fee2e2; color: #991b1b; }
.notice.success { background: #dcfce7; color: #166534; }
.comment { border-bottom: 1px solid #f3f4f6; padding: .5rem 0; }
.comment .meta { font-size: .85rem; color: #6b7280; }
.author { font-weight: 600; }
.pager { display: flex; gap: 1rem; margin-top: 1rem; }
form.stacked label { display: block; margin-top: .75rem; }
form.stacked input, form.stacked textarea { width: 100%; padding: .4rem; box-sizing: border-box; }
form.stacked button { margin-top: .75rem; }
#chat-log { height: 360px; overflow-y: auto; border: 1px solid #e5e7eb; padding: .5rem; }
#chat-log .line { margin: .2rem 0; }
";

/// Feedback shown above a form.
#[derive(Debug, Clone, Copy)]
pub enum Notice<'a> {
    Error(&'a str),
    Success(&'a str),
}

impl Notice<'_> {
    fn render(self) -> String {
        match self {
            Self::Error(message) => format!(r#"<div class="notice error">{}</div>"#, text(message)),
            Self::Success(message) => {
                format!(r#"<div class="notice success">{}</div>"#, text(message))
            }
        }
    }
}

fn notice_html(notice: Option<Notice<'_>>) -> String {
    notice.map(Notice::render).unwrap_or_default()
}

fn nav(user: Option<&CurrentUser>) -> String {
    let links = r#"<a href="/">Home</a><a href="/comments">Comments</a><a href="/chat">Chat</a>"#;

    let account = user.map_or_else(
        || r#"<a href="/login">Log in</a><a href="/register">Register</a>"#.to_string(),
        |u| {
            format!(
                r#"<span class="author" style="color: {color}">{name}</span>
<a href="/new-comment">New comment</a><a href="/profile">Profile</a>
<form method="post" action="/logout"><button type="submit">Log out</button></form>"#,
                color = attr(&u.profile_color),
                name = text(&u.display_name),
            )
        },
    );

    format!(r#"<nav>{links}<span class="spacer"></span>{account}</nav>"#)
}

pub fn layout(title: &str, user: Option<&CurrentUser>, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} - Agora</title>
<style>{STYLES}</style>
</head>
<body>
{nav}
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = text(title),
        nav = nav(user),
    ))
}

pub fn home(user: Option<&CurrentUser>, latest: &[CommentView]) -> Html<String> {
    let greeting = user.map_or_else(
        || {
            r#"<p>Welcome! <a href="/login">Log in</a> or <a href="/register">create an account</a> to join the conversation.</p>"#
                .to_string()
        },
        |u| format!("<p>Welcome back, {}.</p>", text(&u.display_name)),
    );

    let recent = if latest.is_empty() {
        "<p>No comments yet.</p>".to_string()
    } else {
        latest.iter().map(comment_html).collect::<String>()
    };

    layout(
        "Agora",
        user,
        &format!(
            r#"{greeting}<h2>Latest comments</h2>{recent}<p><a href="/comments">All comments</a></p>"#
        ),
    )
}

fn comment_html(comment: &CommentView) -> String {
    let posted = chrono::DateTime::from_timestamp(comment.created_at, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();

    format!(
        r#"<div class="comment">
<div class="meta"><a class="author" style="color: {color}" href="/user/{user_id}/comments">{name}</a> &middot; {posted}</div>
<p>{body}</p>
</div>"#,
        color = attr(&comment.profile_color),
        user_id = comment.user_id,
        name = text(&comment.display_name),
        body = text(&comment.text),
    )
}

/// A paginated comment listing. `base_path` is the route the pager links to.
pub fn comments(
    title: &str,
    user: Option<&CurrentUser>,
    page: &CommentPage,
    base_path: &str,
) -> Html<String> {
    let items = if page.comments.is_empty() {
        "<p>No comments on this page.</p>".to_string()
    } else {
        page.comments.iter().map(comment_html).collect::<String>()
    };

    let mut pager = String::new();
    if page.has_previous() {
        pager.push_str(&format!(
            r#"<a rel="prev" href="{}?page={}">Newer</a>"#,
            attr(base_path),
            page.page - 1
        ));
    }
    pager.push_str(&format!(
        "<span>Page {} of {}</span>",
        page.page, page.total_pages
    ));
    if page.has_next() {
        pager.push_str(&format!(
            r#"<a rel="next" href="{}?page={}">Older</a>"#,
            attr(base_path),
            page.page + 1
        ));
    }

    layout(
        title,
        user,
        &format!(r#"{items}<div class="pager">{pager}</div>"#),
    )
}

pub fn new_comment(user: &CurrentUser, notice: Option<Notice<'_>>, draft: &str) -> Html<String> {
    layout(
        "New comment",
        Some(user),
        &format!(
            r#"{notice}<form class="stacked" method="post" action="/comment">
<label for="text">Comment</label>
<textarea id="text" name="text" rows="5" required>{draft}</textarea>
<button type="submit">Post</button>
</form>"#,
            notice = notice_html(notice),
            draft = text(draft),
        ),
    )
}

pub fn login(notice: Option<Notice<'_>>, username: &str) -> Html<String> {
    layout(
        "Log in",
        None,
        &format!(
            r#"{notice}<form class="stacked" method="post" action="/login">
<label for="username">Username</label>
<input id="username" name="username" value="{username}" autocomplete="username" required>
<label for="password">Password</label>
<input id="password" name="password" type="password" autocomplete="current-password" required>
<button type="submit">Log in</button>
</form>
<p><a href="/forgot">Forgot your password?</a></p>"#,
            notice = notice_html(notice),
            username = attr(username),
        ),
    )
}

/// Values echoed back into the registration form after a failed submit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegisterValues<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub display_name: &'a str,
}

pub fn register(notice: Option<Notice<'_>>, values: RegisterValues<'_>) -> Html<String> {
    layout(
        "Register",
        None,
        &format!(
            r#"{notice}<form class="stacked" method="post" action="/register">
<label for="username">Username</label>
<input id="username" name="username" value="{username}" required>
<label for="email">Email</label>
<input id="email" name="email" type="email" value="{email}" required>
<label for="display_name">Display name</label>
<input id="display_name" name="display_name" value="{display_name}" required>
<label for="password">Password</label>
<input id="password" name="password" type="password" autocomplete="new-password" required>
<button type="submit">Create account</button>
</form>"#,
            notice = notice_html(notice),
            username = attr(values.username),
            email = attr(values.email),
            display_name = attr(values.display_name),
        ),
    )
}

pub fn profile(account: &User, notice: Option<Notice<'_>>) -> Html<String> {
    let user = CurrentUser::from(account.clone());

    layout(
        "Profile",
        Some(&user),
        &format!(
            r#"{notice}
<p>Signed in as <strong>{username}</strong> ({email})</p>

<h2>Display name</h2>
<form class="stacked" method="post" action="/profile/update-display-name">
<input name="display_name" value="{display_name}" required>
<button type="submit">Save display name</button>
</form>

<h2>Color</h2>
<form class="stacked" method="post" action="/profile/update-color">
<input name="profile_color" type="color" value="{color}">
<button type="submit">Save color</button>
</form>

<h2>Email</h2>
<form class="stacked" method="post" action="/profile/update-email">
<label for="email">New email</label>
<input id="email" name="email" type="email" value="{email_attr}" required>
<label for="email_current_password">Current password</label>
<input id="email_current_password" name="current_password" type="password" required>
<button type="submit">Change email</button>
</form>

<h2>Password</h2>
<form class="stacked" method="post" action="/profile/update-password">
<label for="current_password">Current password</label>
<input id="current_password" name="current_password" type="password" required>
<label for="new_password">New password</label>
<input id="new_password" name="new_password" type="password" autocomplete="new-password" required>
<button type="submit">Change password</button>
</form>"#,
            notice = notice_html(notice),
            username = text(&account.username),
            email = text(&account.email),
            email_attr = attr(&account.email),
            display_name = attr(&account.display_name),
            color = attr(&account.profile_color),
        ),
    )
}

pub fn forgot(user: Option<&CurrentUser>, notice: Option<Notice<'_>>) -> Html<String> {
    layout(
        "Forgot password",
        user,
        &format!(
            r#"{notice}<form class="stacked" method="post" action="/forgot">
<label for="email">Email</label>
<input id="email" name="email" type="email" required>
<button type="submit">Send reset link</button>
</form>"#,
            notice = notice_html(notice),
        ),
    )
}

pub fn reset_form(token: &str, notice: Option<Notice<'_>>) -> Html<String> {
    layout(
        "Choose a new password",
        None,
        &format!(
            r#"{notice}<form class="stacked" method="post" action="/reset-password">
<input type="hidden" name="token" value="{token}">
<label for="password">New password</label>
<input id="password" name="password" type="password" autocomplete="new-password" required>
<button type="submit">Reset password</button>
</form>"#,
            notice = notice_html(notice),
            token = attr(token),
        ),
    )
}

pub fn reset_invalid() -> Html<String> {
    layout(
        "Reset password",
        None,
        &format!(
            r#"{}<p><a href="/forgot">Request a new link</a></p>"#,
            Notice::Error("This reset link is invalid or has expired.").render()
        ),
    )
}

pub fn chat(user: &CurrentUser) -> Html<String> {
    layout(
        "Chat",
        Some(user),
        r#"<div id="chat-log" aria-live="polite"></div>
<form id="chat-form" class="stacked">
<input id="chat-input" name="text" autocomplete="off" placeholder="Say something" maxlength="500">
<button type="submit">Send</button>
</form>
<script src="/chat.js"></script>"#,
    )
}

pub fn error_page(status: StatusCode, message: &str) -> Response {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        r#"<p>{}</p><p><a href="/">Back to the forum</a></p>"#,
        text(message)
    );
    (status, layout(title, None, &body)).into_response()
}

pub async fn not_found() -> Response {
    error_page(StatusCode::NOT_FOUND, "Route not found")
}

/// Client side of the chat room, served from `/chat.js`.
pub const CHAT_SCRIPT: &str = r#"(() => {
  const log = document.getElementById("chat-log");
  const form = document.getElementById("chat-form");
  const input = document.getElementById("chat-input");
  const scheme = location.protocol === "https:" ? "wss" : "ws";
  const socket = new WebSocket(`${scheme}://${location.host}/chat/ws`);

  const time = (ts) => new Date(ts * 1000).toLocaleTimeString();

  const append = (entry) => {
    const line = document.createElement("div");
    line.className = "line";
    const who = document.createElement("span");
    who.className = "author";
    who.style.color = entry.profile_color;
    who.textContent = entry.display_name;
    const stamp = document.createElement("small");
    stamp.textContent = ` ${time(entry.timestamp)} `;
    line.append(who, stamp, document.createTextNode(entry.text));
    log.append(line);
    log.scrollTop = log.scrollHeight;
  };

  socket.addEventListener("message", (raw) => {
    let frame;
    try { frame = JSON.parse(raw.data); } catch { return; }
    if (frame.event === "chat history") {
      log.textContent = "";
      frame.data.forEach(append);
    } else if (frame.event === "chat message") {
      append(frame.data);
    }
  });

  socket.addEventListener("close", () => {
    const line = document.createElement("div");
    line.className = "line";
    line.textContent = "Disconnected.";
    log.append(line);
  });

  form.addEventListener("submit", (e) => {
    e.preventDefault();
    const text = input.value.trim();
    if (!text || socket.readyState !== WebSocket.OPEN) return;
    socket.send(JSON.stringify({ event: "chat message", data: { text } }));
    input.value = "";
  });
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> CurrentUser {
        CurrentUser {
            id: 1,
            username: "alice".to_string(),
            display_name: "<b>Alice</b>".to_string(),
            profile_color: "#112233".to_string(),
        }
    }

    #[test]
    fn test_layout_escapes_user_values() {
        let Html(page) = layout("Home", Some(&alice()), "");
        assert!(page.contains("&lt;b&gt;Alice&lt;/b&gt;"));
        assert!(!page.contains("<b>Alice</b>"));
    }

    #[test]
    fn test_comment_listing_escapes_text() {
        let page = CommentPage {
            comments: vec![CommentView {
                id: 1,
                user_id: 1,
                text: "<script>alert(1)</script>".to_string(),
                created_at: 0,
                display_name: "Alice A".to_string(),
                profile_color: "#112233".to_string(),
            }],
            page: 1,
            total_pages: 2,
            total: 21,
        };

        let Html(html) = comments("Comments", None, &page, "/comments");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains(r#"href="/comments?page=2""#));
        assert!(!html.contains(r#"rel="prev""#));
    }

    #[test]
    fn test_reset_form_keeps_token() {
        let Html(html) = reset_form("abc\"def", None);
        assert!(html.contains(r#"value="abc&quot;def""#));
    }
}
