use crate::domain::models::{Identity, Role};
use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

const APP_TITLE: &str = "Longevity Questionnaire";

const STYLE: &str = "body{font-family:Roboto,Helvetica,Arial,sans-serif;margin:0;background:#f5f5f5;color:#222}\
header{background:#1976d2;color:#fff;padding:12px 24px;display:flex;align-items:center;gap:16px}\
header a,header button{color:#fff;text-decoration:none;background:none;border:0;font:inherit;cursor:pointer}\
header .brand{flex-grow:1;font-weight:600}\
main{max-width:960px;margin:24px auto;padding:0 16px}\
.card{background:#fff;border-radius:6px;padding:20px;margin-bottom:20px;box-shadow:0 1px 3px rgba(0,0,0,.15)}\
.alert{padding:12px 16px;border-radius:4px;margin-bottom:16px}\
.alert.error{background:#fdecea;color:#611a15}.alert.success{background:#edf7ed;color:#1e4620}\
.alert.info{background:#e8f4fd;color:#0d3c61}\
table{width:100%;border-collapse:collapse}th,td{text-align:left;padding:8px;border-bottom:1px solid #e0e0e0}\
.btn{display:inline-block;padding:8px 16px;border-radius:4px;border:1px solid #1976d2;background:#1976d2;color:#fff;text-decoration:none;cursor:pointer;font:inherit}\
.btn.outline{background:#fff;color:#1976d2}.btn.danger{background:#d32f2f;border-color:#d32f2f}\
.btn[disabled]{opacity:.5;cursor:default}\
.chip{display:inline-block;padding:2px 10px;border-radius:12px;font-size:.85em;background:#e0e0e0}\
.chip.success{background:#c8e6c9}.chip.warning{background:#ffe0b2}.chip.info{background:#bbdefb}\
.steps{display:flex;gap:8px;margin-bottom:20px;flex-wrap:wrap}.steps span{font-size:.85em;color:#777}\
.steps span.active{color:#1976d2;font-weight:600}.steps span.done{color:#2e7d32}\
label{display:block;margin:12px 0 4px}input[type=text],input[type=email],input[type=password],input[type=number],textarea,select{width:100%;padding:8px;box-sizing:border-box}\
.choice{display:block;margin:6px 0}.actions{display:flex;justify-content:space-between;margin-top:16px}\
pre{white-space:pre-wrap;font-family:inherit}";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Success,
    Info,
}

impl Severity {
    fn class(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Success => "success",
            Severity::Info => "info",
        }
    }
}

/// Message shown above a page's content.
#[derive(Clone, Debug)]
pub struct Flash {
    pub severity: Severity,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn render(&self) -> String {
        alert(self.severity, &self.message)
    }
}

pub fn alert(severity: Severity, message: &str) -> String {
    format!(
        r#"<div class="alert {}" role="alert">{}</div>"#,
        severity.class(),
        escape(message)
    )
}

pub fn flash_html(flash: Option<&Flash>) -> String {
    flash.map(Flash::render).unwrap_or_default()
}

pub fn chip(label: &str, class: &str) -> String {
    format!(r#"<span class="chip {}">{}</span>"#, class, escape(label))
}

fn nav(identity: Option<&Identity>) -> String {
    let Some(identity) = identity else {
        return r#"<a href="/login">Login</a>"#.to_string();
    };

    let links = match identity.role {
        Role::Admin => {
            r#"<a href="/">Home</a><a href="/admin/questions">Questions</a><a href="/admin/responses">Responses</a>"#
        }
        Role::Client => r#"<a href="/">Home</a><a href="/questionnaire">Questionnaire</a>"#,
    };
    format!(
        r#"{links}<span>{}</span><form method="post" action="/logout" style="margin:0"><button type="submit">Logout</button></form>"#,
        escape(identity.display_name())
    )
}

/// Full HTML document around `body`.
pub fn page(title: &str, identity: Option<&Identity>, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · {app}</title>
<style>{style}</style>
</head>
<body>
<header><span class="brand">{app}</span>{nav}</header>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        app = APP_TITLE,
        style = STYLE,
        nav = nav(identity),
        body = body,
    ))
}

/// Shown while the session store is still hydrating; the browser retries.
pub fn loading_page() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::REFRESH, "1"), (header::CACHE_CONTROL, "no-store")],
        page("Loading...", None, r#"<p>Loading...</p>"#),
    )
        .into_response()
}

pub fn message_page(
    status: StatusCode,
    title: &str,
    identity: Option<&Identity>,
    message: &str,
    back: Option<(&str, &str)>,
) -> Response {
    let back = back
        .map(|(href, label)| {
            format!(
                r#"<p><a class="btn" href="{}">{}</a></p>"#,
                escape(href),
                escape(label)
            )
        })
        .unwrap_or_default();
    let body = format!("{}{}", alert(Severity::Error, message), back);
    (status, page(title, identity, &body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
        assert_eq!(escape("plain text"), "plain text");
    }

    #[test]
    fn test_nav_by_role() {
        let admin = Identity {
            role: Role::Admin,
            handle: "root".to_string(),
            full_name: None,
            marketing_consent: false,
            credential: "t".to_string(),
        };
        let html = page("Home", Some(&admin), "").0;
        assert!(html.contains("/admin/questions"));
        assert!(html.contains("Logout"));

        let client = Identity {
            role: Role::Client,
            handle: "c@example.com".to_string(),
            ..admin
        };
        let html = page("Home", Some(&client), "").0;
        assert!(!html.contains("/admin/questions"));
        assert!(html.contains("/questionnaire"));

        assert!(page("Login", None, "").0.contains(r#"href="/login""#));
    }

    #[test]
    fn test_flash_is_escaped() {
        let html = Flash::error("<b>bad</b>").render();
        assert!(html.contains("alert error"));
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
    }
}
