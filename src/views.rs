//! HTML for the two pages the server renders. Templates use `{{name}}`
//! placeholders; every substituted value is escaped here.

use axum::response::Html;

use crate::models::FileEntry;
use crate::services::{ActiveTab, SharePage};
use crate::utils::escape_html;

const SHARE_TEMPLATE: &str = include_str!("templates/share.html");
const LOGIN_TEMPLATE: &str = include_str!("templates/login.html");

const HIDDEN: &str = r#"style="display: none;""#;

pub fn share_page(page: &SharePage, show_logout: bool) -> Html<String> {
    let tab_class = |tab: ActiveTab| if page.active_tab == tab { "active" } else { "" };
    let has_files = !page.files.is_empty();

    let logout_form = if show_logout {
        r#"<form class="logout" method="post" action="/logout"><button type="submit">Lock</button></form>"#
    } else {
        ""
    };

    let html = SHARE_TEMPLATE
        .replace("{{logout_form}}", logout_form)
        .replace("{{clipboard_tab_class}}", tab_class(ActiveTab::Clipboard))
        .replace("{{files_tab_class}}", tab_class(ActiveTab::Files))
        .replace("{{download_all_style}}", if has_files { "" } else { HIDDEN })
        .replace("{{no_files_style}}", if has_files { HIDDEN } else { "" })
        .replace("{{file_items}}", &file_items(&page.files))
        .replace("{{files_json}}", &script_json(&page.files))
        // Last, so placeholder-looking text in the clipboard stays literal
        .replace("{{clipboard_text}}", &escape_html(&page.clipboard_text));

    Html(html)
}

pub fn login_page(error: Option<&str>) -> Html<String> {
    let error = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    Html(LOGIN_TEMPLATE.replace("{{error}}", &error))
}

fn file_items(files: &[FileEntry]) -> String {
    files
        .iter()
        .map(|file| {
            format!(
                r#"<li><span>{}</span><a href="{}"><button>Download</button></a></li>"#,
                escape_html(&file.name),
                escape_html(&file.url)
            )
        })
        .collect()
}

/// JSON safe to embed inside a `<script>` element
fn script_json(files: &[FileEntry]) -> String {
    serde_json::to_string(files)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/")
}
