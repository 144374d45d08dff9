//! Server-side HTML for the single page.
//!
//! Every action ends in a redirect to `/`, which renders the whole page from
//! a [`PageView`]. No client-side script is involved.

use std::fmt::Write;

use crate::models::{ChatMessage, Notice, Role};
use crate::session::{Phase, PLEASE_UPLOAD, PROCESSING};

/// Everything the page shows for one session at one moment.
#[derive(Debug, Clone)]
pub struct PageView {
    pub files: Vec<String>,
    pub phase: Phase,
    pub transcript: Vec<ChatMessage>,
    pub notices: Vec<Notice>,
}

impl PageView {
    pub fn form_enabled(&self) -> bool {
        self.phase == Phase::Ready
    }
}

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:0;display:flex;min-height:100vh;color:#222}\
aside{width:300px;padding:20px;background:#f4f5f7;border-right:1px solid #ddd}\
main{flex:1;padding:20px 40px;max-width:900px}\
.main-title{margin-bottom:0}.subtitle{color:#666;margin-top:4px}\
.notice{padding:10px 14px;border-radius:6px;margin:8px 0}\
.notice-success{background:#e6f4ea}.notice-info{background:#e8f0fe}\
.notice-warning{background:#fff4e5}.notice-error{background:#fdecea}\
.user-message{background:#e8f0fe;padding:10px;border-radius:8px;margin:8px 0}\
.bot-message{background:#f1f3f4;padding:10px;border-radius:8px;margin:8px 0}\
.sources{color:#666;font-size:0.85em;margin-top:6px}\
.file{display:flex;justify-content:space-between;align-items:center}\
footer{text-align:center;color:#666;padding:20px}";

const HOW_IT_WORKS: &str = "\
<details><summary>🤔 How does this work?</summary><ol>\
<li><strong>📤 Upload</strong>: PDF or DOCX documents</li>\
<li><strong>🔍 Process</strong>: Text is split, embedded, and indexed</li>\
<li><strong>💬 Ask</strong>: Query and get smart answers!</li>\
</ol><p>Great for students, researchers, or anyone studying from documents.</p></details>";

const EXAMPLE_QUESTIONS: &str = "\
<details><summary>💡 Example Questions</summary><ul>\
<li>What are the main points of the document?</li>\
<li>What does [term] mean?</li>\
<li>Explain [concept] simply.</li>\
<li>How does X compare to Y?</li>\
<li>What are the steps to do [process]?</li>\
</ul></details>";

pub fn page(view: &PageView) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">");
    html.push_str("<title>Ask Your Documents</title>");
    let _ = write!(html, "<style>{}</style></head><body>", STYLE);

    sidebar(&mut html, &view.files);

    html.push_str("<main>");
    html.push_str("<h1 class=\"main-title\">📚 Ask Your Documents</h1>");
    html.push_str(
        "<p class=\"subtitle\">Upload your study materials and ask questions - AI will find the answers!</p>",
    );
    for notice in &view.notices {
        banner(&mut html, notice);
    }
    html.push_str(HOW_IT_WORKS);

    if !view.transcript.is_empty() {
        html.push_str("<h3>💬 Conversation History</h3>");
        for message in &view.transcript {
            transcript_entry(&mut html, message);
        }
    }

    html.push_str("<h3>💭 Ask Your Question</h3>");
    match view.phase {
        Phase::NoFiles => banner(&mut html, &Notice::warning(PLEASE_UPLOAD)),
        Phase::Pending => banner(&mut html, &Notice::info(PROCESSING)),
        Phase::Ready => {}
    }
    question_form(&mut html, view.form_enabled());

    if view.form_enabled() {
        html.push_str(EXAMPLE_QUESTIONS);
    }
    if !view.transcript.is_empty() {
        html.push_str(
            "<form method=\"post\" action=\"/clear\"><button type=\"submit\">🗑️ Clear Conversation</button></form>",
        );
    }

    html.push_str("<hr><footer><h4>🎓 Perfect for Students and Researchers!</h4></footer>");
    html.push_str("</main></body></html>");
    html
}

fn sidebar(html: &mut String, files: &[String]) {
    html.push_str("<aside><h2>📤 Upload Your Files</h2>");
    html.push_str(
        "<form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\
         <label>Choose a PDF or Word file<br>\
         <input type=\"file\" name=\"file\" accept=\".pdf,.docx\" required></label>\
         <button type=\"submit\">Upload</button></form>",
    );

    html.push_str("<h3>📋 Your Uploaded Files:</h3>");
    if files.is_empty() {
        banner(html, &Notice::info("No files uploaded yet."));
    }
    for name in files {
        let name = escape_html(name);
        let _ = write!(
            html,
            "<div class=\"file\"><span>📄 {name}</span>\
             <form method=\"post\" action=\"/delete\">\
             <input type=\"hidden\" name=\"name\" value=\"{name}\">\
             <button type=\"submit\" title=\"Delete {name}\">🗑️</button></form></div>"
        );
    }
    html.push_str("</aside>");
}

fn banner(html: &mut String, notice: &Notice) {
    let _ = write!(
        html,
        "<div class=\"notice notice-{}\">{}</div>",
        notice.level,
        escape_html(&notice.message)
    );
}

fn transcript_entry(html: &mut String, message: &ChatMessage) {
    let (class, label) = match message.role {
        Role::User => ("user-message", "🙋 You asked:"),
        Role::Assistant => ("bot-message", "🤖 AI answered:"),
    };
    let _ = write!(
        html,
        "<div class=\"{class}\" data-role=\"{}\"><strong>{label}</strong> {}",
        message.role.as_str(),
        escape_html(&message.content)
    );
    if !message.sources.is_empty() {
        let sources: Vec<String> = message.sources.iter().map(|s| escape_html(s)).collect();
        let _ = write!(
            html,
            "<div class=\"sources\">Sources: {}</div>",
            sources.join(", ")
        );
    }
    html.push_str("</div>");
}

fn question_form(html: &mut String, enabled: bool) {
    let disabled = if enabled { "" } else { " disabled" };
    let _ = write!(
        html,
        "<form method=\"post\" action=\"/ask\">\
         <fieldset{disabled}>\
         <input type=\"text\" name=\"question\" placeholder=\"E.g. What is chapter 3 about?\" \
         aria-label=\"Ask something...\" size=\"60\">\
         <button type=\"submit\">🚀 Get Answer</button>\
         </fieldset></form>"
    );
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
