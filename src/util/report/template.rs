//! 页面布局与 HTML 片段工具
//! build_html 不做转义，所有用户内容必须经过 escape_html

use crate::db::{ReceiptRecord, TagRecord};
use crate::util::session::PageContext;
use build_html::{Html, HtmlContainer, HtmlPage};

const APP_TITLE: &str = "Expense Receipts";

const NAV_LINKS: [(&str, &str); 6] = [
    ("/", "Home"),
    ("/receipts/", "Receipts"),
    ("/receipts/upload", "Upload"),
    ("/search/", "Search"),
    ("/reports/", "Reports"),
    ("/tags/", "Tags"),
];

// 记住用户选择的主题，没有选择时跟随系统
const THEME_SCRIPT: &str = r#"<script>
(function () {
  var KEY = "expense-receipts-theme";
  var root = document.documentElement;
  function preferred() {
    var stored = localStorage.getItem(KEY);
    if (stored === "dark" || stored === "light") return stored;
    return window.matchMedia && window.matchMedia("(prefers-color-scheme: dark)").matches ? "dark" : "light";
  }
  function apply(theme) {
    root.setAttribute("data-theme", theme);
    localStorage.setItem(KEY, theme);
  }
  apply(preferred());
  var toggle = document.getElementById("theme-toggle");
  if (toggle) {
    toggle.addEventListener("click", function () {
      apply(root.getAttribute("data-theme") === "dark" ? "light" : "dark");
    });
  }
})();
</script>"#;

/// HTML 文本/属性转义
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// 查询参数编码
pub fn encode_query(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// 带导航、提示消息和主题切换的完整页面
pub fn render_layout(title: &str, ctx: &PageContext, body: &str) -> String {
    let mut page = HtmlPage::new()
        .with_title(format!("{} - {}", escape_html(title), APP_TITLE))
        .with_meta(vec![("charset", "utf-8")])
        .with_meta(vec![
            ("name", "viewport"),
            ("content", "width=device-width, initial-scale=1"),
        ])
        .with_style(super::styles::get_app_css());

    page.add_raw(&render_topbar());
    page.add_raw("<main>");
    for flash in &ctx.flashes {
        page.add_raw(&format!(
            "<div class=\"flash {}\">{}</div>",
            flash.category.as_str(),
            escape_html(&flash.message)
        ));
    }
    page.add_raw(body);
    page.add_raw("</main>");
    page.add_raw(THEME_SCRIPT);

    page.to_html_string()
}

fn render_topbar() -> String {
    let mut nav = String::from("<header class=\"topbar\">");
    nav.push_str(&format!("<span class=\"brand\">{}</span><nav>", APP_TITLE));
    for (href, label) in NAV_LINKS {
        nav.push_str(&format!("<a href=\"{}\">{}</a>", href, label));
    }
    nav.push_str("</nav>");
    nav.push_str(
        "<button type=\"button\" id=\"theme-toggle\" class=\"secondary theme-toggle\">Toggle theme</button>",
    );
    nav.push_str("</header>");
    nav
}

/// 隐藏的 CSRF 字段
pub fn csrf_field(token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"csrf_token\" value=\"{}\">",
        escape_html(token)
    )
}

/// 只有一个按钮的 POST 表单
pub fn post_button(action: &str, token: &str, label: &str, class: &str, confirm: Option<&str>) -> String {
    let onsubmit = confirm
        .map(|msg| format!(" onsubmit=\"return confirm('{}');\"", escape_html(msg)))
        .unwrap_or_default();
    format!(
        "<form class=\"inline\" method=\"post\" action=\"{}\"{}>{}<button type=\"submit\" class=\"{}\">{}</button></form>",
        escape_html(action),
        onsubmit,
        csrf_field(token),
        class,
        escape_html(label)
    )
}

pub fn tag_chips(tags: &[TagRecord]) -> String {
    if tags.is_empty() {
        return "<span class=\"muted\">-</span>".to_string();
    }
    tags.iter()
        .map(|t| format!("<span class=\"tag\">{}</span>", escape_html(&t.name)))
        .collect()
}

/// 小票列表表格
pub fn receipts_table(receipts: &[ReceiptRecord]) -> String {
    if receipts.is_empty() {
        return "<p class=\"muted\">No receipts found.</p>".to_string();
    }
    let mut html = String::from(
        "<table><thead><tr><th>Date</th><th>Merchant</th><th>Tags</th><th>File</th><th>Uploaded</th></tr></thead><tbody>",
    );
    for receipt in receipts {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><a href=\"/receipts/{}\">{}</a></td><td class=\"muted\">{}</td></tr>",
            receipt.effective_date().format("%Y-%m-%d"),
            receipt
                .merchant
                .as_deref()
                .map(escape_html)
                .unwrap_or_else(|| "<span class=\"muted\">-</span>".to_string()),
            tag_chips(&receipt.tags),
            receipt.id,
            escape_html(&receipt.original_filename),
            receipt.created_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    html.push_str("</tbody></table>");
    html
}
