//! HTML页面生成模块
//! 将查询结果渲染为完整页面，布局见 template.rs

use super::template::{
    csrf_field, encode_query, escape_html, post_button, receipts_table, render_layout, tag_chips,
};
use super::{Report, ReportKind};
use crate::api::utils::SearchParams;
use crate::db::{ReceiptRecord, TagRecord, MAX_TAG_NAME_LEN};
use crate::util::session::PageContext;

/// 页面渲染器
pub struct PageRenderer;

impl PageRenderer {
    /// 首页：统计 + 最近上传
    pub fn home(ctx: &PageContext, receipt_count: i64, tag_count: usize, recent: &[ReceiptRecord]) -> String {
        let mut body = String::from("<h1>Expense Receipts</h1>");
        body.push_str(&format!(
            "<div class=\"card stats\"><div><div class=\"stat\">{}</div><div class=\"muted\">receipts</div></div>\
             <div><div class=\"stat\">{}</div><div class=\"muted\">tags</div></div></div>",
            receipt_count, tag_count
        ));
        body.push_str("<div class=\"card\"><h2>Recent receipts</h2>");
        body.push_str(&receipts_table(recent));
        body.push_str("<p><a class=\"button\" href=\"/receipts/upload\">Upload a receipt</a></p></div>");
        render_layout("Home", ctx, &body)
    }

    pub fn receipts_index(ctx: &PageContext, receipts: &[ReceiptRecord]) -> String {
        let mut body = String::from("<h1>Receipts</h1><div class=\"card\">");
        body.push_str(&receipts_table(receipts));
        body.push_str("</div>");
        render_layout("Receipts", ctx, &body)
    }

    pub fn upload_form(ctx: &PageContext, allowed_extensions: &[String], max_mb: u64) -> String {
        let accept = allowed_extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(",");
        let body = format!(
            "<h1>Upload receipt</h1><div class=\"card\">\
             <form method=\"post\" action=\"/receipts/upload\" enctype=\"multipart/form-data\">{}\
             <label for=\"file\">Receipt file</label>\
             <input type=\"file\" id=\"file\" name=\"file\" accept=\"{}\">\
             <p class=\"muted\">Allowed: {}. Maximum size {} MB.</p>\
             <button type=\"submit\">Upload</button></form></div>",
            csrf_field(&ctx.csrf_token),
            escape_html(&accept),
            escape_html(&allowed_extensions.join(", ").to_uppercase()),
            max_mb
        );
        render_layout("Upload", ctx, &body)
    }

    /// 详情页：元数据、标签管理、识别文本
    pub fn receipt_detail(ctx: &PageContext, receipt: &ReceiptRecord, all_tags: &[TagRecord]) -> String {
        let token = &ctx.csrf_token;
        let id = receipt.id;
        let mut body = format!("<h1>{}</h1>", escape_html(&receipt.original_filename));

        body.push_str("<div class=\"card\"><table>");
        body.push_str(&format!(
            "<tr><th>Date</th><td>{}{}</td></tr>",
            receipt.effective_date().format("%Y-%m-%d"),
            if receipt.receipt_date.is_none() {
                " <span class=\"muted\">(upload date)</span>"
            } else {
                ""
            }
        ));
        body.push_str(&format!(
            "<tr><th>Merchant</th><td>{}</td></tr>",
            receipt
                .merchant
                .as_deref()
                .map(escape_html)
                .unwrap_or_else(|| "<span class=\"muted\">unknown</span>".to_string())
        ));
        body.push_str(&format!(
            "<tr><th>Uploaded</th><td>{}</td></tr>",
            receipt.created_at.format("%Y-%m-%d %H:%M")
        ));
        body.push_str(&format!(
            "<tr><th>File</th><td><a href=\"/receipts/{}/file\" target=\"_blank\">View original</a></td></tr>",
            id
        ));
        body.push_str("</table></div>");

        // 标签
        body.push_str("<div class=\"card\"><h2>Tags</h2>");
        if receipt.tags.is_empty() {
            body.push_str("<p class=\"muted\">No tags yet.</p>");
        } else {
            body.push_str("<ul>");
            for tag in &receipt.tags {
                body.push_str(&format!(
                    "<li><span class=\"tag\">{}</span> <form class=\"inline\" method=\"post\" action=\"/receipts/{}/tags\">{}\
                     <input type=\"hidden\" name=\"tag_id\" value=\"{}\"><input type=\"hidden\" name=\"action\" value=\"remove\">\
                     <button type=\"submit\" class=\"secondary\">Remove</button></form></li>",
                    escape_html(&tag.name),
                    id,
                    csrf_field(token),
                    tag.id
                ));
            }
            body.push_str("</ul>");
        }
        let available: Vec<&TagRecord> = all_tags.iter().filter(|t| !receipt.has_tag(t.id)).collect();
        if !available.is_empty() {
            body.push_str(&format!(
                "<form method=\"post\" action=\"/receipts/{}/tags\">{}<input type=\"hidden\" name=\"action\" value=\"add\">\
                 <select name=\"tag_id\">",
                id,
                csrf_field(token)
            ));
            for tag in available {
                body.push_str(&format!(
                    "<option value=\"{}\">{}</option>",
                    tag.id,
                    escape_html(&tag.name)
                ));
            }
            body.push_str("</select> <button type=\"submit\">Add tag</button></form>");
        } else if all_tags.is_empty() {
            body.push_str("<p class=\"muted\">Create tags on the <a href=\"/tags/\">Tags</a> page.</p>");
        }
        body.push_str("</div>");

        // 手工修正
        body.push_str(&format!(
            "<div class=\"card\"><h2>Edit details</h2><form method=\"post\" action=\"/receipts/{}/meta\">{}\
             <div class=\"filters\"><div><label for=\"merchant\">Merchant</label>\
             <input type=\"text\" id=\"merchant\" name=\"merchant\" value=\"{}\"></div>\
             <div><label for=\"receipt_date\">Receipt date</label>\
             <input type=\"date\" id=\"receipt_date\" name=\"receipt_date\" value=\"{}\"></div>\
             <div><button type=\"submit\">Save</button></div></div></form></div>",
            id,
            csrf_field(token),
            escape_html(receipt.merchant.as_deref().unwrap_or("")),
            receipt
                .receipt_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        ));

        // 识别文本
        body.push_str("<div class=\"card\"><h2>Extracted text</h2>");
        match receipt.extracted_text.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                body.push_str(&format!("<pre class=\"extracted\">{}</pre>", escape_html(text)));
            }
            _ => body.push_str("<p class=\"muted\">No text was extracted from this file.</p>"),
        }
        body.push_str("<p>");
        body.push_str(&post_button(
            &format!("/receipts/{}/reprocess", id),
            token,
            "Run text extraction again",
            "secondary",
            None,
        ));
        body.push(' ');
        body.push_str(&post_button(
            &format!("/receipts/{}/delete", id),
            token,
            "Delete receipt",
            "danger",
            Some("Delete this receipt and its file?"),
        ));
        body.push_str("</p></div>");

        render_layout(&receipt.original_filename, ctx, &body)
    }

    /// 搜索页：表单回显 + 结果 + 导出链接
    pub fn search(
        ctx: &PageContext,
        receipts: &[ReceiptRecord],
        all_tags: &[TagRecord],
        params: &SearchParams,
    ) -> String {
        let mut body = String::from("<h1>Search</h1><div class=\"card\"><form method=\"get\" action=\"/search/\">");
        if !all_tags.is_empty() {
            body.push_str("<fieldset><legend>Tags (any)</legend>");
            for tag in all_tags {
                let checked = if params.tag_ids.contains(&tag.id) { " checked" } else { "" };
                body.push_str(&format!(
                    "<label class=\"inline\"><input type=\"checkbox\" name=\"tag_id\" value=\"{}\"{}> {}</label>",
                    tag.id,
                    checked,
                    escape_html(&tag.name)
                ));
            }
            body.push_str("</fieldset>");
        }
        body.push_str(&format!(
            "<div class=\"filters\">\
             <div><label for=\"date_from\">From</label><input type=\"date\" id=\"date_from\" name=\"date_from\" value=\"{}\"></div>\
             <div><label for=\"date_to\">To</label><input type=\"date\" id=\"date_to\" name=\"date_to\" value=\"{}\"></div>\
             <div><label for=\"merchant\">Merchant or text</label><input type=\"text\" id=\"merchant\" name=\"merchant\" value=\"{}\"></div>\
             <div><button type=\"submit\">Search</button></div></div></form></div>",
            escape_html(&params.date_from),
            escape_html(&params.date_to),
            escape_html(&params.merchant)
        ));

        let query = params.to_query_string();
        let export_href = if query.is_empty() {
            "/export/receipts.csv".to_string()
        } else {
            format!("/export/receipts.csv?{}", query)
        };
        body.push_str(&format!(
            "<div class=\"card\"><h2>{} result{}</h2><p><a href=\"{}\">Export CSV</a></p>",
            receipts.len(),
            if receipts.len() == 1 { "" } else { "s" },
            escape_html(&export_href)
        ));
        body.push_str(&receipts_table(receipts));
        body.push_str("</div>");

        render_layout("Search", ctx, &body)
    }

    /// 报告页；未选择类型时只显示表单
    pub fn reports(
        ctx: &PageContext,
        report: Option<&Report>,
        date_from: &str,
        date_to: &str,
    ) -> String {
        let selected = report.map(|r| r.kind);
        let option = |kind: ReportKind| {
            format!(
                "<option value=\"{}\"{}>{}</option>",
                kind.as_str(),
                if selected == Some(kind) { " selected" } else { "" },
                kind.title()
            )
        };
        let mut body = format!(
            "<h1>Reports</h1><div class=\"card\"><form method=\"get\" action=\"/reports/\"><div class=\"filters\">\
             <div><label for=\"type\">Report</label><select id=\"type\" name=\"type\">{}{}</select></div>\
             <div><label for=\"date_from\">From</label><input type=\"date\" id=\"date_from\" name=\"date_from\" value=\"{}\"></div>\
             <div><label for=\"date_to\">To</label><input type=\"date\" id=\"date_to\" name=\"date_to\" value=\"{}\"></div>\
             <div><button type=\"submit\">Show</button></div></div></form></div>",
            option(ReportKind::ByMonth),
            option(ReportKind::ByTag),
            escape_html(date_from),
            escape_html(date_to)
        );

        if let Some(report) = report {
            let csv_href = format!(
                "/reports/?type={}&date_from={}&date_to={}&format=csv",
                report.kind.as_str(),
                encode_query(date_from),
                encode_query(date_to)
            );
            body.push_str(&format!(
                "<div class=\"card\"><h2>{}</h2><p><a href=\"{}\">Download CSV</a></p>",
                report.kind.title(),
                escape_html(&csv_href)
            ));
            if report.rows.is_empty() {
                body.push_str("<p class=\"muted\">No data for this period.</p>");
            } else {
                body.push_str(&format!(
                    "<table><thead><tr><th>{}</th><th>Count</th></tr></thead><tbody>",
                    if report.kind == ReportKind::ByMonth { "Month" } else { "Tag" }
                ));
                for row in &report.rows {
                    body.push_str(&format!(
                        "<tr><td>{}</td><td>{}</td></tr>",
                        escape_html(&row.key),
                        row.count
                    ));
                }
                body.push_str("</tbody></table>");
            }
            body.push_str("</div>");
        }

        render_layout("Reports", ctx, &body)
    }

    pub fn tags_index(ctx: &PageContext, tags: &[TagRecord]) -> String {
        let token = &ctx.csrf_token;
        let mut body = format!(
            "<h1>Tags</h1><div class=\"card\"><form method=\"post\" action=\"/tags/create\">{}\
             <label for=\"name\">New tag</label><input type=\"text\" id=\"name\" name=\"name\" maxlength=\"{}\" required> \
             <button type=\"submit\">Create</button></form></div><div class=\"card\">",
            csrf_field(token),
            MAX_TAG_NAME_LEN
        );
        if tags.is_empty() {
            body.push_str("<p class=\"muted\">No tags yet.</p>");
        } else {
            body.push_str("<table><thead><tr><th>Name</th><th></th></tr></thead><tbody>");
            for tag in tags {
                body.push_str(&format!(
                    "<tr><td>{}</td><td><a href=\"/tags/{}/edit\">Rename</a> {}</td></tr>",
                    tag_chips(std::slice::from_ref(tag)),
                    tag.id,
                    post_button(
                        &format!("/tags/{}/delete", tag.id),
                        token,
                        "Delete",
                        "danger",
                        Some("Delete this tag from all receipts?"),
                    )
                ));
            }
            body.push_str("</tbody></table>");
        }
        body.push_str("</div>");
        render_layout("Tags", ctx, &body)
    }

    pub fn tag_edit(ctx: &PageContext, tag: &TagRecord) -> String {
        let body = format!(
            "<h1>Rename tag</h1><div class=\"card\"><form method=\"post\" action=\"/tags/{}/edit\">{}\
             <label for=\"name\">Name</label><input type=\"text\" id=\"name\" name=\"name\" value=\"{}\" maxlength=\"{}\" required> \
             <button type=\"submit\">Save</button> <a href=\"/tags/\">Cancel</a></form></div>",
            tag.id,
            csrf_field(&ctx.csrf_token),
            escape_html(&tag.name),
            MAX_TAG_NAME_LEN
        );
        render_layout("Rename tag", ctx, &body)
    }

    /// 错误页（不依赖会话）
    pub fn error_page(status: u16, title: &str, message: &str) -> String {
        let body = format!(
            "<div class=\"error-page\"><h1>{} {}</h1><p>{}</p><p><a href=\"/\">Back to home</a></p></div>",
            status,
            escape_html(title),
            escape_html(message)
        );
        render_layout(title, &PageContext::default(), &body)
    }
}
