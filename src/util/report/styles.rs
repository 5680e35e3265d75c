//! CSS样式管理模块
//! 集中管理页面样式，浅色/深色主题通过 CSS 变量切换

/// 页面主样式
pub fn get_app_css() -> &'static str {
    r#"
        :root {
            --bg: #f7f7f5;
            --surface: #ffffff;
            --text: #1f2328;
            --muted: #6b7280;
            --border: #d8dadd;
            --accent: #2563eb;
            --accent-text: #ffffff;
            --success-bg: #e7f6ec;
            --success-text: #166534;
            --error-bg: #fdecec;
            --error-text: #991b1b;
        }
        @media (prefers-color-scheme: dark) {
            :root:not([data-theme="light"]) {
                --bg: #15171a;
                --surface: #1e2125;
                --text: #e6e6e6;
                --muted: #9ca3af;
                --border: #33373d;
                --accent: #60a5fa;
                --accent-text: #0b1220;
                --success-bg: #173323;
                --success-text: #86efac;
                --error-bg: #3b1a1a;
                --error-text: #fca5a5;
            }
        }
        :root[data-theme="dark"] {
            --bg: #15171a;
            --surface: #1e2125;
            --text: #e6e6e6;
            --muted: #9ca3af;
            --border: #33373d;
            --accent: #60a5fa;
            --accent-text: #0b1220;
            --success-bg: #173323;
            --success-text: #86efac;
            --error-bg: #3b1a1a;
            --error-text: #fca5a5;
        }
        * { box-sizing: border-box; }
        body {
            font-family: -apple-system, "Segoe UI", Roboto, Arial, sans-serif;
            margin: 0;
            line-height: 1.5;
            color: var(--text);
            background: var(--bg);
        }
        a { color: var(--accent); }
        .topbar {
            display: flex;
            align-items: center;
            gap: 16px;
            padding: 12px 24px;
            background: var(--surface);
            border-bottom: 1px solid var(--border);
        }
        .topbar .brand { font-weight: bold; margin-right: 8px; }
        .topbar nav a { margin-right: 14px; text-decoration: none; }
        .topbar .theme-toggle { margin-left: auto; }
        main { max-width: 960px; margin: 24px auto; padding: 0 24px; }
        .flash {
            padding: 10px 14px;
            border-radius: 6px;
            margin-bottom: 12px;
        }
        .flash.success { background: var(--success-bg); color: var(--success-text); }
        .flash.error { background: var(--error-bg); color: var(--error-text); }
        .card {
            background: var(--surface);
            border: 1px solid var(--border);
            border-radius: 8px;
            padding: 16px 20px;
            margin-bottom: 20px;
        }
        .stats { display: flex; gap: 20px; }
        .stats .stat { font-size: 1.6em; font-weight: bold; }
        table { border-collapse: collapse; width: 100%; background: var(--surface); }
        th, td {
            padding: 8px 10px;
            border-bottom: 1px solid var(--border);
            text-align: left;
            vertical-align: top;
        }
        th { color: var(--muted); font-weight: 600; }
        .muted { color: var(--muted); }
        .tag {
            display: inline-block;
            padding: 1px 8px;
            margin: 0 4px 4px 0;
            border-radius: 10px;
            border: 1px solid var(--border);
            font-size: 0.85em;
        }
        form.inline { display: inline; }
        label { display: block; margin: 8px 0 4px; }
        input[type="text"], input[type="date"], select {
            padding: 6px 8px;
            border: 1px solid var(--border);
            border-radius: 4px;
            background: var(--bg);
            color: var(--text);
        }
        button, .button {
            padding: 6px 14px;
            border: 0;
            border-radius: 4px;
            background: var(--accent);
            color: var(--accent-text);
            cursor: pointer;
            text-decoration: none;
        }
        button.secondary { background: transparent; color: var(--accent); border: 1px solid var(--border); }
        button.danger { background: #dc2626; color: #ffffff; }
        pre.extracted {
            white-space: pre-wrap;
            background: var(--bg);
            border: 1px solid var(--border);
            padding: 12px;
            border-radius: 6px;
            max-height: 420px;
            overflow: auto;
        }
        .filters { display: flex; flex-wrap: wrap; gap: 16px; align-items: flex-end; }
        .error-page { text-align: center; padding: 48px 0; }
    "#
}
