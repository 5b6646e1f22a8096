// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::{DateTime, Local};

use crate::{files::DirEntry, param::STATUS_CODES};

pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or("Unknown Status"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    /// 生成目录列表页面，每个条目一个链接。
    ///
    /// `dir_segments` 是目录解码后的路径片段，链接由它们逐段百分号编码后拼出，
    /// 因此同一个目录无论以何种写法被请求，生成的页面都相同。
    /// 条目部分的总长度不超过 `budget` 字节；放不下的条目被省略，
    /// 页面末尾给出省略说明。返回值的第二项是被省略的条目数。
    pub fn from_dir(dir_segments: &[String], entries: &mut [DirEntry], budget: usize) -> (Self, usize) {
        sort_dir_entries(entries);

        let mut base = String::from("/");
        let mut display = String::from("/");
        for segment in dir_segments {
            base.push_str(&urlencoding::encode(segment));
            base.push('/');
            display.push_str(segment);
            display.push('/');
        }
        let display_path = escape_html(&display);

        let mut body = String::new();
        body.push_str(&format!("<h1>{}的文件列表</h1><hr>", display_path));
        body.push_str(
            r#"
            <table>
            <tr>
                <td>文件名</td>
                <td>大小</td>
                <td>修改时间</td>
            </tr>
            "#,
        );

        let mut used = 0;
        let mut omitted = 0;
        for entry in entries.iter() {
            if omitted > 0 {
                omitted += 1;
                continue;
            }
            let row = dir_row(&base, entry);
            if used + row.len() > budget {
                omitted += 1;
                continue;
            }
            used += row.len();
            body.push_str(&row);
        }
        body.push_str("</table>");
        if omitted > 0 {
            body.push_str(&format!(
                r#"<p class="truncated">列表过长，另有{}个条目未显示。</p>"#,
                omitted
            ));
        }

        let title = format!("{}的文件列表", display_path);
        let css = r"
            table {
                border-collapse: collapse;
                width: 100%;
            }

            td {
                padding: 8px;
                white-space: pre-wrap; /* 保留换行符和空格 */
                border: none; /* 隐藏单元格边框 */
            }"
        .to_string();
        (Self { title, css, body }, omitted)
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

fn dir_row(base: &str, entry: &DirEntry) -> String {
    let formatted_time = match entry.modified {
        Some(time) => {
            let local_time: DateTime<Local> = time.into();
            local_time.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        None => "".to_string(),
    };
    let encoded = urlencoding::encode(&entry.name);
    let (name, href, size) = if entry.is_dir {
        (
            [entry.name.as_str(), "/"].concat(),
            [base, &*encoded, "/"].concat(),
            "文件夹".to_string(),
        )
    } else {
        (
            entry.name.clone(),
            [base, &*encoded].concat(),
            format_file_size(entry.size),
        )
    };
    format!(
        r#"
            <tr>
                <td><a href="{}">{}</a></td>
                <td>{}</td>
                <td>{}</td>
            </tr>
            "#,
        href,
        escape_html(&name),
        size,
        formatted_time
    )
}

pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn format_file_size(size: u64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < units.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

// 文件夹在前，同类按名称排序
fn sort_dir_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
}
