//! Markdown helpers — model answers arrive as markdown and are shown as HTML.

use pulldown_cmark::{html, Event, Options, Parser};

/// Renders markdown to an HTML fragment (tables and strikethrough enabled).
///
/// Raw HTML in the input is shown as text, never passed through.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });
    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, parser);
    html_output
}

/// Renders rows as a GitHub-style pipe table.
pub fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&table_row(headers.iter().map(String::as_str)));
    out.push_str(&table_row(headers.iter().map(|_| "---")));
    for row in rows {
        out.push_str(&table_row(row.iter().map(String::as_str)));
    }
    out
}

fn table_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells.map(escape_cell).collect();
    format!("| {} |\n", cells.join(" | "))
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\n', '\r'], " ")
}
