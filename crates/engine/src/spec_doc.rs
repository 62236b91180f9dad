// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Specification-document surgery.
//!
//! The closeout manager owns exactly two mutations of the project's
//! PRD/COMMAND-POST document: the `commandPost.status` / `built_at`
//! keys in the front matter, and the `## Actuals` section. Everything
//! else in the document is preserved byte for byte.

/// Set `commandPost.status` and `commandPost.built_at` in the YAML-like
/// front matter, creating the block or the keys as needed.
pub fn update_front_matter(text: &str, status: &str, built_at: &str) -> String {
    let (mut front, body) = split_front_matter(text);
    set_command_post_keys(&mut front, status, built_at);

    let mut out = String::from("---\n");
    for line in &front {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("---\n");
    out.push_str(&body);
    out
}

/// Replace the `## Actuals` section (up to the next `## ` header or
/// EOF), or append one when the document has none. `section` must begin
/// with the `## Actuals` header.
pub fn inject_actuals(text: &str, section: &str) -> String {
    let section = section.trim_end();
    let lines: Vec<&str> = text.lines().collect();

    let Some(start) = lines.iter().position(|l| l.trim_end() == "## Actuals") else {
        let mut out = text.trim_end().to_string();
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(section);
        out.push('\n');
        return out;
    };

    let end = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with("## "))
        .map(|i| start + 1 + i)
        .unwrap_or(lines.len());

    let mut out = String::new();
    for line in &lines[..start] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(section);
    out.push('\n');
    if end < lines.len() {
        out.push('\n');
        for line in &lines[end..] {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Split a document into front-matter lines (without delimiters) and
/// the remaining body. A document without front matter yields an empty
/// front and the full text as body.
fn split_front_matter(text: &str) -> (Vec<String>, String) {
    let mut lines = text.lines();
    if lines.next() != Some("---") {
        return (Vec::new(), text.to_string());
    }
    let mut front = Vec::new();
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            let body: String = lines.map(|l| format!("{l}\n")).collect();
            return (front, body);
        }
        front.push(line.to_string());
    }
    // Unterminated front matter: treat everything as body
    (Vec::new(), text.to_string())
}

fn set_command_post_keys(front: &mut Vec<String>, status: &str, built_at: &str) {
    let status_line = format!("  status: {status}");
    let built_line = format!("  built_at: {built_at}");

    let Some(block_start) = front.iter().position(|l| l.trim_end() == "commandPost:") else {
        front.push("commandPost:".to_string());
        front.push(status_line);
        front.push(built_line);
        return;
    };

    // The block runs while lines are indented deeper than the key
    let block_end = front[block_start + 1..]
        .iter()
        .position(|l| !l.starts_with(' ') && !l.is_empty())
        .map(|i| block_start + 1 + i)
        .unwrap_or(front.len());

    let mut status_set = false;
    let mut built_set = false;
    for line in &mut front[block_start + 1..block_end] {
        let key = line.trim_start();
        if key.starts_with("status:") {
            *line = status_line.clone();
            status_set = true;
        } else if key.starts_with("built_at:") {
            *line = built_line.clone();
            built_set = true;
        }
    }
    let mut end = block_end;
    if !status_set {
        front.insert(block_start + 1, status_line);
        end += 1;
    }
    if !built_set {
        front.insert(end, built_line);
    }
}

#[cfg(test)]
#[path = "spec_doc_tests.rs"]
mod tests;
