use chrono::{DateTime, Utc};

use devlog_core::models::{Comment, Post, Project, Tag};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y").to_string()
}

/// First line of a markdown body, without heading markers
pub fn excerpt(body: &str, max_len: usize) -> String {
    let line = body
        .lines()
        .map(|l| l.trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or("");
    truncate_string(line, max_len)
}

pub fn post_line(post: &Post) -> String {
    format!(
        "{:<24} {:<40} {:<16} {:>4} likes  {}",
        post.id,
        truncate_string(&post.title, 40),
        truncate_string(&post.created_by, 16),
        post.like_count,
        format_date(&post.created_at)
    )
}

pub fn post_detail(post: &Post) -> String {
    let mut out = format!(
        "{}\nby {} on {}\n",
        post.title,
        post.created_by,
        format_date(&post.created_at)
    );
    if !post.tags.is_empty() {
        out.push_str(&post.hashtags());
        out.push('\n');
    }
    let liked = if post.liked_by_me { " (you liked this)" } else { "" };
    out.push_str(&format!(
        "{} likes{}, {} comments\n\n{}",
        post.like_count, liked, post.comment_count, post.body
    ));
    out
}

pub fn comment_line(comment: &Comment) -> String {
    let indent = if comment.is_reply() { "  " } else { "" };
    format!(
        "{}[{}] {} ({}): {}",
        indent,
        comment.id,
        comment.author_name,
        format_date(&comment.created_at),
        excerpt(&comment.body, 80)
    )
}

pub fn tag_line(tag: &Tag) -> String {
    format!("#{:<24} {}", tag.name, tag.post_count)
}

pub fn project_line(project: &Project) -> String {
    let star = if project.featured { "*" } else { " " };
    format!(
        "{} {:<24} {:<32} {} {}",
        star,
        project.slug,
        truncate_string(&project.title, 32),
        project.year,
        truncate_string(&project.tagline, 50)
    )
}

pub fn project_detail(project: &Project) -> String {
    let mut out = format!(
        "{} ({})\n{}\n\n{}\n\nurl: {}\n",
        project.title, project.year, project.tagline, project.description, project.url
    );
    if let Some(ref github) = project.github_url {
        out.push_str(&format!("github: {}\n", github));
    }
    let tech = project.tech_names();
    if !tech.is_empty() {
        out.push_str(&format!("stack: {}\n", tech.join(", ")));
    }
    for stat in &project.stats {
        out.push_str(&format!("{}: {}\n", stat.label, stat.value));
    }
    out
}
