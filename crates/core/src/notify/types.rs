use serde::Serialize;

const PREVIEW_CHARS: usize = 10_000;
const ERROR_CHARS: usize = 200;

/// Lifecycle events pushed to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    ServiceStarted {
        version: String,
    },
    TaskCreated {
        task_id: String,
        text: String,
        attachment_count: usize,
    },
    TaskRejected {
        task_id: String,
        reason: String,
    },
    TaskCompleted {
        task_id: String,
        text: String,
        image_urls: Vec<String>,
        total_secs: f64,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
}

/// First `max` characters of `text`, with an ellipsis if anything was cut.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn short_id(task_id: &str) -> &str {
    match task_id.char_indices().nth(8) {
        Some((cut, _)) => &task_id[..cut],
        None => task_id,
    }
}

impl Notification {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Notification::ServiceStarted { .. } => None,
            Notification::TaskCreated { task_id, .. }
            | Notification::TaskRejected { task_id, .. }
            | Notification::TaskCompleted { task_id, .. }
            | Notification::TaskFailed { task_id, .. } => Some(task_id),
        }
    }

    /// Plain-text rendering for chat transports.
    pub fn render(&self) -> String {
        match self {
            Notification::ServiceStarted { version } => {
                format!("🚀 toonmill {} started", version)
            }
            Notification::TaskCreated {
                task_id,
                text,
                attachment_count,
            } => {
                let attachments = match attachment_count {
                    0 => String::new(),
                    n => format!(" (+{} images)", n),
                };
                format!(
                    "🆕 New request [{}]{}\n📝 {}",
                    short_id(task_id),
                    attachments,
                    truncate(text, PREVIEW_CHARS)
                )
            }
            Notification::TaskRejected { task_id, reason } => {
                format!("🚫 Rejected [{}]\n{}", short_id(task_id), reason)
            }
            Notification::TaskCompleted {
                task_id,
                text,
                image_urls,
                total_secs,
            } => {
                let urls = if image_urls.is_empty() {
                    "(none)".to_string()
                } else {
                    image_urls.join("\n")
                };
                format!(
                    "✅ Completed [{}] ({:.1}s)\n📝 {}\n🖼 Images:\n{}",
                    short_id(task_id),
                    total_secs,
                    truncate(text, PREVIEW_CHARS),
                    urls
                )
            }
            Notification::TaskFailed { task_id, error } => {
                format!(
                    "❌ Failed [{}]\n{}",
                    short_id(task_id),
                    truncate(error, ERROR_CHARS)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("ééé", 2), "éé...");
    }

    #[test]
    fn test_completed_render() {
        let rendered = Notification::TaskCompleted {
            task_id: "0123456789abcdef".to_string(),
            text: "standup notes".to_string(),
            image_urls: vec!["http://a/1.png".to_string(), "http://a/2.png".to_string()],
            total_secs: 12.34,
        }
        .render();

        assert!(rendered.contains("[01234567]"));
        assert!(rendered.contains("(12.3s)"));
        assert!(rendered.contains("http://a/1.png\nhttp://a/2.png"));
    }

    #[test]
    fn test_failed_render_truncates_error() {
        let rendered = Notification::TaskFailed {
            task_id: "t".to_string(),
            error: "x".repeat(500),
        }
        .render();
        assert!(rendered.ends_with(&format!("{}...", "x".repeat(200))));
    }
}
