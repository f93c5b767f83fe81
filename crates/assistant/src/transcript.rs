use chrono::DateTime;
use slack_gateway::{SlackMessage, UserDirectory};

/// Renders a thread as `name: text` lines, ids swapped for names.
pub fn render_thread(messages: &[SlackMessage], users: &UserDirectory) -> String {
    messages
        .iter()
        .map(|message| render_line(message, users, false))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Same as [`render_thread`] with a date prefix on every line, used for
/// indexed transcripts where the conversation's age matters.
pub fn render_thread_dated(messages: &[SlackMessage], users: &UserDirectory) -> String {
    messages
        .iter()
        .map(|message| render_line(message, users, true))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_line(message: &SlackMessage, users: &UserDirectory, dated: bool) -> String {
    let author = message
        .user
        .as_deref()
        .map(|id| users.display_name(id).to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let text = users.substitute(&message.text);

    if dated {
        format!("{} {}: {}", format_ts(&message.ts), author, text)
    } else {
        format!("{author}: {text}")
    }
}

/// Slack timestamps are `seconds.microseconds` strings.
pub fn format_ts(ts: &str) -> String {
    let Ok(epoch) = ts.parse::<f64>() else {
        return ts.to_string();
    };
    let secs = epoch.trunc() as i64;
    match DateTime::from_timestamp(secs, 0) {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn users() -> UserDirectory {
        let mut names = HashMap::new();
        names.insert("U111".to_string(), "Alice".to_string());
        names.insert("U222".to_string(), "Bob".to_string());
        UserDirectory::new(names)
    }

    fn message(user: &str, text: &str, ts: &str) -> SlackMessage {
        serde_json::from_str(&format!(
            r#"{{"user": "{user}", "text": "{text}", "ts": "{ts}"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn renders_names_and_substitutes_mentions() {
        let thread = vec![
            message("U111", "hey <@U222>", "1700000000.000100"),
            message("U222", "what's up", "1700000100.000200"),
        ];

        let rendered = render_thread(&thread, &users());
        assert_eq!(rendered, "Alice: hey <@Bob>\nBob: what's up");
    }

    #[test]
    fn dated_rendering_prefixes_each_line() {
        let thread = vec![message("U111", "hi", "1700000000.000100")];
        let rendered = render_thread_dated(&thread, &users());
        assert!(rendered.starts_with("2023-11-14 "));
        assert!(rendered.ends_with("Alice: hi"));
    }

    #[test]
    fn unparseable_timestamps_render_verbatim() {
        assert_eq!(format_ts("not-a-ts"), "not-a-ts");
    }
}
