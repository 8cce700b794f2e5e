//! Channel name sanitization: agent and swarm names come from user-supplied
//! task definitions and must be turned into safe socket-filename fragments.

/// Replace runs of non-alphanumeric characters (except `.` and `-`) with a
/// single `-`, strip leading/trailing `-`, lowercase the result.
pub fn sanitize_channel_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_dash = false;
    for ch in raw.chars() {
        if ch.is_alphanumeric() || ch == '.' || ch == '-' {
            out.push(ch.to_ascii_lowercase());
            last_was_dash = ch == '-';
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// `inbox-<sanitized-name>` for a single agent's private channel.
pub fn inbox_channel(name: &str) -> String {
    format!("inbox-{}", sanitize_channel_fragment(name))
}

/// `topic-<sanitized-swarm>` for a swarm-scoped broadcast channel.
pub fn topic_channel(swarm: &str) -> String {
    format!("topic-{}", sanitize_channel_fragment(swarm))
}

pub const GENERAL_CHANNEL: &str = "general";
pub const QUEEN_INBOX_CHANNEL: &str = "inbox-queen";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_of_special_characters() {
        assert_eq!(sanitize_channel_fragment("foo   bar"), "foo-bar");
        assert_eq!(sanitize_channel_fragment("foo!!!bar"), "foo-bar");
    }

    #[test]
    fn strips_leading_and_trailing_dashes() {
        assert_eq!(sanitize_channel_fragment("  foo  "), "foo");
        assert_eq!(sanitize_channel_fragment("--foo--"), "foo");
    }

    #[test]
    fn lowercases() {
        assert_eq!(sanitize_channel_fragment("Agent-One"), "agent-one");
    }

    #[test]
    fn keeps_dots_and_dashes() {
        assert_eq!(sanitize_channel_fragment("v1.2-beta"), "v1.2-beta");
    }

    #[test]
    fn inbox_and_topic_channel_names() {
        assert_eq!(inbox_channel("Agent One"), "inbox-agent-one");
        assert_eq!(topic_channel("Swarm #1"), "topic-swarm-1");
    }
}
