//! Parsing of the two-host dialogue script the combiner prompt produces.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// The two podcast hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    HostA,
    HostB,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::HostA => write!(f, "Host A"),
            Speaker::HostB => write!(f, "Host B"),
        }
    }
}

/// One spoken line of the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub speaker: Speaker,
    pub text: String,
}

impl ScriptLine {
    /// Serialize back to the `[Host X]: line` wire form.
    pub fn to_tagged(&self) -> String {
        format!("[{}]: {}", self.speaker, self.text)
    }
}

fn line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(Host\s[AB])\]:\s*(.*)$").expect("script line regex is valid"))
}

/// Parse a script into `(speaker, line)` pairs. Lines without the host tag
/// are dropped; LLM output tends to sprinkle in stage directions and blank
/// lines.
pub fn parse_script(script: &str) -> Vec<ScriptLine> {
    let re = line_pattern();

    script
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim_end())?;

            let speaker = match &caps[1] {
                "Host A" => Speaker::HostA,
                _ => Speaker::HostB,
            };

            let text = caps[2].trim().to_string();

            if text.is_empty() {
                return None;
            }

            Some(ScriptLine { speaker, text })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alternating_hosts() {
        let script = indoc::indoc! {"
            [Host A]: Welcome to the show.
            [Host B]: Glad to be here!
            [Host A]: Let's dig in.
            [Host B]: Absolutely.
        "};

        let lines = parse_script(script);

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].speaker, Speaker::HostA);
        assert_eq!(lines[1].speaker, Speaker::HostB);
        assert_eq!(lines[3].text, "Absolutely.");
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let script = indoc::indoc! {"
            # Podcast script

            [Host A]: Real line.
            (both laugh)
            [Host C]: Not a valid host.
            [Host B]:
            [Host B]: Another real line.
        "};

        let lines = parse_script(script);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Real line.");
        assert_eq!(lines[1].speaker, Speaker::HostB);
    }

    #[test]
    fn round_trips_through_the_tagged_form() {
        let script = "[Host A]: One.\n[Host B]: Two.\n[Host A]: Three.";
        let lines = parse_script(script);

        let serialized: Vec<String> = lines.iter().map(ScriptLine::to_tagged).collect();

        assert_eq!(serialized.join("\n"), script);
    }
}
