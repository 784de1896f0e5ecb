use crate::model::timeframe::Timeframe;

/// Operator commands read from stdin, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    SwitchTimeframe(Timeframe),
    Connect,
    Disconnect,
    Reconnect,
    Snapshot,
    Quit,
}

/// `tf <timeframe>` or a bare timeframe (`5m`, `1hour`) switches; single
/// letters `c d r s q` map to the remaining commands.
pub fn parse_command(line: &str) -> Option<UiCommand> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let arg = words.next();
    if words.next().is_some() {
        return None;
    }
    match (head.as_str(), arg) {
        ("tf" | "timeframe", Some(tf)) => tf.parse().ok().map(UiCommand::SwitchTimeframe),
        ("c" | "connect", None) => Some(UiCommand::Connect),
        ("d" | "disconnect", None) => Some(UiCommand::Disconnect),
        ("r" | "reconnect", None) => Some(UiCommand::Reconnect),
        ("s" | "snapshot", None) => Some(UiCommand::Snapshot),
        ("q" | "quit" | "exit", None) => Some(UiCommand::Quit),
        (other, None) => other.parse().ok().map(UiCommand::SwitchTimeframe),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("q"), Some(UiCommand::Quit));
        assert_eq!(parse_command("  Reconnect "), Some(UiCommand::Reconnect));
        assert_eq!(
            parse_command("tf 15m"),
            Some(UiCommand::SwitchTimeframe(Timeframe::Min15))
        );
        assert_eq!(
            parse_command("1MONTH"),
            Some(UiCommand::SwitchTimeframe(Timeframe::Month1))
        );
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("tf"), None);
        assert_eq!(parse_command("tf 7m"), None);
        assert_eq!(parse_command("q now"), None);
    }
}
