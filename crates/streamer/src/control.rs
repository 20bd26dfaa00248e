//! Interactive playback commands read from stdin.

use std::io::BufRead;

use crossbeam_channel::Sender;

/// Volume change per `+`/`-` key, in percentage points.
pub const VOLUME_STEP: i16 = 10;

/// Commands accepted by the driver loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    TogglePause,
    VolumeUp,
    VolumeDown,
    Status,
    Quit,
}

/// Map one input line to a command. Blank lines and unknown keys map to `None`.
pub fn parse_command(line: &str) -> Option<PlayerCommand> {
    match line.trim() {
        "p" | "P" => Some(PlayerCommand::TogglePause),
        "+" | "=" => Some(PlayerCommand::VolumeUp),
        "-" | "_" => Some(PlayerCommand::VolumeDown),
        "s" | "S" => Some(PlayerCommand::Status),
        "q" | "Q" | "quit" | "exit" => Some(PlayerCommand::Quit),
        _ => None,
    }
}

/// Forward commands from `reader` until it ends or the receiver goes away.
pub fn read_commands<R: BufRead>(reader: R, tx: &Sender<PlayerCommand>) {
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(cmd) => {
                if tx.send(cmd).is_err() {
                    break;
                }
            }
            None => tracing::warn!(input = %line.trim(), "unknown key (p, +, -, s, q)"),
        }
    }
}

/// Read commands from stdin on a background thread.
pub fn spawn_stdin_reader(tx: Sender<PlayerCommand>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        read_commands(stdin.lock(), &tx);
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(parse_command("p"), Some(PlayerCommand::TogglePause));
        assert_eq!(parse_command(" + "), Some(PlayerCommand::VolumeUp));
        assert_eq!(parse_command("-"), Some(PlayerCommand::VolumeDown));
        assert_eq!(parse_command("s"), Some(PlayerCommand::Status));
        assert_eq!(parse_command("q"), Some(PlayerCommand::Quit));
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn read_commands_skips_noise_and_stops_at_eof() {
        let (tx, rx) = crossbeam_channel::unbounded();
        read_commands(Cursor::new("p\n\nbogus\n+\nq\n"), &tx);
        drop(tx);
        let got: Vec<_> = rx.iter().collect();
        assert_eq!(
            got,
            vec![
                PlayerCommand::TogglePause,
                PlayerCommand::VolumeUp,
                PlayerCommand::Quit
            ]
        );
    }
}
