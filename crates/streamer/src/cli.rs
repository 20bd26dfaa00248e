use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "streamer", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Play into a simulated device clocked in real time instead of the sound card
    #[arg(long)]
    pub null_output: bool,

    /// Number of device buffers cycled during playback (2..=8)
    #[arg(long, default_value_t = 4)]
    pub buffers: usize,

    /// Audio held in flight across all buffers, in seconds
    #[arg(long, default_value_t = 1.0)]
    pub buffer_seconds: f32,

    /// Driver tick in milliseconds; derived from the chunk duration when unset
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Resampler input chunk size in frames, used when the device rate differs
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Print status and info as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a WAV or MP3 file. Keys on stdin: p pause, +/- volume, s status, q quit
    Play {
        /// Path to audio file
        path: PathBuf,
    },

    /// Print stream format, duration and header fields
    Info {
        /// Path to audio file
        path: PathBuf,
    },

    /// Decode a file to 16-bit PCM WAV
    Decode {
        /// Path to audio file
        input: PathBuf,
        /// WAV file to write
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_with_flags_parses() {
        let args = Args::try_parse_from([
            "streamer",
            "--buffers",
            "3",
            "--tick-ms",
            "50",
            "--null-output",
            "play",
            "song.mp3",
        ])
        .unwrap();
        assert_eq!(args.buffers, 3);
        assert_eq!(args.tick_ms, Some(50));
        assert!(args.null_output);
        assert!(matches!(args.cmd, Some(Command::Play { ref path }) if path.ends_with("song.mp3")));
    }

    #[test]
    fn list_devices_needs_no_subcommand() {
        let args = Args::try_parse_from(["streamer", "--list-devices"]).unwrap();
        assert!(args.list_devices);
        assert!(args.cmd.is_none());
        assert_eq!(args.buffers, 4);
        assert_eq!(args.buffer_seconds, 1.0);
    }

    #[test]
    fn decode_takes_two_paths() {
        let args = Args::try_parse_from(["streamer", "decode", "in.mp3", "out.wav"]).unwrap();
        match args.cmd {
            Some(Command::Decode { input, output }) => {
                assert_eq!(input, PathBuf::from("in.mp3"));
                assert_eq!(output, PathBuf::from("out.wav"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
