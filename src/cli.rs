use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a single video file
    Dub {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving the session_<id> run directory
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Target language, overrides the configuration
        #[arg(short, long)]
        target_lang: Option<String>,
    },

    /// Dub every video file in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory, one subdirectory per video
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Target language, overrides the configuration
        #[arg(short, long)]
        target_lang: Option<String>,
    },

    /// Transcribe an audio file into session metadata and an SRT transcript
    Transcribe {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Session directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Source language hint
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate an SRT file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: PathBuf,

        /// Target language, overrides the configuration
        #[arg(short, long)]
        target_lang: Option<String>,
    },

    /// Synthesize one audio segment per subtitle cue
    Synthesize {
        /// Translated subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Session metadata with the speaker profiles
        #[arg(short, long)]
        metadata: PathBuf,

        /// Directory for segment_NNNN.wav and segments_info.json
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Combine synthesized segments into one track
    Compose {
        /// segments_info.json written by `synthesize`
        #[arg(short, long)]
        segments: PathBuf,

        /// Track length in seconds
        #[arg(short, long)]
        duration: f64,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check synthesized segments for overlaps and overruns
    Validate {
        /// segments_info.json written by `synthesize`
        #[arg(short, long)]
        segments: PathBuf,

        /// Track length in seconds
        #[arg(short, long)]
        duration: f64,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Output configuration file
        #[arg(short, long, default_value = "dubsync.toml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dub() {
        let args = Args::parse_from(["dubsync", "-v", "dub", "-i", "movie.mp4", "-t", "tr"]);
        assert!(args.verbose);
        match args.command {
            Commands::Dub { input, output_dir, target_lang } => {
                assert_eq!(input, PathBuf::from("movie.mp4"));
                assert_eq!(output_dir, PathBuf::from("output"));
                assert_eq!(target_lang.as_deref(), Some("tr"));
            }
            _ => panic!("expected dub"),
        }
    }

    #[test]
    fn test_parse_compose() {
        let args = Args::parse_from([
            "dubsync", "--config", "my.toml", "compose", "-s", "segments_info.json", "-d", "12.5", "-o", "out.wav",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("my.toml")));
        assert!(matches!(args.command, Commands::Compose { duration, .. } if duration == 12.5));
    }

    #[test]
    fn test_parse_init_config() {
        let args = Args::parse_from(["dubsync", "init-config"]);
        assert!(matches!(args.command, Commands::InitConfig { output } if output == PathBuf::from("dubsync.toml")));
    }
}
