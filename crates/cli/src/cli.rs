//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracksmith_core::{AudioFormat, ConvertOptions, OutputMode, TrackFilter, TARGET_FORMATS};

#[derive(Parser, Debug)]
#[command(
    name = "tracksmith",
    version,
    about = "Search a DJ library catalog and convert its tracks between audio formats"
)]
pub struct Cli {
    /// Configuration file (defaults to tracksmith.toml when present)
    #[arg(long, short = 'c', global = true, env = "TRACKSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog database, overrides catalog.path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert matching tracks and update the catalog
    Convert(ConvertArgs),
    /// List matching tracks
    Search(SearchArgs),
}

impl Command {
    pub fn print_mode(&self) -> PrintMode {
        match self {
            Self::Convert(args) => args.print,
            Self::Search(args) => args.print,
        }
    }
}

/// What goes to standard output.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintMode {
    /// Track tables
    #[default]
    Info,
    /// Space-separated track IDs
    Ids,
    /// Nothing
    Silent,
}

impl From<PrintMode> for OutputMode {
    fn from(mode: PrintMode) -> Self {
        match mode {
            PrintMode::Info => OutputMode::Info,
            PrintMode::Ids => OutputMode::Ids,
            PrintMode::Silent => OutputMode::Silent,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Track IDs to select
    #[arg(value_name = "TRACK_ID")]
    pub ids: Vec<String>,

    /// Track ID (repeatable)
    #[arg(long = "track-id", value_name = "ID")]
    pub track_ids: Vec<String>,

    /// Title contains (repeatable)
    #[arg(long)]
    pub title: Vec<String>,

    /// Title equals (repeatable)
    #[arg(long)]
    pub exact_title: Vec<String>,

    /// Artist contains (repeatable)
    #[arg(long)]
    pub artist: Vec<String>,

    /// Artist equals (repeatable)
    #[arg(long)]
    pub exact_artist: Vec<String>,

    /// Album contains (repeatable, empty matches tracks without album)
    #[arg(long)]
    pub album: Vec<String>,

    /// Album equals (repeatable)
    #[arg(long)]
    pub exact_album: Vec<String>,

    /// Playlist name contains (repeatable)
    #[arg(long)]
    pub playlist: Vec<String>,

    /// Playlist name equals (repeatable)
    #[arg(long)]
    pub exact_playlist: Vec<String>,

    /// Current file format (repeatable)
    #[arg(long, value_parser = parse_format)]
    pub format: Vec<AudioFormat>,

    /// Require every criterion instead of any
    #[arg(long)]
    pub match_all: bool,
}

impl FilterArgs {
    pub fn to_filter(&self) -> TrackFilter {
        TrackFilter {
            track_ids: self.ids.iter().chain(&self.track_ids).cloned().collect(),
            titles: self.title.clone(),
            exact_titles: self.exact_title.clone(),
            artists: self.artist.clone(),
            exact_artists: self.exact_artist.clone(),
            albums: self.album.clone(),
            exact_albums: self.exact_album.clone(),
            playlists: self.playlist.clone(),
            exact_playlists: self.exact_playlist.clone(),
            formats: self.format.clone(),
            match_all: self.match_all,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Target format
    #[arg(long, default_value = "aiff", value_parser = parse_target)]
    pub format_out: AudioFormat,

    /// List what would be converted and stop
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y', conflicts_with = "interactive")]
    pub yes: bool,

    /// Confirm each track
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Delete source files after converting
    #[arg(long, conflicts_with = "keep")]
    pub delete: bool,

    /// Keep source files after converting
    #[arg(long)]
    pub keep: bool,

    /// Output mode
    #[arg(long, value_enum, default_value_t = PrintMode::Info)]
    pub print: PrintMode,
}

/// Usage error for machine output without a way to skip prompts.
pub const PRINT_REQUIRES_UNATTENDED: &str =
    "--print=ids or --print=silent requires --dry-run or --yes";

impl ConvertArgs {
    /// Checks combinations clap cannot express.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.print != PrintMode::Info && !(self.dry_run || self.yes) {
            return Err(PRINT_REQUIRES_UNATTENDED);
        }
        Ok(())
    }

    pub fn to_options(&self) -> ConvertOptions {
        let delete_sources = match (self.delete, self.keep) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        ConvertOptions::new(self.format_out)
            .with_dry_run(self.dry_run)
            .with_auto_confirm(self.yes)
            .with_interactive(self.interactive)
            .with_overwrite(self.overwrite)
            .with_delete_sources(delete_sources)
            .with_output(self.print.into())
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output mode
    #[arg(long, value_enum, default_value_t = PrintMode::Info)]
    pub print: PrintMode,
}

fn parse_format(value: &str) -> Result<AudioFormat, String> {
    AudioFormat::from_name(value).map_err(|e| e.to_string())
}

fn parse_target(value: &str) -> Result<AudioFormat, String> {
    let format = parse_format(value)?;
    if !format.is_target() {
        let choices: Vec<&str> = TARGET_FORMATS.iter().map(|f| f.name()).collect();
        return Err(format!(
            "{} is not a conversion target (choose from {})",
            format,
            choices.join(", ")
        ));
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("tracksmith").chain(args.iter().copied()))
    }

    fn convert_args(args: &[&str]) -> ConvertArgs {
        match parse(args).unwrap().command {
            Command::Convert(args) => args,
            other => panic!("expected convert, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_defaults() {
        let args = convert_args(&["convert", "--artist", "Burial"]);
        assert_eq!(args.format_out, AudioFormat::Aiff);
        let options = args.to_options();
        assert_eq!(options.delete_sources, None);
        assert!(!options.auto_confirm);
        assert_eq!(args.filter.to_filter().artists, vec!["Burial".to_string()]);
    }

    #[test]
    fn test_positional_ids_join_track_ids() {
        let args = convert_args(&["convert", "12", "13", "--track-id", "14"]);
        assert_eq!(args.filter.to_filter().track_ids, vec!["12", "13", "14"]);
    }

    #[test]
    fn test_print_ids_requires_unattended() {
        let args = convert_args(&["convert", "--print", "ids"]);
        assert_eq!(args.validate(), Err(PRINT_REQUIRES_UNATTENDED));

        let args = convert_args(&["convert", "--print", "ids", "--yes"]);
        assert!(args.validate().is_ok());
        assert!(args.to_options().is_unattended());

        let args = convert_args(&["convert", "--print", "silent", "--dry-run"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(parse(&["convert", "--yes", "--interactive"]).is_err());
        assert!(parse(&["convert", "--delete", "--keep"]).is_err());
    }

    #[test]
    fn test_delete_and_keep() {
        assert_eq!(convert_args(&["convert", "--delete"]).to_options().delete_sources, Some(true));
        assert_eq!(convert_args(&["convert", "--keep"]).to_options().delete_sources, Some(false));
    }

    #[test]
    fn test_rejects_non_target_format() {
        assert!(parse(&["convert", "--format-out", "m4a"]).is_err());
        assert!(parse(&["convert", "--format-out", "ogg"]).is_err());
        let args = convert_args(&["convert", "--format-out", "MP3"]);
        assert_eq!(args.format_out, AudioFormat::Mp3);
    }

    #[test]
    fn test_search_filters() {
        let cli = parse(&["search", "--format", "flac", "--format", "wav", "--match-all"]).unwrap();
        match cli.command {
            Command::Search(args) => {
                let filter = args.filter.to_filter();
                assert_eq!(filter.formats, vec![AudioFormat::Flac, AudioFormat::Wav]);
                assert!(filter.match_all);
            }
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = parse(&["search", "--db", "/tmp/master.db", "-vv"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/master.db")));
        assert_eq!(cli.verbose, 2);
    }
}
