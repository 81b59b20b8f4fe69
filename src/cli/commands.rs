use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::aggregate::{AgeFilter, SortOrder};

#[derive(Parser, Debug)]
#[command(name = "postit")]
#[command(version, about = "Sticky notes pinned to web pages, stored per URL")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding (or above) the .postit/ store
    #[arg(long, global = true, env = "POSTIT_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new note store in the current directory
    Init,

    /// Work with the notes of a single page
    Page(PageCommand),

    /// List notes from every page, grouped by website
    List {
        /// Case-insensitive search over title, content and URL
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Sort order (title, url, date)
        #[arg(long, default_value = "date")]
        sort: SortOrder,

        /// Age filter (recent, older, all)
        #[arg(long, default_value = "all")]
        filter: AgeFilter,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show note and website counts
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the URL of the page a note belongs to
    Visit {
        /// Note ID as shown by `list`
        id: String,
    },

    /// Delete a note from any page
    Delete {
        /// Note ID as shown by `list`
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Show or change display settings
    Settings {
        /// Note font size in pixels (8-32)
        #[arg(long)]
        font_size: Option<u32>,

        /// Use the first line of a note as its title
        #[arg(long)]
        show_first_line_as_title: Option<bool>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct PageCommand {
    /// Page URL; query string and fragment are ignored
    pub url: String,

    #[command(subcommand)]
    pub action: PageAction,
}

#[derive(Subcommand, Debug)]
pub enum PageAction {
    /// Create a note on the page
    Add {
        /// Horizontal position in page pixels
        #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
        x: f64,

        /// Vertical position in page pixels
        #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
        y: f64,

        /// Initial text
        #[arg(long, short = 't')]
        text: Option<String>,

        /// Selector path of the element the note was created over,
        /// e.g. "body > div#main > p.intro"
        #[arg(long)]
        element: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the notes on the page
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the text of a note
    Edit {
        /// Note ID
        id: String,

        /// New text
        #[arg(required_unless_present = "stdin")]
        text: Option<String>,

        /// Read text from stdin
        #[arg(long, conflicts_with = "text")]
        stdin: bool,
    },

    /// Move a note
    Move {
        /// Note ID
        id: String,

        #[arg(allow_negative_numbers = true)]
        x: f64,

        #[arg(allow_negative_numbers = true)]
        y: f64,
    },

    /// Resize a note; bare numbers are taken as pixels
    Resize {
        /// Note ID
        id: String,

        width: String,

        height: String,
    },

    /// Toggle a note between collapsed and expanded
    Collapse {
        /// Note ID
        id: String,
    },

    /// Close (delete) a note
    Close {
        /// Note ID
        id: String,
    },
}
