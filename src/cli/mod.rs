mod commands;
mod handlers;

pub use commands::{Cli, Commands, PageAction, PageCommand};
pub use handlers::{
    handle_delete, handle_init, handle_list, handle_page, handle_settings, handle_stats,
    handle_visit,
};
