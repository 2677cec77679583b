// SPDX-License-Identifier: Apache-2.0

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub(crate) enum CollectionCommand {
    /// Print every record in sort order.
    List {
        /// Field to sort by; defaults to the collection's own order.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value_t = false)]
        desc: bool,
        /// Keep records whose searchable fields contain this text, ignoring case.
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a record. Fields are given as `--set name=value`.
    Add {
        #[arg(long = "set", value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
        /// Image to upload and attach.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    Remove {
        id: String,
    },
    /// Change fields of an existing record.
    Update {
        id: String,
        #[arg(long = "set", value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ReservationCommand {
    #[command(flatten)]
    Records(CollectionCommand),
    /// Confirm a pending booking.
    Approve { id: String },
    /// Cancel a pending booking.
    Reject { id: String },
}

#[derive(Subcommand)]
pub(crate) enum DetailsCommand {
    Show,
    /// Replace the contact details with the JSON object in `path`.
    Import {
        path: PathBuf,
    },
}

pub(crate) fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty field name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}
