use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pioneerlink_device::{COMMANDS_FILE, REPLIES_FILE, TELEMETRY_FILE};
use pioneerlink_frame::{Command, MessageRegistry, RecordReader, Reply, Telemetry};
use serde::Serialize;
use tracing::debug;

use crate::cmd::{DecodeArgs, LogChannel};
use crate::exit::{io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_items, ItemRow, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let channel = match args.channel {
        Some(channel) => channel,
        None => infer_channel(&args.file).ok_or_else(|| {
            CliError::new(
                USAGE,
                format!(
                    "cannot tell the stream of {}; pass --channel",
                    args.file.display()
                ),
            )
        })?,
    };

    let file = File::open(&args.file)
        .map_err(|err| io_error(&format!("failed to open {}", args.file.display()), err))?;
    let reader = BufReader::new(file);

    let rows = match channel {
        LogChannel::Telemetry => {
            decode_all(RecordReader::new(reader, MessageRegistry::telemetry()), Telemetry::name)?
        }
        LogChannel::Replies => {
            decode_all(RecordReader::new(reader, MessageRegistry::replies()), Reply::name)?
        }
        LogChannel::Commands => {
            decode_all(RecordReader::new(reader, MessageRegistry::commands()), Command::name)?
        }
    };

    debug!(items = rows.len(), channel = ?channel, "decoded raw log");
    print_items(&rows, format);
    Ok(SUCCESS)
}

fn decode_all<R: Read, M: Serialize>(
    mut reader: RecordReader<R, M>,
    name: fn(&M) -> &'static str,
) -> CliResult<Vec<ItemRow>> {
    let channel = reader.registry().channel();
    let mut rows = Vec::new();
    while let Some(item) = reader
        .next_item()
        .map_err(|err| io_error("decode failed", err))?
    {
        rows.push(ItemRow::from_item(channel, &item, name));
    }
    Ok(rows)
}

/// Map the raw logger's file names back to their stream.
pub fn infer_channel(path: &Path) -> Option<LogChannel> {
    match path.file_name()?.to_str()? {
        TELEMETRY_FILE => Some(LogChannel::Telemetry),
        REPLIES_FILE => Some(LogChannel::Replies),
        COMMANDS_FILE => Some(LogChannel::Commands),
        _ => None,
    }
}
