//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Letterbox.
//
// Letterbox is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Letterbox is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Letterbox. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};
use structopt::StructOpt;

use letterbox::filter::{
    CharsetFilter, CrlfDirection, CrlfFilter, CrlfMode, FilterWriter,
    HeaderStripFilter, ToHtmlFilter, ToHtmlFlags,
};
use letterbox::support::config::CliConfig;
use letterbox::support::session::LocalSession;
use letterbox::support::sysexits::*;
use letterbox::{Error, GetFolderFlags, GetFolderInfoFlags, Store};

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// Log more. May be given up to three times.
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: u8,

    /// A TOML file configuring this tool.
    #[structopt(long, parse(from_os_str), global = true)]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt)]
enum Command {
    /// List the folders in a store.
    ///
    /// The store is named by a URI such as `maildir:///home/me/Mail`.
    List {
        uri: String,
        /// List the whole folder tree instead of only the top level.
        #[structopt(long)]
        recursive: bool,
    },
    /// Append messages to a folder, creating it if needed.
    Append {
        uri: String,
        folder: String,
        /// Files each containing one RFC 822 message.
        #[structopt(parse(from_os_str), required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the UIDs of messages in a folder matching an expression.
    ///
    /// For example, `(match-all (header-contains "subject" "invoice"))`.
    Search {
        uri: String,
        folder: String,
        expr: String,
    },
    /// Remove every message marked deleted from a folder.
    Expunge { uri: String, folder: String },
    /// Transform standard input to standard output.
    ///
    /// Filters run in the order: header stripping, line ending conversion,
    /// charset conversion, HTML conversion.
    Filter(FilterOptions),
}

#[derive(StructOpt)]
struct FilterOptions {
    /// Convert LF line endings to CRLF.
    #[structopt(long, conflicts_with = "crlf-decode")]
    crlf_encode: bool,
    /// Convert CRLF line endings to LF.
    #[structopt(long)]
    crlf_decode: bool,
    /// Also stuff or unstuff leading dots during line ending conversion.
    #[structopt(long)]
    dots: bool,
    /// The charset of the input.
    #[structopt(long, requires = "to-charset")]
    from_charset: Option<String>,
    /// The charset of the output.
    #[structopt(long, requires = "from-charset")]
    to_charset: Option<String>,
    /// Render plain text as HTML.
    #[structopt(long)]
    to_html: bool,
    /// Remove every instance of this header from the input.
    #[structopt(long)]
    strip_header: Option<String>,
}

fn main() {
    let options = Options::from_args();

    let cli_config = match options.config {
        None => CliConfig::default(),
        Some(ref path) => match CliConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading {}: {}", path.display(), e);
                EX_CONFIG.exit()
            }
        },
    };

    init_log(&cli_config, options.verbose);

    if let Err(e) = run(options.cmd) {
        error!("{}", e);
        eprintln!("letterbox: {}", e);
        Sysexit::from(&e).exit()
    }

    EX_OK.exit()
}

fn init_log(config: &CliConfig, verbose: u8) {
    if let Some(ref log_config_file) = config.log_config {
        if let Err(e) = log4rs::init_file(
            log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            eprintln!(
                "Failed to initialise logging from {}: {}",
                log_config_file.display(),
                e
            );
            EX_CONFIG.exit()
        }
        return;
    }

    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}][{t}] {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    match config {
        Ok(config) => {
            // Only fails if a logger is already installed
            let _ = log4rs::init_config(config);
        }
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            EX_SOFTWARE.exit()
        }
    }
}

fn open_store(uri: &str) -> Result<Store, Error> {
    Store::open(uri, Arc::new(LocalSession))
}

fn run(cmd: Command) -> Result<(), Error> {
    match cmd {
        Command::List { uri, recursive } => {
            let store = open_store(&uri)?;
            let mut flags = GetFolderInfoFlags::empty();
            if recursive {
                flags |= GetFolderInfoFlags::RECURSIVE;
            }

            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            for info in store
                .get_folder_info("", flags)?
                .into_iter()
                .flat_map(|i| i.flatten())
            {
                match (info.total, info.unread) {
                    (Some(total), Some(unread)) => writeln!(
                        stdout,
                        "{}\t{}\t{}",
                        info.full_name, total, unread
                    )?,
                    _ => writeln!(stdout, "{}\t-\t-", info.full_name)?,
                }
            }
            Ok(())
        }

        Command::Append { uri, folder, files } => {
            let store = open_store(&uri)?;
            let folder = store.get_folder(&folder, GetFolderFlags::CREATE)?;
            for file in files {
                let data = fs::read(&file)?;
                let uid = folder.append_raw(&data, None)?;
                info!("Appended {} as UID {}", file.display(), uid.0);
            }
            folder.sync(false)
        }

        Command::Search { uri, folder, expr } => {
            let store = open_store(&uri)?;
            let folder = store.get_folder(&folder, GetFolderFlags::empty())?;

            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            for uid in folder.search(&expr)? {
                writeln!(stdout, "{}", uid.0)?;
            }
            Ok(())
        }

        Command::Expunge { uri, folder } => {
            let store = open_store(&uri)?;
            let folder = store.get_folder(&folder, GetFolderFlags::empty())?;
            let expunged = folder.expunge()?;
            info!("Expunged {} message(s)", expunged.len());
            Ok(())
        }

        Command::Filter(options) => filter(options),
    }
}

fn filter(options: FilterOptions) -> Result<(), Error> {
    let stdout = io::stdout();
    let mut writer = FilterWriter::new(stdout.lock());

    if let Some(ref name) = options.strip_header {
        writer.push(Box::new(HeaderStripFilter::new(name)));
    }

    let crlf_mode = if options.dots {
        CrlfMode::CrlfDots
    } else {
        CrlfMode::CrlfOnly
    };
    if options.crlf_encode {
        writer.push(Box::new(CrlfFilter::new(
            CrlfDirection::Encode,
            crlf_mode,
        )));
    } else if options.crlf_decode {
        writer.push(Box::new(CrlfFilter::new(
            CrlfDirection::Decode,
            crlf_mode,
        )));
    }

    if let (Some(from), Some(to)) =
        (&options.from_charset, &options.to_charset)
    {
        writer.push(Box::new(CharsetFilter::new(from, to)?));
    }

    if options.to_html {
        writer.push(Box::new(ToHtmlFilter::new(
            ToHtmlFlags::ESCAPE
                | ToHtmlFlags::CONVERT_NL
                | ToHtmlFlags::CONVERT_URLS
                | ToHtmlFlags::CONVERT_ADDRESSES,
        )));
    }

    let stdin = io::stdin();
    io::copy(&mut stdin.lock(), &mut writer)?;
    writer.finish()?;
    Ok(())
}
