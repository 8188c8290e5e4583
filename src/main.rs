//! Magicstomp Editor - command line front end
//!
//! Lists MIDI ports, dumps and uploads patch banks, renames patches on the
//! device and converts between bank formats.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use magicstomp_editor::config::Config;
use magicstomp_editor::engine::{
    inbound_channel, list_ports, EditorSession, Focus, InboundReceiver, MidiEngine,
    RecordingTransport, SessionEvent, Transport, DEFAULT_INBOUND_BUFFER_SIZE,
};
use magicstomp_editor::patch::{PatchStore, NUM_PATCHES, PATCH_NAME, PATCH_NAME_LENGTH};
use magicstomp_editor::persistence::{
    load_patches, save_patches, save_to_file, BankFormat, PatchBank, PatchRecord,
};
use magicstomp_editor::sysex::HexBytes;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const USAGE: &str = "\
usage: magicstomp-editor [-v] [--config FILE] <command>

commands:
  ports                          list MIDI input and output ports
  dump <patch|all> [--out FILE]  read patches from the device
  upload <FILE> [patch] [--verify] [--dry-run]
                                 write patches from a bank file to the device
  rename <patch> <name>          rename a patch on the device
  convert <IN> <OUT>             convert between .json, .ub9 and .mid banks

patches are numbered 1-99";

#[derive(Debug, PartialEq, Eq)]
enum Target {
    One(usize),
    All,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ports,
    Dump { target: Target, out: Option<PathBuf> },
    Upload { file: PathBuf, patch: Option<usize>, verify: bool, dry_run: bool },
    Rename { patch: usize, name: String },
    Convert { input: PathBuf, output: PathBuf },
}

#[derive(Debug)]
struct Options {
    verbose: bool,
    config: Option<PathBuf>,
    command: Command,
}

/// Parse a 1-based patch number into a slot index.
fn parse_patch(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if (1..=NUM_PATCHES).contains(&n) => Ok(n - 1),
        _ => Err(format!("invalid patch number '{}'", arg)),
    }
}

fn parse_args(args: Vec<String>) -> Result<Options, String> {
    let mut verbose = false;
    let mut config = None;
    let mut out = None;
    let mut verify = false;
    let mut dry_run = false;
    let mut positional = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--verify" => verify = true,
            "--dry-run" => dry_run = true,
            "--config" => {
                config = Some(PathBuf::from(iter.next().ok_or("--config needs a file")?));
            }
            "--out" | "-o" => {
                out = Some(PathBuf::from(iter.next().ok_or("--out needs a file")?));
            }
            "-h" | "--help" => return Err(String::new()),
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("ports") => Command::Ports,
        Some("dump") => {
            let target = match positional.next().as_deref() {
                Some("all") => Target::All,
                Some(n) => Target::One(parse_patch(n)?),
                None => return Err("dump needs a patch number or 'all'".to_string()),
            };
            Command::Dump { target, out }
        }
        Some("upload") => {
            let file = positional.next().ok_or("upload needs a bank file")?;
            let patch = positional.next().map(|n| parse_patch(&n)).transpose()?;
            Command::Upload {
                file: PathBuf::from(file),
                patch,
                verify,
                dry_run,
            }
        }
        Some("rename") => {
            let patch = parse_patch(&positional.next().ok_or("rename needs a patch number")?)?;
            let name = positional.next().ok_or("rename needs a name")?;
            Command::Rename { patch, name }
        }
        Some("convert") => {
            let input = positional.next().ok_or("convert needs an input file")?;
            let output = positional.next().ok_or("convert needs an output file")?;
            Command::Convert {
                input: PathBuf::from(input),
                output: PathBuf::from(output),
            }
        }
        Some(other) => return Err(format!("unknown command '{}'", other)),
        None => return Err(String::new()),
    };

    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument '{}'", extra));
    }

    Ok(Options {
        verbose,
        config,
        command,
    })
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("magicstomp-editor")
        .join("magicstomp-editor.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    match File::create(&log_path) {
        Ok(file) => loggers.push(WriteLogger::new(log_level, simplelog::Config::default(), file)),
        Err(e) => eprintln!("could not create log file {}: {}", log_path.display(), e),
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("logger already initialized");
    }

    log::info!("magicstomp-editor starting (log level: {:?})", log_level);
}

fn connect(config: &Config) -> CliResult<(MidiEngine, InboundReceiver)> {
    let (tx, rx) = inbound_channel(DEFAULT_INBOUND_BUFFER_SIZE);
    let engine = MidiEngine::connect(&config.midi_settings(), tx)?;
    eprintln!(
        "Connected to {} / {}",
        engine.input_port_name(),
        engine.output_port_name()
    );
    Ok((engine, rx))
}

/// Run the session until nothing is queued or outstanding.
///
/// Fails if the device stays silent for `timeout` while a response is
/// expected. Returns the patches whose read-back differed from the upload.
fn drive<T: Transport>(
    session: &mut EditorSession<T>,
    inbound: &mut InboundReceiver,
    timeout: Duration,
) -> CliResult<Vec<usize>> {
    let mut mismatches = Vec::new();
    let mut last_activity = Instant::now();

    loop {
        let now = Instant::now();
        let received = session.process_inbound(inbound, now) > 0;
        let sent = session.tick(now);
        if received || sent {
            last_activity = now;
        }

        for event in session.drain_events() {
            match event {
                SessionEvent::PatchReceived { .. }
                | SessionEvent::PatchVerified { .. }
                | SessionEvent::PatchRenamed { .. }
                | SessionEvent::TransferFinished => log::info!("{}", event),
                SessionEvent::VerifyMismatch { patch } => {
                    eprintln!("warning: {}", event);
                    mismatches.push(patch);
                }
                SessionEvent::SendFailed(err) => return Err(err.into()),
                _ => eprintln!("warning: {}", event),
            }
        }

        if session.is_idle() {
            return Ok(mismatches);
        }
        if session.outbound().is_empty() && now.duration_since(last_activity) > timeout {
            session.cancel();
            return Err(format!(
                "timed out waiting for the device ({:?})",
                session.transfer_state()
            )
            .into());
        }

        let wait = session
            .next_deadline()
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(Duration::from_millis(5))
            .min(Duration::from_millis(5));
        thread::sleep(wait);
    }
}

fn print_rows(store: &PatchStore, only: Option<usize>) {
    for row in store.rows() {
        if only.is_some_and(|i| i + 1 != row.number) {
            continue;
        }
        let effect = row.effect_type.map(|t| t.name()).unwrap_or("?");
        println!("{:02}  {:<12}  {}", row.number, row.name, effect);
    }
}

fn cmd_ports(config: &Config) -> CliResult<()> {
    let ports = list_ports(&config.midi_settings().client_name)?;
    println!("inputs:");
    for name in &ports.inputs {
        println!("  {}", name);
    }
    println!("outputs:");
    for name in &ports.outputs {
        println!("  {}", name);
    }
    Ok(())
}

fn cmd_dump(config: &Config, target: Target, out: Option<PathBuf>) -> CliResult<()> {
    let (engine, mut inbound) = connect(config)?;
    let mut session =
        EditorSession::with_pacing_interval(engine, PatchStore::new(), config.pacing_interval());

    let now = Instant::now();
    let only = match target {
        Target::One(patch) => {
            session.request_patch(patch, now)?;
            Some(patch)
        }
        Target::All => {
            session.request_all(now)?;
            None
        }
    };
    drive(&mut session, &mut inbound, config.response_timeout())?;
    print_rows(session.store(), only);

    if let Some(path) = out {
        save_dump(session.store(), only, &path)?;
        eprintln!("Saved {}", path.display());
    }
    Ok(())
}

/// A single-patch JSON dump keeps only that slot; everything else saves the
/// whole bank.
fn save_dump(store: &PatchStore, only: Option<usize>, path: &Path) -> CliResult<()> {
    match (only, BankFormat::from_path(path)) {
        (Some(index), BankFormat::Json) => {
            let patch = store.patch(index).ok_or("no such patch")?;
            let mut bank = PatchBank::new(format!("Patch {:02}", index + 1));
            bank.patches.push(PatchRecord::new(index + 1, patch));
            save_to_file(&bank, path)?;
        }
        _ => save_patches(store.patches(), path)?,
    }
    Ok(())
}

fn cmd_upload(
    config: &Config,
    file: &Path,
    patch: Option<usize>,
    verify: bool,
    dry_run: bool,
) -> CliResult<()> {
    let patches = load_patches(file)?;
    let len = patches.len().min(NUM_PATCHES);
    if let Some(index) = patch {
        if index >= len {
            return Err(format!("{} has no patch {}", file.display(), index + 1).into());
        }
    }
    let mut store = PatchStore::with_len(len);
    store.import(&patches);

    if dry_run {
        let (_tx, mut inbound) = inbound_channel(1);
        let mut session =
            EditorSession::with_pacing_interval(RecordingTransport::new(), store, config.pacing_interval());
        let now = Instant::now();
        match patch {
            Some(index) => session.send_patch(index, false, now)?,
            None => session.send_all(false, now)?,
        }
        drive(&mut session, &mut inbound, config.response_timeout())?;
        for frame in session.transport_mut().take_frames() {
            println!("{}", HexBytes(&frame));
        }
        return Ok(());
    }

    let (engine, mut inbound) = connect(config)?;
    let mut session = EditorSession::with_pacing_interval(engine, store, config.pacing_interval());
    let now = Instant::now();
    match patch {
        Some(index) => session.send_patch(index, verify, now)?,
        None => session.send_all(verify, now)?,
    }
    let mismatches = drive(&mut session, &mut inbound, config.response_timeout())?;
    if !mismatches.is_empty() {
        return Err(format!("{} patch(es) failed verification", mismatches.len()).into());
    }
    eprintln!("Upload complete");
    Ok(())
}

fn cmd_rename(config: &Config, patch: usize, name: &str) -> CliResult<()> {
    let (engine, mut inbound) = connect(config)?;
    let mut session =
        EditorSession::with_pacing_interval(engine, PatchStore::new(), config.pacing_interval());

    session.request_patch(patch, Instant::now())?;
    drive(&mut session, &mut inbound, config.response_timeout())?;

    let mut renamed = session.store().patch(patch).cloned().ok_or("no such patch")?;
    renamed.set_name(name);
    let bytes = renamed.bytes(PATCH_NAME, PATCH_NAME_LENGTH)?.to_vec();

    let now = Instant::now();
    session.select_patch(patch)?;
    session.edit_parameter(PATCH_NAME, &bytes, Focus::Released, now)?;
    session.send_patch(patch, true, now)?;
    let mismatches = drive(&mut session, &mut inbound, config.response_timeout())?;
    if !mismatches.is_empty() {
        return Err("device did not accept the new name".into());
    }
    print_rows(session.store(), Some(patch));
    Ok(())
}

fn cmd_convert(input: &Path, output: &Path) -> CliResult<()> {
    let patches = load_patches(input)?;
    save_patches(&patches, output)?;
    eprintln!("Wrote {} patches to {}", patches.len().min(NUM_PATCHES), output.display());
    Ok(())
}

fn run(options: Options, config: &Config) -> CliResult<()> {
    match options.command {
        Command::Ports => cmd_ports(config),
        Command::Dump { target, out } => cmd_dump(config, target, out),
        Command::Upload {
            file,
            patch,
            verify,
            dry_run,
        } => cmd_upload(config, &file, patch, verify, dry_run),
        Command::Rename { patch, name } => cmd_rename(config, patch, &name),
        Command::Convert { input, output } => cmd_convert(&input, &output),
    }
}

fn main() -> ExitCode {
    let options = match parse_args(std::env::args().skip(1).collect()) {
        Ok(options) => options,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {}\n", msg);
            }
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    init_logging(options.verbose);

    let config = match &options.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::load(),
    };

    match run(options, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
