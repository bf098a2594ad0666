use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{Event, KeyCode, KeyEvent, poll, read};
use pagecapture::constants::{defaults, timing};
use pagecapture::progress::{self, CaptureProgress, CaptureStatus, ProgressReceiver};
use pagecapture::{
    AdvanceKey, CaptureRegion, CaptureSettings, DisplayGrabber, InjectorKind, Point, RunOptions,
    RunSession, ScreenshotsGrabber, StopSignal, presets, select_injector,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagecapture")]
#[command(about = "Capture a paginated document on screen into a PDF", long_about = None)]
struct Args {
    #[arg(short = 'n', long, help = "Number of pages to capture")]
    pages: Option<u32>,

    #[arg(short, long, help = "Output PDF base name (without .pdf)")]
    output: Option<String>,

    #[arg(
        short,
        long,
        help = "Milliseconds to wait before each capture (clamped to 500-5000)"
    )]
    speed: Option<u64>,

    #[arg(long, help = "Directory for the PDF (defaults to Downloads)")]
    save_path: Option<PathBuf>,

    #[arg(long, help = "Load capture settings from a JSON file")]
    settings: Option<PathBuf>,

    #[arg(
        long,
        help = "Capture region as 'x,y,width,height' (e.g., '100,50,1920,1080')"
    )]
    crop: Option<String>,

    #[arg(
        long,
        help = "Use a region preset (e.g., '1080p' or a custom preset name)"
    )]
    crop_preset: Option<String>,

    #[arg(long, help = "Interactive mode: pick the region corners with the mouse")]
    select_region: bool,

    #[arg(long, help = "List available region presets")]
    list_presets: bool,

    #[arg(long, help = "Save a region preset: 'name:x,y,width,height'")]
    save_preset: Option<String>,

    #[arg(
        short = 'k',
        long,
        default_value = defaults::ADVANCE_KEY,
        help = "Key that turns the page: right, pagedown, space, down"
    )]
    key: String,

    #[arg(
        long,
        default_value = "enigo",
        help = "Key press backend: enigo, shell"
    )]
    injector: String,

    #[arg(
        short,
        long,
        default_value_t = defaults::START_DELAY_SECS,
        help = "Seconds to focus the target window before the first capture"
    )]
    delay: u64,

    #[arg(long, help = "Directory for staged page images")]
    staging_dir: Option<PathBuf>,

    #[arg(long, help = "Ring the terminal bell on each capture")]
    shutter: bool,

    #[arg(long, help = "Only report whether screen capture is permitted")]
    check_permissions: bool,

    #[arg(long, default_value = defaults::LOG_LEVEL, help = "Log level when RUST_LOG is unset")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let fallback = format!("pagecapture={}", log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&fallback)),
        )
        .with_writer(io::stderr)
        .init();
}

fn list_presets() -> Result<()> {
    println!("\nAVAILABLE REGION PRESETS");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let builtin = presets::get_builtin_presets();
    let custom = presets::load_presets()?;

    println!("\nBuilt-in presets:");
    for (name, value) in builtin.iter() {
        if !custom.contains_key(name) {
            println!("  {} = {}", name, value);
        }
    }

    let preset_file = presets::get_preset_file_path()?;
    if !custom.is_empty() {
        println!("\nCustom presets:");
        for (name, value) in custom.iter() {
            println!("  {} = {}", name, value);
        }
        println!("\nCustom presets file: {}", preset_file.display());
    } else {
        println!("\nCustom presets: (none)");
        println!("   Save presets with: --save-preset name:x,y,w,h");
        println!("   File will be created at: {}", preset_file.display());
    }

    println!("\nUsage:");
    println!("   --crop-preset <name>");
    println!();

    Ok(())
}

fn save_preset_from_string(definition: &str) -> Result<()> {
    let (name, region) = presets::parse_preset_definition(definition)?;

    let mut preset_map = presets::load_presets()?;
    preset_map.insert(name.clone(), region.to_string());
    presets::save_presets(&preset_map)?;

    println!("Preset '{}' saved: {}", name, region);
    println!("\nUse with: --crop-preset {}", name);

    Ok(())
}

fn show_live_coordinates() -> Result<Point> {
    println!("   Live coordinates (move mouse, press ENTER to select):");
    println!("   ┌─────────────────────────────────────────┐");

    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let mut input = String::new();
        let _ = io::stdin().read_line(&mut input);
        let _ = tx.send(());
    });

    loop {
        if let Ok(point) = pagecapture::input::cursor_position() {
            print!("\r   │ Current position: ({:4}, {:4})          │", point.x, point.y);
            io::stdout().flush()?;
        }

        if rx.try_recv().is_ok() {
            let point = pagecapture::input::cursor_position()?;
            println!("\r   └─────────────────────────────────────────┘");
            return Ok(point);
        }

        thread::sleep(Duration::from_millis(timing::MOUSE_POSITION_POLL_MS));
    }
}

fn select_region_interactive() -> Result<(Point, Point)> {
    println!("\nINTERACTIVE REGION SELECTION");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Step 1/2: Position mouse at TOP-LEFT corner of the page");
    let top_left = show_live_coordinates()?;
    println!("Top-left corner: ({}, {})", top_left.x, top_left.y);
    println!();

    println!("Step 2/2: Position mouse at BOTTOM-RIGHT corner of the page");
    let bottom_right = show_live_coordinates()?;
    println!("Bottom-right corner: ({}, {})", bottom_right.x, bottom_right.y);
    println!();

    let region = CaptureRegion::from_corners(top_left, bottom_right)?;
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Region selected: {}x{} at ({}, {})",
        region.width, region.height, region.x, region.y
    );
    println!("Reuse it with: --crop \"{}\"", region);
    println!();

    Ok((top_left, bottom_right))
}

fn resolve_corners(args: &Args) -> Result<Option<(Point, Point)>> {
    if let Some(preset_name) = &args.crop_preset {
        let all_presets = presets::get_all_presets()?;
        let region = presets::resolve(&all_presets, preset_name)?;
        println!("Using preset '{}': {}", preset_name, region);
        return Ok(Some((region.top_left(), region.bottom_right())));
    }

    if let Some(crop) = &args.crop {
        let region = CaptureRegion::parse(crop).with_context(|| {
            format!("invalid crop format '{}'; use 'x,y,width,height'", crop)
        })?;
        return Ok(Some((region.top_left(), region.bottom_right())));
    }

    if args.select_region {
        return select_region_interactive().map(Some);
    }

    Ok(None)
}

fn build_settings(args: &Args) -> Result<CaptureSettings> {
    let corners = resolve_corners(args)?;

    let mut settings = match &args.settings {
        Some(path) => CaptureSettings::from_json_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => {
            let (top_left, bottom_right) = corners.context(
                "no capture region; use --crop, --crop-preset, --select-region or --settings",
            )?;
            let region = CaptureRegion::from_corners(top_left, bottom_right)?;
            let pages = args.pages.context("--pages is required")?;
            CaptureSettings::new(region, pages, defaults::FILE_NAME)
        }
    };

    if let Some((top_left, bottom_right)) = corners {
        settings.top_left = top_left;
        settings.bottom_right = bottom_right;
    }
    if let Some(pages) = args.pages {
        settings.total_pages = pages;
    }
    if let Some(name) = &args.output {
        settings.file_name = name.clone();
    }
    if let Some(speed) = args.speed {
        settings.capture_speed = speed;
    }
    if let Some(dir) = &args.save_path {
        settings.save_path = Some(dir.clone());
    }

    settings.validate()?;
    Ok(settings)
}

fn build_options(args: &Args) -> Result<RunOptions> {
    let fallback = RunOptions::default();
    Ok(RunOptions {
        start_delay: Duration::from_secs(args.delay),
        staging_dir: args.staging_dir.clone().unwrap_or(fallback.staging_dir),
        advance_key: AdvanceKey::parse(&args.key).with_context(|| {
            format!("unknown key '{}'; use right, pagedown, space or down", args.key)
        })?,
        injector: InjectorKind::parse(&args.injector)
            .with_context(|| format!("unknown injector '{}'; use enigo or shell", args.injector))?,
        shutter_sound: args.shutter,
    })
}

fn render(event: &CaptureProgress) {
    let message = event.message.as_deref().unwrap_or("");
    match event.status {
        CaptureStatus::Error => {
            println!("\nError: {}", message);
            if let Some(commands) = &event.commands {
                println!("Open the privacy settings with:");
                println!("   {}", commands.screen_recording);
                println!("   {}", commands.accessibility);
            }
        }
        CaptureStatus::Completed => println!("\n{}", message),
        _ if event.current > 0 => println!("[{}/{}] {}", event.current, event.total, message),
        _ => println!("{}", message),
    }
}

async fn print_progress(mut rx: ProgressReceiver) {
    while let Some(event) = rx.recv().await {
        render(&event);
    }
}

/// Stops the run when the user presses Q.
fn spawn_stop_watcher(stop: StopSignal, finished: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !finished.load(Ordering::SeqCst) {
            match poll(Duration::from_millis(timing::KEYBOARD_POLL_MS)) {
                Ok(true) => {
                    if let Ok(Event::Key(KeyEvent {
                        code: KeyCode::Char('q') | KeyCode::Char('Q'),
                        ..
                    })) = read()
                    {
                        println!("\nStopping after the current page...");
                        stop.stop();
                        return;
                    }
                }
                Ok(false) => {}
                Err(_) => return,
            }
        }
    })
}

fn prompt_for_directory() -> Result<Option<PathBuf>> {
    print!("Enter another directory for the PDF (empty to cancel): ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
}

async fn run_capture(session: &mut RunSession, settings: &CaptureSettings) -> Result<()> {
    let (reporter, rx) = progress::channel();
    let printer = tokio::spawn(print_progress(rx));

    let finished = Arc::new(AtomicBool::new(false));
    let watcher = spawn_stop_watcher(session.stop_signal(), Arc::clone(&finished));
    println!("Press 'Q' at any time to stop\n");

    let mut result = session.start_run(settings, &reporter).await;
    finished.store(true, Ordering::SeqCst);
    let _ = watcher.join();
    drop(reporter);
    let _ = printer.await;

    while let Err(e) = &result {
        if !e.is_retryable_write() {
            break;
        }
        let Some(dir) = prompt_for_directory()? else {
            session.reset().await;
            break;
        };
        let (reporter, rx) = progress::channel();
        let printer = tokio::spawn(print_progress(rx));
        result = session.retry_assembly(&dir, &reporter).await;
        drop(reporter);
        let _ = printer.await;
    }

    let outcome = result?;
    info!(path = %outcome.pdf_path.display(), pages = outcome.pages, "done");
    println!("Saved to {}", outcome.pdf_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if args.list_presets {
        return list_presets();
    }

    if let Some(definition) = &args.save_preset {
        return save_preset_from_string(definition);
    }

    let grabber: Arc<dyn DisplayGrabber> = Arc::new(ScreenshotsGrabber::new());

    if args.check_permissions {
        let state = pagecapture::permission::probe_screen_capture(grabber.as_ref());
        println!("Screen capture: {:?}", state);
        if let (false, Some(commands)) = (
            state.is_granted(),
            pagecapture::RemediationCommands::for_current_platform(),
        ) {
            println!("   {}", commands.screen_recording);
            println!("   {}", commands.accessibility);
        }
        return Ok(());
    }

    let settings = build_settings(&args)?;
    let options = build_options(&args)?;

    println!("PAGE CAPTURE");
    println!("Configuration:");
    println!("  Region: {}", settings.region()?);
    println!("  Pages: {}", settings.total_pages);
    println!("  Wait per page: {}ms", settings.capture_delay().as_millis());
    println!("  Key: {:?} via {:?}", options.advance_key, options.injector);
    println!("  Output: {}", settings.output_path().display());
    println!();

    let injector = select_injector(options.injector, options.advance_key);
    let mut session = RunSession::new(grabber, injector, &options);

    run_capture(&mut session, &settings).await
}
