use bannerframe::config::{self, AppConfig};
use bannerframe::edits::{DragTracker, EditRecord, EditStore, to_canvas_point};
use bannerframe::export::{self, Capabilities, ExportMode, ExportOptions};
use bannerframe::imaging::{
    ImageBackend, OutputFormat, RustBackend, analyze_exposure, exposure_stats,
};
use bannerframe::overlay::{OverlaySlot, OverlayStore};
use bannerframe::session::{Session, SessionError};
use bannerframe::{output, scan};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "bannerframe")]
#[command(about = "Frame photos between a header and footer banner, edit them, export them")]
#[command(long_about = "\
Frame photos between a header and footer banner, edit them, export them

Every output is 1080 pixels wide: the header on top, the photo area in the
middle, the footer at the bottom. Banners keep their aspect ratio; the photo
area gets the remaining height (never less than 80 px).

Layout:

  ┌──────────────────────┐
  │ header001.png        │  height from the banner's aspect at 1080 wide
  ├──────────────────────┤
  │ photo area           │  blurred fill + the photo with its saved edits
  ├──────────────────────┤
  │ footer001.png        │
  └──────────────────────┘

Edits (pan, zoom, rotation, brightness, shadows) are saved per photo in the
state directory and reused whenever the same file is exported again.

Run 'bannerframe gen-config' to generate a documented bannerframe.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// State directory for stored overlays and edits (overrides config)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Output overrides shared by rendering commands.
#[derive(clap::Args, Clone, Default)]
struct OutputArgs {
    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// JPEG quality (0-100)
    #[arg(long)]
    quality: Option<u32>,

    /// Output height in pixels
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Png,
}

#[derive(Clone, Copy, ValueEnum)]
enum SlotArg {
    Header,
    Footer,
}

impl From<SlotArg> for OverlaySlot {
    fn from(slot: SlotArg) -> Self {
        match slot {
            SlotArg::Header => OverlaySlot::Header,
            SlotArg::Footer => OverlaySlot::Footer,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Render and encode every photo
    Export {
        /// Photo files or directories
        #[arg(required = true)]
        photos: Vec<PathBuf>,

        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// Bundle all outputs into one zip archive
        #[arg(long)]
        archive: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render one photo with its saved edits
    Preview {
        /// Photo file, or a directory of photos
        photo: PathBuf,

        /// File name of the photo to use when PHOTO is a directory
        #[arg(long, value_name = "NAME")]
        pick: Option<String>,

        /// Output file
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Edit one photo, then save (or discard) the result
    Edit(EditArgs),
    /// Suggest brightness and shadows for photos
    Analyze {
        #[arg(required = true)]
        photos: Vec<PathBuf>,
    },
    /// Manage the header and footer banners
    Overlay {
        #[command(subcommand)]
        action: OverlayAction,
    },
    /// Print a stock bannerframe.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum OverlayAction {
    /// Use an image file as a banner
    Set {
        #[arg(value_enum)]
        slot: SlotArg,
        file: PathBuf,
    },
    /// Revert a banner to its default asset
    Clear {
        #[arg(value_enum)]
        slot: SlotArg,
    },
    /// Show the active banners and the resulting layout
    Show,
}

/// Edit operations are applied in the order given on the command line.
#[derive(clap::Args)]
struct EditArgs {
    /// Photo file, or a directory of photos
    photo: PathBuf,

    /// File name of the photo to edit when PHOTO is a directory
    #[arg(long, value_name = "NAME")]
    pick: Option<String>,

    /// Pan by DX,DY display pixels (repeatable)
    #[arg(long = "move", id = "move", value_name = "DX,DY", allow_hyphen_values = true)]
    moves: Vec<Pair>,

    /// Size the canvas is displayed at, for --move mapping (default: actual size)
    #[arg(long, value_name = "WxH")]
    display: Option<DisplaySize>,

    /// Zoom by N wheel notches; negative zooms out (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    wheel: Vec<i32>,

    /// Set zoom from the slider (1-3)
    #[arg(long)]
    zoom: Vec<f64>,

    /// Set zoom exactly (0.5-3)
    #[arg(long)]
    zoom_exact: Vec<f64>,

    /// Rotate by degrees, e.g. 90 or -90 (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    rotate: Vec<i32>,

    /// Set brightness (-50..50)
    #[arg(long, allow_hyphen_values = true)]
    brightness: Vec<i32>,

    /// Set shadow lift (0..100)
    #[arg(long)]
    shadows: Vec<i32>,

    /// Apply the suggested brightness and shadows
    #[arg(long)]
    auto: bool,

    /// Reset brightness and shadows
    #[arg(long)]
    clear_light: bool,

    /// Reset all edits to the default placement
    #[arg(long)]
    reset: bool,

    /// Write the editor view (with the photo-area frame) to this file
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Close without saving
    #[arg(long)]
    discard: bool,

    #[command(flatten)]
    output: OutputArgs,
}

/// `DX,DY` pair.
#[derive(Clone, Copy, Debug)]
struct Pair(f64, f64);

impl FromStr for Pair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(',')
            .ok_or_else(|| format!("expected DX,DY, got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("'{v}': {e}"))
        };
        Ok(Self(parse(a)?, parse(b)?))
    }
}

/// `WxH` display size.
#[derive(Clone, Copy, Debug)]
struct DisplaySize(f64, f64);

impl FromStr for DisplaySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
        let parse = |v: &str| match v.trim().parse::<f64>() {
            Ok(n) if n > 0.0 => Ok(n),
            Ok(_) => Err(format!("'{v}' must be positive")),
            Err(e) => Err(format!("'{v}': {e}")),
        };
        Ok(Self(parse(w)?, parse(h)?))
    }
}

#[derive(Debug, Clone, Copy)]
enum EditOp {
    Move(Pair),
    Wheel(i32),
    Zoom(f64),
    ZoomExact(f64),
    Rotate(i32),
    Brightness(i32),
    Shadows(i32),
    Auto,
    ClearLight,
    Reset,
}

impl EditArgs {
    /// Operations sorted by their position on the command line.
    fn ordered_ops(&self, matches: &ArgMatches) -> Vec<EditOp> {
        let mut ops: Vec<(usize, EditOp)> = Vec::new();
        let mut push_all = |id: &str, values: Vec<EditOp>| {
            if let Some(indices) = matches.indices_of(id) {
                ops.extend(indices.zip(values));
            }
        };
        push_all("move", self.moves.iter().map(|p| EditOp::Move(*p)).collect());
        push_all("wheel", self.wheel.iter().map(|n| EditOp::Wheel(*n)).collect());
        push_all("zoom", self.zoom.iter().map(|z| EditOp::Zoom(*z)).collect());
        push_all(
            "zoom_exact",
            self.zoom_exact.iter().map(|z| EditOp::ZoomExact(*z)).collect(),
        );
        push_all("rotate", self.rotate.iter().map(|d| EditOp::Rotate(*d)).collect());
        push_all(
            "brightness",
            self.brightness.iter().map(|b| EditOp::Brightness(*b)).collect(),
        );
        push_all("shadows", self.shadows.iter().map(|s| EditOp::Shadows(*s)).collect());
        for (flag, set, op) in [
            ("auto", self.auto, EditOp::Auto),
            ("clear_light", self.clear_light, EditOp::ClearLight),
            ("reset", self.reset, EditOp::Reset),
        ] {
            if set && let Some(index) = matches.index_of(flag) {
                ops.push((index, op));
            }
        }
        ops.sort_by_key(|(index, _)| *index);
        ops.into_iter().map(|(_, op)| op).collect()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    init_tracing(cli.verbose);

    let mut config = config::load_config(&cli.config)?;
    if let Some(state_dir) = &cli.state_dir {
        config.overlays.state_dir = state_dir.clone();
    }
    let backend = RustBackend::new();

    match cli.command {
        Command::Export {
            photos,
            out,
            archive,
            output,
        } => {
            apply_output_args(&mut config, &output)?;
            let session = open_session(&config, &photos, &backend)?;
            let mode = if archive || config.export.archive {
                ExportMode::Archive
            } else {
                ExportMode::Files
            };
            let options = ExportOptions {
                mode,
                quality: config.quality(),
                yield_every: config.export.yield_every,
                out_dir: out,
            };
            let names: Vec<String> = session.photos().iter().map(|p| p.name.clone()).collect();
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event, &names) {
                        println!("{}", line);
                    }
                }
            });
            let result = export::export(
                &session,
                &backend,
                Capabilities::negotiate(),
                &options,
                None,
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "status printer thread panicked")?;
            result?;
        }
        Command::Preview {
            photo,
            pick,
            out,
            output,
        } => {
            apply_output_args(&mut config, &output)?;
            let mut session = open_session(&config, &[photo], &backend)?;
            let index = pick_photo(&session, pick.as_deref())?;
            session.set_current(index)?;
            let bitmap = session.render_preview()?;
            write_encoded(&backend, &bitmap, &config, &out)?;
            let photo = session.photo(index)?;
            output::print_edit(photo, &session.effective_record(photo));
            println!("Preview → {}", out.display());
        }
        Command::Edit(args) => {
            let edit_matches = matches
                .subcommand_matches("edit")
                .ok_or("edit arguments missing")?;
            apply_output_args(&mut config, &args.output)?;
            run_edit(&config, &args, edit_matches, &backend)?;
        }
        Command::Analyze { photos } => {
            let outcome = scan::scan(&photos, &backend, config.export.on_decode_error)?;
            output::print_statuses(&outcome.statuses);
            for photo in &outcome.photos {
                let stats = exposure_stats(&photo.bitmap);
                let adjustment = analyze_exposure(&photo.bitmap);
                output::print_analysis(photo, &stats, &adjustment);
            }
        }
        Command::Overlay { action } => {
            let store = OverlayStore::new(&config.overlays.state_dir);
            let assets = &config.overlays.assets_dir;
            let mut statuses = Vec::new();
            match action {
                OverlayAction::Set { slot, file } => {
                    let overlay = store.set_from_file(slot.into(), &file, &backend)?;
                    for line in output::format_overlay(slot.into(), Some(&overlay)) {
                        println!("{}", line);
                    }
                }
                OverlayAction::Clear { slot } => {
                    let overlay = store.clear(slot.into(), assets, &backend, &mut statuses)?;
                    output::print_statuses(&statuses);
                    for line in output::format_overlay(slot.into(), overlay.as_ref()) {
                        println!("{}", line);
                    }
                }
                OverlayAction::Show => {
                    let mut session = Session::new(config.render_options());
                    for slot in OverlaySlot::ALL {
                        let overlay = store.resolve(slot, assets, &backend, &mut statuses);
                        session.set_overlay(slot, overlay);
                    }
                    output::print_statuses(&statuses);
                    let slots: Vec<_> = OverlaySlot::ALL
                        .iter()
                        .map(|s| (*s, session.overlay(*s)))
                        .collect();
                    output::print_overlays(&slots, &session.geometry());
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr diagnostics subscriber.
fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Apply command-line output overrides and re-validate.
fn apply_output_args(
    config: &mut AppConfig,
    args: &OutputArgs,
) -> Result<(), config::ConfigError> {
    if let Some(format) = args.format {
        config.output.format = match format {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
        };
    }
    if let Some(quality) = args.quality {
        config.output.quality = quality;
    }
    if let Some(height) = args.height {
        config.output.height = height;
    }
    config.validate()
}

/// Build a session: banners, photos, then previously saved edits.
fn open_session(
    config: &AppConfig,
    inputs: &[PathBuf],
    backend: &RustBackend,
) -> Result<Session, Box<dyn std::error::Error>> {
    let state_dir = &config.overlays.state_dir;
    let store = OverlayStore::new(state_dir);
    let mut session = Session::new(config.render_options());
    let mut statuses = Vec::new();
    for slot in OverlaySlot::ALL {
        let overlay = store.resolve(slot, &config.overlays.assets_dir, backend, &mut statuses);
        session.set_overlay(slot, overlay);
    }

    let outcome = scan::scan(inputs, backend, config.export.on_decode_error)?;
    statuses.extend(outcome.statuses);
    output::print_statuses(&statuses);
    if outcome.photos.is_empty() {
        return Err("no photos could be loaded".into());
    }

    session.load_photos(outcome.photos);
    let applied = session.import_edits(&EditStore::load(state_dir));
    tracing::debug!(applied, "imported saved edits");
    Ok(session)
}

/// The photo named by `--pick`, or the first one.
fn pick_photo(session: &Session, name: Option<&str>) -> Result<usize, SessionError> {
    match name {
        Some(name) => session.find_by_name(name),
        None => Ok(0),
    }
}

fn write_encoded(
    backend: &RustBackend,
    bitmap: &image::RgbaImage,
    config: &AppConfig,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = config.output.format;
    let bytes = match backend.encode(bitmap, format, config.quality()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "encode failed, trying fallback");
            backend.encode_fallback(bitmap, format, config.quality())?
        }
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, bytes)?;
    Ok(())
}

fn apply_op(
    session: &mut Session,
    op: EditOp,
    display: Option<DisplaySize>,
    drag: &mut DragTracker,
) -> Result<EditRecord, Box<dyn std::error::Error>> {
    let record = match op {
        EditOp::Move(Pair(dx, dy)) => {
            let geometry = session.geometry();
            let backing = (geometry.width(), geometry.canvas_height);
            let display = display
                .map(|d| (d.0, d.1))
                .unwrap_or((backing.0 as f64, backing.1 as f64));
            drag.begin(to_canvas_point((0.0, 0.0), display, backing));
            let delta = drag
                .update(to_canvas_point((dx, dy), display, backing))
                .unwrap_or((0.0, 0.0));
            drag.end();
            session.update_draft(|r| r.with_offset_delta(delta.0, delta.1))?
        }
        EditOp::Wheel(notches) => {
            // Wheel up (negative delta) zooms in
            let delta = -(notches.signum() as f64);
            session.update_draft(|mut r| {
                for _ in 0..notches.unsigned_abs() {
                    r = r.with_wheel_zoom(delta);
                }
                r
            })?
        }
        EditOp::Zoom(z) => session.update_draft(|r| r.with_slider_zoom(z))?,
        EditOp::ZoomExact(z) => session.update_draft(|r| r.with_numeric_zoom(z))?,
        EditOp::Rotate(deg) => session.update_draft(|r| r.rotated(deg))?,
        EditOp::Brightness(b) => session.update_draft(|r| r.with_brightness(b))?,
        EditOp::Shadows(s) => session.update_draft(|r| r.with_shadows(s))?,
        EditOp::Auto => session.auto_adjust_draft()?,
        EditOp::ClearLight => session.update_draft(|r| r.without_light())?,
        EditOp::Reset => session.reset_draft()?,
    };
    tracing::debug!(?op, "applied edit");
    Ok(record)
}

fn run_edit(
    config: &AppConfig,
    args: &EditArgs,
    matches: &ArgMatches,
    backend: &RustBackend,
) -> Result<(), Box<dyn std::error::Error>> {
    let state_dir = &config.overlays.state_dir;
    let mut session = open_session(config, std::slice::from_ref(&args.photo), backend)?;
    let index = pick_photo(&session, args.pick.as_deref())?;
    session.open_editor(index)?;

    let mut drag = DragTracker::default();
    for op in args.ordered_ops(matches) {
        apply_op(&mut session, op, args.display, &mut drag)?;
    }

    if let Some(preview) = &args.preview {
        let bitmap = session.render_editor()?;
        write_encoded(backend, &bitmap, config, preview)?;
        println!("Editor view → {}", preview.display());
    }

    let photo = session.photo(index)?.clone();
    if args.discard {
        session.close_editor();
        println!("Discarded changes");
    } else {
        let id = session.save_draft()?;
        let mut saved = EditStore::load(state_dir);
        if let Some(record) = session.edits().get(&id) {
            saved.insert(id.clone(), *record);
        }
        saved.save(state_dir)?;
    }
    output::print_edit(&photo, &session.effective_record(&photo));
    Ok(())
}
