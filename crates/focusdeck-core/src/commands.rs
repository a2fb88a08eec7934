use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::board::BrainDumpBoard;
use crate::breaker::{HttpDecomposer, REVEAL_INTERVAL_MS, TaskBreaker};
use crate::catalog::{self, Sound};
use crate::cli::Invocation;
use crate::config::Config;
use crate::gesture::{LayoutEngine, Pointer};
use crate::layout::LayoutStore;
use crate::mixer::{AudioMixer, NoopPlayback};
use crate::render::{Renderer, format_clock};
use crate::spinner::Spinner;
use crate::store::Store;
use crate::timer::{Alarm, Notifier, Permission, Preset, TimerEngine};
use crate::todo::TodoList;
use crate::widgets::WidgetKind;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show",
        "drag",
        "resize",
        "remove",
        "reset",
        "focus",
        "sounds",
        "mixer",
        "timer",
        "board",
        "todo",
        "spin",
        "breaker",
        "_commands",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut dyn Store,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "show" => cmd_show(store, renderer),
        "drag" => cmd_drag(store, renderer, &inv.command_args),
        "resize" => cmd_resize(store, renderer, &inv.command_args),
        "remove" => cmd_remove(store, &inv.command_args),
        "reset" => cmd_reset(store),
        "focus" => cmd_focus(store, renderer, &inv.command_args),
        "sounds" => cmd_sounds(store, cfg, renderer),
        "mixer" => cmd_mixer(store, cfg, renderer, &inv.command_args),
        "timer" => cmd_timer(store, cfg, renderer, &inv.command_args),
        "board" => cmd_board(store, renderer, &inv.command_args),
        "todo" => cmd_todo(store, renderer, &inv.command_args),
        "spin" => cmd_spin(store, renderer, &inv.command_args),
        "breaker" => cmd_breaker(cfg, renderer, &inv.command_args),
        "_commands" => cmd_commands(),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, renderer))]
fn cmd_show(store: &mut dyn Store, renderer: &mut Renderer) -> anyhow::Result<()> {
    let engine = LayoutEngine::new(LayoutStore::load(store));
    renderer.print_dashboard(&engine)
}

#[instrument(skip(store, renderer, args))]
fn cmd_drag(store: &mut dyn Store, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let (id, dx, dy) = parse_widget_delta(args, "drag <widget> <dx-px> <dy-px>")?;

    let mut engine = LayoutEngine::new(LayoutStore::load(store));
    if !engine.begin_drag(id, Pointer::new(0.0, 0.0)) {
        return Err(anyhow!("{id} is not on the dashboard"));
    }
    engine.drag_to(Pointer::new(dx, dy));
    let (gx, gy) = engine
        .end_drag(store, Pointer::new(dx, dy))
        .context("drag did not commit")?;

    println!("Moved {id} to ({gx}, {gy}).");
    renderer.print_dashboard(&engine)
}

#[instrument(skip(store, renderer, args))]
fn cmd_resize(
    store: &mut dyn Store,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let (id, dw, dh) = parse_widget_delta(args, "resize <widget> <dw-px> <dh-px>")?;

    let mut engine = LayoutEngine::new(LayoutStore::load(store));
    if !engine.begin_resize(id, Pointer::new(0.0, 0.0)) {
        return Err(anyhow!("{id} is not on the dashboard"));
    }
    let (w, h) = engine
        .resize_to(store, Pointer::new(dw, dh))
        .context("resize did not commit")?;
    engine.end_resize();

    println!("Resized {id} to {w}x{h}.");
    renderer.print_dashboard(&engine)
}

#[instrument(skip(store, args))]
fn cmd_remove(store: &mut dyn Store, args: &[String]) -> anyhow::Result<()> {
    let id: WidgetKind = args
        .first()
        .ok_or_else(|| anyhow!("usage: remove <widget>"))?
        .parse()?;

    let mut engine = LayoutEngine::new(LayoutStore::load(store));
    if engine.remove(store, id) {
        println!("Removed {id}. Bring it back with `focusdeck reset`.");
    } else {
        println!("{id} is not on the dashboard.");
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_reset(store: &mut dyn Store) -> anyhow::Result<()> {
    let mut engine = LayoutEngine::new(LayoutStore::load(store));
    engine.reset(store);
    println!("Layout reset. Widget data (tasks, notes, sounds) is preserved.");
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_focus(store: &mut dyn Store, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let mut engine = LayoutEngine::new(LayoutStore::load(store));
    for arg in args {
        let id: WidgetKind = arg.parse()?;
        engine.toggle_focus(id);
    }
    renderer.print_dashboard(&engine)
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_sounds(store: &mut dyn Store, cfg: &Config, renderer: &mut Renderer) -> anyhow::Result<()> {
    let sounds = catalog::all_sounds(&cfg.sounds_url());
    let mixer = AudioMixer::load(store);
    renderer.print_sounds(&sounds, &mixer)
}

#[instrument(skip(store, cfg, renderer, args))]
fn cmd_mixer(
    store: &mut dyn Store,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let sounds = catalog::all_sounds(&cfg.sounds_url());
    let mut mixer = AudioMixer::load(store);
    let mut playback = NoopPlayback;

    match args.first().map(String::as_str) {
        None => renderer.print_sounds(&sounds, &mixer),
        Some("toggle") => {
            let name = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: mixer toggle <sound>"))?;
            let sound = resolve_sound(&sounds, &mixer, name)?;
            mixer.toggle_track(store, &mut playback, &sound);
            let state = if mixer.is_enabled(&sound.id) {
                "enabled"
            } else {
                "disabled"
            };
            println!("{} {state}.", sound.name);
            Ok(())
        }
        Some("volume") => {
            let name = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: mixer volume <sound> <0..1>"))?;
            let volume: f64 = args
                .get(2)
                .ok_or_else(|| anyhow!("usage: mixer volume <sound> <0..1>"))?
                .parse()
                .context("volume must be a number")?;
            let sound = resolve_sound(&sounds, &mixer, name)?;
            if !mixer.set_track_volume(store, &mut playback, &sound.id, volume) {
                return Err(anyhow!("{} is not enabled", sound.name));
            }
            println!(
                "{} at {:.0}% (effective {:.0}%).",
                sound.name,
                mixer.tracks()[&sound.id].volume * 100.0,
                mixer.effective_volume(&sound.id).unwrap_or(0.0) * 100.0
            );
            Ok(())
        }
        Some("master") => {
            let volume: f64 = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: mixer master <0..1>"))?
                .parse()
                .context("volume must be a number")?;
            mixer.set_master_volume(store, &mut playback, volume);
            println!("Master volume at {:.0}%.", mixer.master_volume() * 100.0);
            Ok(())
        }
        Some("play") => {
            mixer.toggle_master_playback(store, &mut playback, &sounds);
            if mixer.any_playing() {
                println!("Resumed {} track(s).", mixer.tracks().len());
            } else {
                println!("Paused {} track(s).", mixer.tracks().len());
            }
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown mixer subcommand: {other}")),
    }
}

/// Accepts a sound by id, name, or `custom-` id of an already-enabled
/// track, so toggling off works even when discovery is unreachable.
fn resolve_sound(sounds: &[Sound], mixer: &AudioMixer, name: &str) -> anyhow::Result<Sound> {
    if let Some(sound) = sounds
        .iter()
        .find(|sound| sound.id == name || sound.name == name)
    {
        return Ok(sound.clone());
    }
    if mixer.is_enabled(name) {
        return Ok(Sound {
            id: name.to_string(),
            name: name.to_string(),
            path: String::new(),
        });
    }
    Err(anyhow!("unknown sound: {name}"))
}

#[instrument(skip(store, cfg, renderer, args))]
fn cmd_timer(
    store: &mut dyn Store,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut timer = TimerEngine::load(store, now);

    match args.first().map(String::as_str) {
        None | Some("status") => renderer.print_timer(&timer),
        Some("preset") => {
            let preset: Preset = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: timer preset <focus|short|long>"))?
                .parse()?;
            timer.select_preset(preset);
            renderer.print_timer(&timer)
        }
        Some("target") => {
            let raw = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: timer target <HH:MM>"))?;
            let target = parse_target_time(raw)?;
            timer.set_target(target, now);
            renderer.print_timer(&timer)
        }
        Some("run") => {
            if let Some(raw) = args.get(1) {
                match raw.parse::<Preset>() {
                    Ok(preset) => timer.select_preset(preset),
                    Err(_) => timer.set_target(parse_target_time(raw)?, now),
                }
            }
            run_timer_to_completion(store, cfg, &mut timer)
        }
        Some(other) => Err(anyhow!("unknown timer subcommand: {other}")),
    }
}

fn parse_target_time(raw: &str) -> anyhow::Result<chrono::NaiveTime> {
    chrono::NaiveTime::parse_from_str(raw, "%H:%M")
        .with_context(|| format!("expected HH:MM, got: {raw}"))
}

/// Ticks the timer against the real clock until it finishes, drawing the
/// countdown in place.
fn run_timer_to_completion(
    store: &mut dyn Store,
    cfg: &Config,
    timer: &mut TimerEngine,
) -> anyhow::Result<()> {
    let mut notifier = TerminalNotifier::from_config(cfg);
    let mut alarm = TerminalAlarm;

    timer.start_pause(Utc::now());
    info!(remaining = timer.remaining_secs(), "timer running");

    let mut out = std::io::stdout();
    while timer.is_running() {
        write!(out, "\r  {}  ", format_clock(timer.remaining_secs()))?;
        out.flush()?;
        std::thread::sleep(std::time::Duration::from_secs(1));
        timer.tick(store, &mut notifier, &mut alarm, Utc::now());
    }
    writeln!(out, "\r  {}  ", format_clock(timer.remaining_secs()))?;

    if timer.is_done() {
        println!("Done. {} min focused today.", timer.daily_minutes());
    }
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn cmd_board(store: &mut dyn Store, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let mut board = BrainDumpBoard::load(store);

    match args.first().map(String::as_str) {
        None | Some("list") => renderer.print_board(&board),
        Some("add") => {
            let text = args[1..].join(" ");
            match board.add(store, &text, None) {
                Some(item) => println!("Noted ({}).", item.id),
                None => println!("Nothing to note."),
            }
            Ok(())
        }
        Some("remove") => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: board remove <id>"))?;
            if board.delete(store, id) {
                println!("Removed.");
            } else {
                println!("No note with id {id}.");
            }
            Ok(())
        }
        Some("move") => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: board move <id>"))?;
            if board.move_to_other_column(store, id) {
                println!("Moved to the other column.");
            } else {
                println!("No note with id {id}.");
            }
            Ok(())
        }
        Some("clear") => {
            board.clear(store);
            println!("Board cleared.");
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown board subcommand: {other}")),
    }
}

#[instrument(skip(store, renderer, args))]
fn cmd_todo(store: &mut dyn Store, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let mut todos = TodoList::load(store);

    match args.first().map(String::as_str) {
        None | Some("list") => renderer.print_todos(&todos),
        Some("add") => {
            let text = args[1..].join(" ");
            match todos.add(store, &text) {
                Some(item) => println!("Added ({}).", item.id),
                None => println!("Nothing to add."),
            }
            Ok(())
        }
        Some("done") => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: todo done <id>"))?;
            if !todos.toggle(store, id) {
                return Err(anyhow!("no task with id {id}"));
            }
            renderer.print_todos(&todos)
        }
        Some("remove") => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: todo remove <id>"))?;
            if !todos.remove(store, id) {
                return Err(anyhow!("no task with id {id}"));
            }
            println!("Removed.");
            Ok(())
        }
        Some("clear") => {
            todos.clear(store);
            println!("All tasks cleared.");
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown todo subcommand: {other}")),
    }
}

#[instrument(skip(store, renderer, args))]
fn cmd_spin(store: &mut dyn Store, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let mut spinner = Spinner::load(store);

    match args.first().map(String::as_str) {
        None => {
            let mut rng = rand::thread_rng();
            let Some(outcome) = spinner.spin(&mut rng) else {
                println!("No options to draw from. Add one with `spin add <text>`.");
                return Ok(());
            };

            let mut out = std::io::stdout();
            for tease in &outcome.shuffle {
                write!(out, "\r  {tease:<40}")?;
                out.flush()?;
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            writeln!(out, "\r  {:<40}", "")?;
            println!("-> {}", renderer.paint(&outcome.selection, "1;33"));
            Ok(())
        }
        Some("list") => {
            for (index, option) in spinner.options().iter().enumerate() {
                println!("{index:>3}  {option}");
            }
            Ok(())
        }
        Some("add") => {
            let text = args[1..].join(" ");
            if spinner.add_option(store, &text) {
                println!("Added.");
            } else {
                println!("Nothing to add.");
            }
            Ok(())
        }
        Some("remove") => {
            let index: usize = args
                .get(1)
                .ok_or_else(|| anyhow!("usage: spin remove <index>"))?
                .parse()
                .context("index must be a number")?;
            if !spinner.remove_option(store, index) {
                return Err(anyhow!("no option at index {index}"));
            }
            println!("Removed.");
            Ok(())
        }
        Some(other) => Err(anyhow!("unknown spin subcommand: {other}")),
    }
}

#[instrument(skip(cfg, renderer, args))]
fn cmd_breaker(cfg: &Config, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    let task = args.join(" ");
    if task.trim().is_empty() {
        return Err(anyhow!("usage: breaker <task description>"));
    }

    let service = HttpDecomposer::new(&cfg.decompose_url());
    let mut breaker = TaskBreaker::new();
    println!("Summoning a plan...");
    breaker
        .start(&service, &task, Utc::now())
        .context("breakdown did not start")?;

    let breakdown = breaker.current().context("breakdown missing")?;
    renderer.print_breakdown_header(breakdown)?;

    // Staggered reveal against the real clock.
    let mut shown = 0;
    loop {
        let now = Utc::now();
        for step in &breakdown.revealed(now)[shown..] {
            println!("  [ ] {}", step.text);
        }
        shown = breakdown.revealed_count(now);
        if breakdown.all_revealed(now) {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(REVEAL_INTERVAL_MS as u64 / 5));
    }
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for name in known_command_names() {
        println!("{name}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("focusdeck <command> [args]");
    println!();
    println!("  show                         render the dashboard grid");
    println!("  drag <widget> <dx> <dy>      drag a widget by a pixel delta and snap");
    println!("  resize <widget> <dw> <dh>    resize a widget by a pixel delta (live)");
    println!("  remove <widget>              hide a widget until the next reset");
    println!("  reset                        restore the initial layout");
    println!("  focus <widget>...            render with everything else dimmed");
    println!("  sounds                       list the ambient sound catalog");
    println!("  mixer [toggle|volume|master|play]");
    println!("  timer [status|preset|target|run]");
    println!("  board [list|add|remove|move|clear]");
    println!("  todo [list|add|done|remove|clear]");
    println!("  spin [list|add|remove]       draw a quick dopamine activity");
    println!("  breaker <task>               break a task into small steps");
    Ok(())
}

fn parse_widget_delta(args: &[String], usage: &str) -> anyhow::Result<(WidgetKind, f64, f64)> {
    let id: WidgetKind = args
        .first()
        .ok_or_else(|| anyhow!("usage: {usage}"))?
        .parse()?;
    let dx: f64 = args
        .get(1)
        .ok_or_else(|| anyhow!("usage: {usage}"))?
        .parse()
        .context("delta must be a number")?;
    let dy: f64 = args
        .get(2)
        .ok_or_else(|| anyhow!("usage: {usage}"))?
        .parse()
        .context("delta must be a number")?;
    Ok((id, dx, dy))
}

/// Notification port for the terminal: permission comes from config, and a
/// granted notification prints with a bell.
struct TerminalNotifier {
    permission: Permission,
}

impl TerminalNotifier {
    fn from_config(cfg: &Config) -> Self {
        let permission = match cfg.get_bool("notifications") {
            None => Permission::Default,
            Some(true) => Permission::Granted,
            Some(false) => Permission::Denied,
        };
        Self { permission }
    }
}

impl Notifier for TerminalNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        // The terminal can always display; an undetermined permission
        // resolves to granted on first use.
        self.permission = Permission::Granted;
        self.permission
    }

    fn notify(&mut self, message: &str) {
        println!("\x07*** {message} ***");
    }
}

struct TerminalAlarm;

impl Alarm for TerminalAlarm {
    fn ring(&mut self) {
        print!("\x07");
        let _ = std::io::stdout().flush();
    }
}
