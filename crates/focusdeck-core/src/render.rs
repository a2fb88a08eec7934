use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::board::BrainDumpBoard;
use crate::breaker::Breakdown;
use crate::catalog::Sound;
use crate::config::Config;
use crate::gesture::LayoutEngine;
use crate::mixer::AudioMixer;
use crate::timer::{TimerEngine, TimerMode};
use crate::todo::TodoList;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Coarse character-per-cell projection of the grid plus an item table.
    /// Focused partitioning shows dimmed items in lowercase.
    #[tracing::instrument(skip(self, engine))]
    pub fn print_dashboard(&mut self, engine: &LayoutEngine) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let (visible, dimmed) = engine.partition();

        let items = engine.layout().items();
        if items.is_empty() {
            writeln!(out, "No widgets on the dashboard. Try `focusdeck reset`.")?;
            return Ok(());
        }

        let min_x = items.iter().map(|item| item.x).min().unwrap_or(0).min(0);
        let max_x = items
            .iter()
            .map(|item| item.x + item.w)
            .max()
            .unwrap_or(0)
            .max(crate::geometry::COLUMNS);
        let max_y = items.iter().map(|item| item.y + item.h).max().unwrap_or(0);

        for row in 0..max_y {
            let mut line = String::new();
            for col in min_x..max_x {
                let cell = items.iter().find(|item| {
                    col >= item.x && col < item.x + item.w && row >= item.y && row < item.y + item.h
                });
                let ch = match cell {
                    Some(item) => {
                        let letter = item.id.id().chars().next().unwrap_or('?');
                        if dimmed.iter().any(|d| d.id == item.id) {
                            letter
                        } else {
                            letter.to_ascii_uppercase()
                        }
                    }
                    None => '·',
                };
                line.push(ch);
                line.push(' ');
            }
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;

        let headers = ["Widget", "Pos", "Size", "Min", "State"];
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let state = if dimmed.iter().any(|d| d.id == item.id) {
                self.paint("dimmed", "90")
            } else if visible.len() < items.len() {
                self.paint("focused", "33")
            } else {
                String::new()
            };
            rows.push(vec![
                item.id.to_string(),
                format!("({}, {})", item.x, item.y),
                format!("{}x{}", item.w, item.h),
                format!("{}x{}", item.min_w, item.min_h),
                state,
            ]);
        }
        write_table(&mut out, &headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_sounds(&mut self, sounds: &[Sound], mixer: &AudioMixer) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if sounds.is_empty() {
            writeln!(out, "No sounds available (catalog empty or unreachable).")?;
            return Ok(());
        }

        let headers = ["Sound", "Id", "Volume"];
        let mut rows = Vec::with_capacity(sounds.len());
        for sound in sounds {
            let volume = match mixer.effective_volume(&sound.id) {
                Some(effective) => {
                    let track = &mixer.tracks()[&sound.id];
                    let state = format!(
                        "{:.0}% -> {:.0}%{}",
                        track.volume * 100.0,
                        effective * 100.0,
                        if track.is_playing { "" } else { " (paused)" }
                    );
                    self.paint(&state, "32")
                }
                None => "off".to_string(),
            };
            rows.push(vec![sound.name.clone(), sound.id.clone(), volume]);
        }
        write_table(&mut out, &headers, rows)?;
        writeln!(out, "Master volume: {:.0}%", mixer.master_volume() * 100.0)?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_timer(&mut self, timer: &TimerEngine) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let mode = match timer.mode() {
            TimerMode::Countdown(preset) => preset.label().to_string(),
            TimerMode::Target(time) => format!("Until {}", time.format("%H:%M")),
        };
        let state = if timer.is_done() {
            self.paint("done", "32")
        } else if timer.is_running() {
            self.paint("running", "33")
        } else {
            "paused".to_string()
        };

        writeln!(out, "mode       {mode}")?;
        writeln!(out, "remaining  {}", format_clock(timer.remaining_secs()))?;
        writeln!(out, "state      {state}")?;
        writeln!(out, "today      {} min focused", timer.daily_minutes())?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_board(&mut self, board: &BrainDumpBoard) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if board.is_empty() {
            writeln!(out, "Your mind is clear.")?;
            return Ok(());
        }

        let headers = ["Left", "Right"];
        let rows_len = board.left().len().max(board.right().len());
        let mut rows = Vec::with_capacity(rows_len);
        for i in 0..rows_len {
            let cell = |items: &[crate::board::BrainDumpItem]| {
                items
                    .get(i)
                    .map(|item| {
                        if item.image.is_some() {
                            format!("[image] {}", item.text).trim().to_string()
                        } else {
                            item.text.clone()
                        }
                    })
                    .unwrap_or_default()
            };
            rows.push(vec![cell(board.left()), cell(board.right())]);
        }
        write_table(&mut out, &headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_todos(&mut self, todos: &TodoList) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if todos.items().is_empty() {
            writeln!(out, "Nothing to do.")?;
            return Ok(());
        }

        for item in todos.items() {
            let mark = if item.completed { "x" } else { " " };
            let text = if item.completed {
                self.paint(&item.text, "90")
            } else {
                item.text.clone()
            };
            writeln!(out, "[{mark}] {text}  ({})", item.id)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_breakdown_header(&mut self, breakdown: &Breakdown) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Current mission: {}", breakdown.task)?;
        if breakdown.failed {
            // Non-blocking: the fallback steps still print below.
            writeln!(
                out,
                "{}",
                self.paint("(service unavailable, showing generic steps)", "31")
            )?;
        }
        Ok(())
    }

    pub fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn format_clock(total_secs: u32) -> String {
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let pad = widths[idx] - UnicodeWidthStr::width(*header);
        write!(writer, "{}{} ", header, " ".repeat(pad))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{} ", "-".repeat(*width))?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{format_clock, strip_ansi, write_table};

    #[test]
    fn clock_formats_with_zero_padding() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(25 * 60), "25:00");
    }

    #[test]
    fn ansi_codes_do_not_count_toward_widths() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");

        let mut buffer = Vec::new();
        write_table(
            &mut buffer,
            &["A"],
            vec![vec!["\x1b[33mwide cell\x1b[0m".to_string()]],
        )
        .expect("write table");
        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.contains("wide cell"));
    }
}
